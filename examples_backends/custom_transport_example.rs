use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_loki_sink::{
    init::init_tracing,
    push::PushRequest,
    DeliveryOutcome, LokiConfig, LokiSink, Transport,
};

/// Example of shipping batches somewhere other than Loki by implementing
/// the `Transport` trait directly. Imagine this talks to some proprietary
/// collector that understands the Loki stream layout.
struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn send(&self, request: &PushRequest) -> DeliveryOutcome {
        // Here you would call your own client library.
        // For the sake of example we just print the batch.
        match serde_json::to_string_pretty(request) {
            Ok(body) => {
                println!("[my-collector] {}", body);
                DeliveryOutcome::Delivered
            }
            Err(e) => DeliveryOutcome::Failed(Box::new(e)),
        }
    }
}

#[tokio::main]
async fn main() {
    let config = LokiConfig::new().with_label("service", "custom-example");
    let sink = LokiSink::with_transport(config, Arc::new(StdoutTransport));
    sink.start();

    let _guard = init_tracing(&sink).expect("install subscriber");

    info!("custom transport example started");
    error!(db = "my-collector", "simulated error sent via custom transport");

    sink.stop().await;
}
