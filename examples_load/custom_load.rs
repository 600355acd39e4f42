use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_loki_sink::init::{init_tracing_with_config, LayerConfig, LineFormat};
use tracing_loki_sink::noop_transport::NoopTransport;
use tracing_loki_sink::{LokiConfig, LokiSink};

#[tokio::main]
async fn main() {
    let config = LokiConfig::new()
        .with_max_batch_size(5_000)
        .with_max_batch_wait(Duration::from_millis(200));
    let sink = LokiSink::with_transport(config, Arc::new(NoopTransport));
    sink.start();

    let layer_config = LayerConfig {
        format: LineFormat::Compact,
        enable_stdout: false,
        file: None,
    };

    let _guard = init_tracing_with_config(&sink, layer_config).expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: wrote {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sink.stop().await;
    println!("{:?}", sink.stats());
}
