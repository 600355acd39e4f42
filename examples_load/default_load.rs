use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_loki_sink::init::init_tracing_with_config;
use tracing_loki_sink::init::LayerConfig;
use tracing_loki_sink::noop_transport::NoopTransport;
use tracing_loki_sink::{LokiConfig, LokiSink};

#[tokio::main]
async fn main() {
    let sink = LokiSink::with_transport(LokiConfig::default(), Arc::new(NoopTransport));
    sink.start();

    let _guard = init_tracing_with_config(
        &sink,
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )
    .expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: wrote {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Drain whatever is still buffered before exiting
    sink.stop().await;
    println!("{:?}", sink.stats());
}
