use tokio::time::Duration;
use tracing::{error, info};

use tracing_loki_sink::env::config_from_env;
use tracing_loki_sink::init::{init_tracing_with_config, FileConfig, LayerConfig, Rotation};
use tracing_loki_sink::{Lifecycle, LokiSink};

/// Ships logs to a Loki instance configured through `LOKI_SINK_*`
/// variables, e.g.
///
/// ```sh
/// LOKI_SINK_ADDR=127.0.0.1:3100 LOKI_SINK_LABELS=service=auth,env=dev \
///     cargo run --example loki_example
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_from_env()?
        .with_label("service", "auth-service")
        .with_max_batch_wait(Duration::from_millis(500));
    let sink = LokiSink::new(config)?;
    sink.start();

    let layer_config = LayerConfig {
        file: Some(FileConfig {
            rotation: Rotation::Hourly,
            max_files: Some(24),
            ..FileConfig::new("logs", "auth-service")
        }),
        ..LayerConfig::default()
    };
    let _guard = init_tracing_with_config(&sink, layer_config)?;

    info!("starting service");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    // Per-request labels become their own stream in Loki.
    sink.write_with_labels(b"audit: password reset requested", [("stream", "audit")]);

    // Stop through the lifecycle trait, as a process supervisor would.
    let lifecycle: &dyn Lifecycle = &sink;
    lifecycle.stop().await;
    Ok(())
}
