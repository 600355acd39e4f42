use crate::error::{InitError, ParseEnumError};
use crate::sink::LokiSink;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

/// Target prefix of this crate's own events. They are kept out of the Loki
/// layer so a failing push cannot feed itself.
const SINK_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_sink_target(target: &str) -> bool {
    target
        .strip_prefix(SINK_TARGET)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Line encoding used by a fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// Human readable, one line per event with all fields.
    #[default]
    Full,
    Compact,
    /// One JSON object per line.
    Json,
}

impl LineFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineFormat::Full => "full",
            LineFormat::Compact => "compact",
            LineFormat::Json => "json",
        }
    }
}

impl fmt::Display for LineFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "console" => Ok(LineFormat::Full),
            "compact" => Ok(LineFormat::Compact),
            "json" => Ok(LineFormat::Json),
            _ => Err(ParseEnumError::new("line format", s)),
        }
    }
}

/// How often the local log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl Rotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::Minutely => "minutely",
            Rotation::Hourly => "hourly",
            Rotation::Daily => "daily",
            Rotation::Never => "never",
        }
    }

    fn to_appender(self) -> rolling::Rotation {
        match self {
            Rotation::Minutely => rolling::Rotation::MINUTELY,
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
            Rotation::Never => rolling::Rotation::NEVER,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rotation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minutely" => Ok(Rotation::Minutely),
            "hourly" => Ok(Rotation::Hourly),
            "daily" => Ok(Rotation::Daily),
            "never" => Ok(Rotation::Never),
            _ => Err(ParseEnumError::new("rotation", s)),
        }
    }
}

/// Rolling local log file, written from a background thread.
#[derive(Clone, Debug)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File names are `<prefix>.<date>.log`.
    pub file_prefix: String,
    pub rotation: Rotation,
    /// Keep at most this many rotated files. `None` keeps everything.
    pub max_files: Option<usize>,
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: file_prefix.into(),
            rotation: Rotation::default(),
            max_files: None,
        }
    }
}

/// Configuration of the subscriber installed around a [`LokiSink`].
///
/// **Fields**
/// - `format`: encoding of lines shipped to Loki.
/// - `enable_stdout`: also print every event to stdout. This is where the
///   sink's own delivery diagnostics show up.
/// - `file`: optional rolling file that receives every event.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub format: LineFormat,
    pub enable_stdout: bool,
    pub file: Option<FileConfig>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            format: LineFormat::Json,
            enable_stdout: true,
            file: None,
        }
    }
}

/// Keeps background writers alive. Dropping it flushes the rolling file.
///
/// The Loki sink itself is not stopped on drop; call
/// [`LokiSink::stop`] for that.
#[must_use = "dropping the guard stops the file writer"]
#[derive(Debug, Default)]
pub struct InitGuard {
    _file: Option<WorkerGuard>,
}

fn fmt_layer<W>(format: LineFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LineFormat::Full => layer.boxed(),
        LineFormat::Compact => layer.compact().boxed(),
        LineFormat::Json => layer.json().boxed(),
    }
}

/// Build the layers for `sink` without installing them.
///
/// Events emitted by this crate are excluded from the Loki layer but still
/// reach stdout and the file layer.
pub fn build_layers(
    sink: &LokiSink,
    config: &LayerConfig,
) -> Result<(Vec<BoxedLayer>, InitGuard), InitError> {
    let mut layers = Vec::new();
    let mut guard = InitGuard::default();

    let loki = fmt_layer(config.format, sink.clone(), false)
        .with_filter(filter_fn(|meta| !is_sink_target(meta.target())));
    layers.push(loki.boxed());

    if config.enable_stdout {
        layers.push(fmt_layer(LineFormat::Full, std::io::stdout, true));
    }

    if let Some(file) = &config.file {
        let mut builder = RollingFileAppender::builder()
            .rotation(file.rotation.to_appender())
            .filename_prefix(file.file_prefix.as_str())
            .filename_suffix("log");
        if let Some(max) = file.max_files {
            builder = builder.max_log_files(max);
        }
        let appender = builder.build(&file.directory)?;
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(config.format, writer, false));
        guard._file = Some(worker);
    }

    Ok((layers, guard))
}

/// Install a global `tracing` subscriber that writes to `sink` according
/// to `config`.
///
/// The sink must be started separately with [`LokiSink::start`]. Fails if a
/// global subscriber is already set.
pub fn init_tracing_with_config(sink: &LokiSink, config: LayerConfig) -> Result<InitGuard, InitError> {
    let (layers, guard) = build_layers(sink, &config)?;
    Registry::default().with(layers).try_init()?;
    Ok(guard)
}

/// Initialize tracing with [`LayerConfig::default`]: JSON lines to Loki and
/// human readable lines to stdout.
pub fn init_tracing(sink: &LokiSink) -> Result<InitGuard, InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LokiConfig;
    use crate::noop_transport::NoopTransport;
    use std::sync::Arc;

    fn noop_sink() -> LokiSink {
        LokiSink::with_transport(LokiConfig::new(), Arc::new(NoopTransport))
    }

    #[test]
    fn line_format_names() {
        assert_eq!("json".parse::<LineFormat>().unwrap(), LineFormat::Json);
        assert_eq!("Compact".parse::<LineFormat>().unwrap(), LineFormat::Compact);
        assert_eq!("console".parse::<LineFormat>().unwrap(), LineFormat::Full);
        assert_eq!(LineFormat::Json.to_string(), "json");
        assert!("xml".parse::<LineFormat>().is_err());
    }

    #[test]
    fn rotation_names() {
        assert_eq!("hourly".parse::<Rotation>().unwrap(), Rotation::Hourly);
        assert_eq!(Rotation::Never.to_string(), "never");
        assert_eq!(
            "weekly".parse::<Rotation>().unwrap_err().to_string(),
            "unknown rotation: \"weekly\""
        );
    }

    #[test]
    fn sink_target_matching() {
        assert!(is_sink_target("tracing_loki_sink"));
        assert!(is_sink_target("tracing_loki_sink::flush"));
        assert!(!is_sink_target("tracing_loki_sink_ext"));
        assert!(!is_sink_target("tracing_loki_sink_ext::worker"));
        assert!(!is_sink_target("app"));
    }

    #[test]
    fn loki_layer_skips_own_diagnostics() {
        let sink = noop_sink();
        let config = LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        };
        let (layers, _guard) = build_layers(&sink, &config).unwrap();
        let subscriber = Registry::default().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "tracing_loki_sink::flush", "internal");
            tracing::info!(target: "tracing_loki_sink_ext", "neighbouring crate");
            tracing::info!(target: "app", "from the application");
        });

        assert_eq!(sink.buffered(), 2);
    }

    #[test]
    fn rolling_file_receives_events() {
        let dir = std::env::temp_dir().join(format!("loki-sink-init-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let sink = noop_sink();
        let config = LayerConfig {
            format: LineFormat::Compact,
            enable_stdout: false,
            file: Some(FileConfig {
                rotation: Rotation::Never,
                ..FileConfig::new(&dir, "app")
            }),
        };
        let (layers, guard) = build_layers(&sink, &config).unwrap();
        let subscriber = Registry::default().with(layers);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app", "written to disk");
        });
        drop(guard);

        let contents = std::fs::read_to_string(dir.join("app.log")).unwrap();
        assert!(contents.contains("written to disk"));
        assert_eq!(sink.buffered(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
