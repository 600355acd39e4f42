use std::path::PathBuf;

/// Errors raised while building a sink. Anything that can be corrected
/// with a default (batch limits, label names) never ends up here.
#[derive(thiserror::Error, Debug)]
pub enum LokiError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM certificate: {0}")]
    Certificate(#[source] reqwest::Error),

    #[error("invalid PEM client identity: {0}")]
    Identity(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to create rolling file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("global subscriber already installed: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Error type returned when reading sink configuration from the environment.
#[derive(thiserror::Error, Debug)]
pub enum EnvError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error(transparent)]
    Loki(#[from] LokiError),
}

/// Error type returned when parsing a named enum value such as a line
/// format or rotation period.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
