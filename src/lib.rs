//! Batching `tracing` writer for Loki-compatible push APIs.
//!
//! [`LokiSink`] buffers every line written to it and pushes batches from a
//! background task when either the batch size or the batch wait is reached.
//! [`init`] wires a sink into a `tracing_subscriber` registry.

pub mod batch;
pub mod config;
pub mod env;
pub mod error;
mod flush;
pub mod init;
pub mod labels;
pub mod noop_transport;
pub mod push;
pub mod record;
pub mod sink;
pub mod transport;

pub use config::{LokiConfig, TlsConfig};
pub use error::LokiError;
pub use sink::{Lifecycle, LokiSink, SinkStats};
pub use transport::{DeliveryOutcome, HttpTransport, Transport};
