use crate::batch::{BatchBuffer, Closed};
use crate::config::LokiConfig;
use crate::error::LokiError;
use crate::flush;
use crate::labels::{is_valid_label_name, LabelStore, AGENT_LABEL_KEY, AGENT_LABEL_VALUE};
use crate::record::LogEntry;
use crate::transport::{HttpTransport, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::fmt::MakeWriter;

/// Start/stop hooks so a sink can be driven by whatever supervises the
/// process lifecycle.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Spawn background work. Call once.
    fn start(&self);

    /// Stop background work and wait until it has drained.
    async fn stop(&self);
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) written: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) batches: AtomicU64,
    pub(crate) delivered_entries: AtomicU64,
    pub(crate) failed_entries: AtomicU64,
}

/// Point-in-time copy of a sink's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Entries accepted into the buffer.
    pub written: u64,
    /// Entries refused because the sink was already stopped.
    pub rejected: u64,
    /// Push requests attempted.
    pub batches: u64,
    pub delivered_entries: u64,
    /// Entries lost to rejected or failed pushes.
    pub failed_entries: u64,
}

enum Worker {
    Idle,
    Running {
        handle: JoinHandle<()>,
        shutdown: CancellationToken,
    },
    Stopped,
}

pub(crate) struct Shared {
    pub(crate) config: LokiConfig,
    pub(crate) labels: LabelStore,
    pub(crate) buffer: BatchBuffer,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) notify: Notify,
    pub(crate) counters: Counters,
    worker: Mutex<Worker>,
}

/// Batching writer that ships every line written to it to Loki.
///
/// `LokiSink` is a cheap handle; clones share the same buffer, labels and
/// background loop. Writing never touches the network: lines are appended
/// to an in-memory batch that the loop spawned by [`start`](Self::start)
/// pushes once it holds `max_batch_size` entries or `max_batch_wait` has
/// elapsed, whichever comes first. Delivery failures are logged through
/// `tracing` and counted in [`stats`](Self::stats), never returned to the
/// writer.
///
/// ```no_run
/// # async fn run() -> Result<(), tracing_loki_sink::error::LokiError> {
/// use tracing_loki_sink::{config::LokiConfig, sink::LokiSink};
///
/// let sink = LokiSink::new(LokiConfig::new().with_label("app", "billing"))?;
/// sink.start();
/// sink.write_line(b"hello loki");
/// sink.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LokiSink {
    shared: Arc<Shared>,
}

impl LokiSink {
    /// Create a sink that pushes over HTTP(S) according to `config`.
    pub fn new(config: LokiConfig) -> Result<Self, LokiError> {
        let config = config.normalized();
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a sink over a custom [`Transport`].
    pub fn with_transport(config: LokiConfig, transport: Arc<dyn Transport>) -> Self {
        let config = config.normalized();

        let labels = LabelStore::new();
        for (key, value) in &config.labels {
            if !labels.set(key.as_str(), value.as_str()) {
                warn!(key = %key, "dropping invalid loki label");
            }
        }
        // Set last so configuration cannot replace it.
        labels.set(AGENT_LABEL_KEY, AGENT_LABEL_VALUE);

        Self {
            shared: Arc::new(Shared {
                config,
                labels,
                buffer: BatchBuffer::new(),
                transport,
                notify: Notify::new(),
                counters: Counters::default(),
                worker: Mutex::new(Worker::Idle),
            }),
        }
    }

    /// Spawn the flush loop on the current Tokio runtime.
    ///
    /// Calling `start` more than once, or after [`stop`](Self::stop), is a
    /// caller error; extra calls are logged and ignored.
    pub fn start(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "loki sink started outside of a tokio runtime");
                return;
            }
        };

        let mut worker = self.shared.worker.lock();
        if !matches!(*worker, Worker::Idle) {
            warn!("loki sink already started or stopped, ignoring start");
            return;
        }

        let shutdown = CancellationToken::new();
        let handle = runtime.spawn(flush::run(Arc::clone(&self.shared), shutdown.clone()));
        *worker = Worker::Running { handle, shutdown };
    }

    /// Signal shutdown and wait until the final batch has been pushed.
    ///
    /// The final push is bounded by `shutdown_timeout`. A sink that was
    /// never started drains itself here. Writes arriving after this point
    /// are rejected and counted.
    pub async fn stop(&self) {
        let worker = mem::replace(&mut *self.shared.worker.lock(), Worker::Stopped);
        match worker {
            Worker::Running { handle, shutdown } => {
                shutdown.cancel();
                if let Err(e) = handle.await {
                    error!(error = %e, "loki flush loop ended abnormally");
                }
            }
            Worker::Idle => flush::drain_for_shutdown(&self.shared).await,
            Worker::Stopped => {}
        }
    }

    /// Enqueue one log line. Never blocks on the network.
    pub fn write_line(&self, payload: &[u8]) {
        self.push(LogEntry::new(payload));
    }

    /// Enqueue one log line with entry-scoped labels, which override sink
    /// labels of the same name. Invalid labels and the agent label are
    /// dropped.
    pub fn write_with_labels<I, K, V>(&self, payload: &[u8], labels: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let labels: BTreeMap<String, String> = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| !v.is_empty() && k != AGENT_LABEL_KEY && is_valid_label_name(k))
            .collect();
        self.push(LogEntry::with_labels(payload, labels));
    }

    fn push(&self, entry: LogEntry) {
        let shared = &self.shared;
        match shared.buffer.append(entry) {
            Ok(len) => {
                shared.counters.written.fetch_add(1, Ordering::Relaxed);
                if len >= shared.config.max_batch_size {
                    shared.notify.notify_one();
                }
            }
            Err(Closed(_)) => {
                shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("loki sink is stopped, rejecting log line");
            }
        }
    }

    /// No-op: flush timing belongs to the background loop.
    pub fn sync(&self) -> io::Result<()> {
        Ok(())
    }

    /// Add or replace a sink-level label. Returns `false` if the label was
    /// dropped as invalid.
    pub fn add_label(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if key == AGENT_LABEL_KEY {
            return false;
        }
        self.shared.labels.set(key, value)
    }

    pub fn remove_label(&self, key: &str) -> Option<String> {
        if key == AGENT_LABEL_KEY {
            return None;
        }
        self.shared.labels.delete(key)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.shared.labels.snapshot()
    }

    pub fn config(&self) -> &LokiConfig {
        &self.shared.config
    }

    /// Entries waiting for the next push.
    pub fn buffered(&self) -> usize {
        self.shared.buffer.len()
    }

    pub fn stats(&self) -> SinkStats {
        let c = &self.shared.counters;
        SinkStats {
            written: c.written.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            batches: c.batches.load(Ordering::Relaxed),
            delivered_entries: c.delivered_entries.load(Ordering::Relaxed),
            failed_entries: c.failed_entries.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for LokiSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LokiSink")
            .field("config", &self.shared.config)
            .field("buffered", &self.buffered())
            .finish()
    }
}

#[async_trait]
impl Lifecycle for LokiSink {
    fn start(&self) {
        LokiSink::start(self);
    }

    async fn stop(&self) {
        LokiSink::stop(self).await;
    }
}

impl io::Write for &LokiSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_line(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync()
    }
}

impl io::Write for LokiSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_line(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync()
    }
}

impl<'a> MakeWriter<'a> for LokiSink {
    type Writer = &'a LokiSink;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
