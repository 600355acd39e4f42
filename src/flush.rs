use crate::push::PushRequest;
use crate::record::LogEntry;
use crate::sink::Shared;
use crate::transport::DeliveryOutcome;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Background batching loop, one per started sink.
///
/// Wakes on shutdown, on a size notification from `write`, or when the
/// batch wait timer expires. Sends are awaited inline, so this task is the
/// only sender and batches leave in drain order.
pub(crate) async fn run(shared: Arc<Shared>, shutdown: CancellationToken) {
    let wait = shared.config.max_batch_wait;
    let max_batch_size = shared.config.max_batch_size;
    let timer = sleep(wait);
    tokio::pin!(timer);

    debug!(?wait, max_batch_size, "loki flush loop started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = shared.notify.notified() => {
                // A permit may be stale if the timer already drained the
                // batch that raised it.
                if shared.buffer.len() >= max_batch_size {
                    send_batch(&shared, shared.buffer.drain_all()).await;
                    timer.as_mut().reset(Instant::now() + wait);
                }
            }

            _ = &mut timer => {
                send_batch(&shared, shared.buffer.drain_all()).await;
                timer.as_mut().reset(Instant::now() + wait);
            }
        }
    }

    drain_for_shutdown(&shared).await;
    debug!("loki flush loop stopped");
}

/// Close the buffer and push whatever is left, bounded by the shutdown
/// timeout.
pub(crate) async fn drain_for_shutdown(shared: &Shared) {
    let rest = shared.buffer.close_and_drain();
    if rest.is_empty() {
        return;
    }

    let count = rest.len() as u64;
    let limit = shared.config.shutdown_timeout;
    if timeout(limit, send_batch(shared, rest)).await.is_err() {
        shared.counters.failed_entries.fetch_add(count, Ordering::Relaxed);
        error!(entries = count, ?limit, "final loki push timed out, dropping batch");
    }
}

/// Push one drained batch. Failures are logged and counted; the batch is
/// not retried.
pub(crate) async fn send_batch(shared: &Shared, entries: Vec<LogEntry>) {
    if entries.is_empty() {
        return;
    }

    let count = entries.len() as u64;
    let request = PushRequest::from_entries(&shared.labels.snapshot(), &entries);
    drop(entries);

    shared.counters.batches.fetch_add(1, Ordering::Relaxed);

    match shared.transport.send(&request).await {
        DeliveryOutcome::Delivered => {
            shared.counters.delivered_entries.fetch_add(count, Ordering::Relaxed);
            debug!(entries = count, streams = request.streams.len(), "loki batch delivered");
        }
        DeliveryOutcome::Rejected { status, body } => {
            shared.counters.failed_entries.fetch_add(count, Ordering::Relaxed);
            warn!(entries = count, status, %body, "unexpected loki response status, dropping batch");
        }
        DeliveryOutcome::Failed(e) => {
            shared.counters.failed_entries.fetch_add(count, Ordering::Relaxed);
            error!(entries = count, error = %e, "failed to send loki push request, dropping batch");
        }
    }
}
