use crate::push::PushRequest;
use crate::transport::{DeliveryOutcome, Transport};
use async_trait::async_trait;

/// A transport that acknowledges every batch without sending it.
///
/// Useful for measuring the overhead of the sink itself without any
/// network I/O, and for tests that don't care about delivery.
#[derive(Clone, Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn send(&self, _request: &PushRequest) -> DeliveryOutcome {
        DeliveryOutcome::Delivered
    }
}
