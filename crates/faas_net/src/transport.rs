//! The transport contract.
//!
//! The engine only needs three primitives from a bus: queue-group
//! subscription, fire-and-forget publish, and a request that waits for one
//! reply. [`NatsConnection`](crate::NatsConnection) and
//! [`MemoryBus`](crate::MemoryBus) both implement it.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::NetError;
use crate::messages::InboundMessage;

/// A stream of delivered messages. Ends when the transport drops the
/// subscription; dropping it unsubscribes.
pub type Subscription = BoxStream<'static, InboundMessage>;

/// A publish/subscribe bus with request/reply support.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Subscribe to `subject` as a member of queue group `group`.
    ///
    /// Among all subscribers sharing a group, exactly one receives each
    /// message.
    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Subscription, NetError>;

    /// Publish `payload` on `subject`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), NetError>;

    /// Publish `payload` on `subject` and wait up to `timeout` for a single
    /// reply.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, NetError>;
}
