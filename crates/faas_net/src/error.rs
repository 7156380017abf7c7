//! Network-layer error types.

use std::time::Duration;

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a message to JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode a message from JSON.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// NATS publish error.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// NATS request error other than a timeout or missing responders.
    #[error("NATS request error: {0}")]
    Request(#[from] async_nats::RequestError),

    /// No reply arrived before the deadline.
    #[error("request to {subject} timed out after {timeout:?}")]
    Timeout {
        /// The subject the request was sent to.
        subject: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Nobody is subscribed to the requested subject.
    #[error("no responders for {0}")]
    NoResponders(String),

    /// Subscription refused by the transport.
    #[error("subscription to {0} refused")]
    SubscribeRefused(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

impl NetError {
    /// Returns `true` if this error is a request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
