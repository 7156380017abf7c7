//! Engine error types.

use faas_net::NetError;

/// Errors surfaced to callers of the engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The transport connection could not be established.
    #[error("failed to connect transport: {0}")]
    Connect(#[source] NetError),

    /// Subscribing a function subject failed; nothing was registered.
    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe {
        /// The function subject.
        subject: String,
        /// The transport failure.
        #[source]
        source: NetError,
    },

    /// A remote call failed: timeout, transport error or undecodable reply.
    #[error("call to {subject} failed: {source}")]
    Call {
        /// The function subject.
        subject: String,
        /// The underlying failure.
        #[source]
        source: NetError,
    },

    /// A call timeout of zero milliseconds was requested.
    #[error("call timeout must be greater than zero")]
    InvalidTimeout,

    /// The engine has been closed and accepts no new registrations.
    #[error("engine {0} is closed")]
    Closed(String),

    /// The dispatch loop was already started once, whether or not it is
    /// still running. The queue it consumed cannot be drained again.
    #[error("dispatch loop for engine {0} was already started")]
    LoopConsumed(String),
}

impl EngineError {
    /// Returns `true` if this is a remote call that timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Call { source, .. } if source.is_timeout())
    }
}

/// Why an inbound envelope was rejected. These never reach callers; the
/// dispatch loop logs them and replies with the ack sentinel.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("payload is not an object")]
    NotAnObject,

    /// `params` is missing.
    #[error("params not present")]
    MissingParams,

    /// `params` is present but not an object.
    #[error("params of incorrect type")]
    ParamsNotObject,

    /// `auth` is present but not an object.
    #[error("auth of incorrect type")]
    AuthNotObject,
}
