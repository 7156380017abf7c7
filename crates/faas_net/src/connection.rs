//! NATS-backed transport.
//!
//! [`NatsConnection`] is the production [`Transport`]: function subjects are
//! queue-subscribed on the server and calls use the server's request/reply
//! inboxes, each bounded by the caller's own deadline.

use std::time::Duration;

use async_nats::RequestErrorKind;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::NetError;
use crate::messages::InboundMessage;
use crate::transport::{Subscription, Transport};

/// Server used when neither the caller nor the environment names one.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// Environment variable consulted by [`NatsConnection::connect`].
pub const NATS_URL_ENV: &str = "NATS_URL";

/// A [`Transport`] over one `async-nats` client.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to the server named by `NATS_URL`, or [`DEFAULT_NATS_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the server is unreachable.
    pub async fn connect() -> Result<Self, NetError> {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self::connect_to(&url).await
    }

    /// Connect to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the server is unreachable.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting transport");
        let client = async_nats::connect(url).await?;
        info!(url, "transport connected");
        Ok(Self { client })
    }
}

/// Translate the request failures callers can act on. Anything else is
/// passed through as [`NetError::Request`].
fn request_failure(kind: RequestErrorKind, subject: &str, timeout: Duration) -> Option<NetError> {
    match kind {
        RequestErrorKind::TimedOut => Some(NetError::Timeout {
            subject: subject.to_string(),
            timeout,
        }),
        RequestErrorKind::NoResponders => Some(NetError::NoResponders(subject.to_string())),
        _ => None,
    }
}

fn inbound(msg: async_nats::Message) -> InboundMessage {
    InboundMessage {
        subject: msg.subject.to_string(),
        reply: msg.reply.map(|r| r.to_string()),
        payload: msg.payload.to_vec(),
    }
}

#[async_trait]
impl Transport for NatsConnection {
    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Subscription, NetError> {
        let sub = self
            .client
            .queue_subscribe(subject.to_string(), group.to_string())
            .await?;
        Ok(sub.map(inbound).boxed())
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), NetError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, NetError> {
        // Deadline is per request, never the client-wide default.
        let request = async_nats::Request::new()
            .payload(payload.into())
            .timeout(Some(timeout));
        debug!(subject, ?timeout, "sending request");
        match self.client.send_request(subject.to_string(), request).await {
            Ok(msg) => Ok(msg.payload.to_vec()),
            Err(err) => Err(request_failure(err.kind(), subject, timeout).unwrap_or_else(|| err.into())),
        }
    }
}
