//! Remote function invocation.

use std::sync::Arc;
use std::time::Duration;

use faas_net::subjects::function_subject;
use faas_net::{Envelope, Params, Transport};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;

/// Returns `true` if `reply` is the `{"ack":false}` failure sentinel.
#[must_use]
pub fn is_nack(reply: &Params) -> bool {
    reply.len() == 1 && reply.get("ack") == Some(&Value::Bool(false))
}

/// Invokes functions served by any engine on the bus.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Call `function_name` on `engine_name` and wait for one reply.
    ///
    /// `params` is sent verbatim as the request body, so it must already
    /// have the target's envelope shape (`{"params": {...}, "auth": ...}`).
    /// Use [`invoke`](Self::invoke) to have the envelope built for you.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTimeout`] for a zero timeout, otherwise
    /// [`EngineError::Call`] on timeout, transport failure, or a reply that
    /// is not a JSON object. Nothing is retried.
    pub async fn call(
        &self,
        engine_name: &str,
        function_name: &str,
        params: &Params,
        timeout_ms: u64,
    ) -> Result<Params, EngineError> {
        self.request(engine_name, function_name, params, timeout_ms)
            .await
    }

    /// Like [`call`](Self::call), but wraps params and auth into an
    /// envelope first.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn invoke(
        &self,
        engine_name: &str,
        function_name: &str,
        envelope: &Envelope,
        timeout_ms: u64,
    ) -> Result<Params, EngineError> {
        self.request(engine_name, function_name, envelope, timeout_ms)
            .await
    }

    async fn request<T: Serialize + Sync + ?Sized>(
        &self,
        engine_name: &str,
        function_name: &str,
        body: &T,
        timeout_ms: u64,
    ) -> Result<Params, EngineError> {
        if timeout_ms == 0 {
            return Err(EngineError::InvalidTimeout);
        }
        let subject = function_subject(engine_name, function_name);
        let fail = |source| EngineError::Call {
            subject: subject.clone(),
            source,
        };

        let payload = faas_net::encode(body).map_err(fail)?;
        debug!(subject, timeout_ms, "calling function");
        let reply = self
            .transport
            .request(&subject, payload, Duration::from_millis(timeout_ms))
            .await
            .map_err(fail)?;
        faas_net::decode(&reply).map_err(fail)
    }
}

#[cfg(test)]
mod tests {
    use faas_net::{MemoryBus, NetError};
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    /// Answer the next request on `subject` with `reply`, returning the body
    /// that was received.
    async fn answer_once(bus: &MemoryBus, subject: &str, reply: &'static [u8]) -> tokio::task::JoinHandle<Vec<u8>> {
        let mut sub = bus.queue_subscribe(subject, "g").await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            let msg = sub.next().await.unwrap();
            responder
                .publish(msg.reply.as_deref().unwrap(), reply.to_vec())
                .await
                .unwrap();
            msg.payload
        })
    }

    #[tokio::test]
    async fn test_call_sends_params_verbatim() {
        let bus = MemoryBus::new();
        let seen = answer_once(&bus, "faas:math:add", br#"{"sum":3}"#).await;
        let client = Client::new(Arc::new(bus.clone()));

        let params = object(json!({ "params": { "a": 1, "b": 2 } }));
        let reply = client.call("math", "add", &params, 500).await.unwrap();

        assert_eq!(reply, object(json!({ "sum": 3 })));
        assert_eq!(seen.await.unwrap(), br#"{"params":{"a":1,"b":2}}"#);
    }

    #[tokio::test]
    async fn test_invoke_wraps_envelope() {
        let bus = MemoryBus::new();
        let seen = answer_once(&bus, "faas:math:add", br#"{}"#).await;
        let client = Client::new(Arc::new(bus.clone()));

        let envelope = Envelope::new(object(json!({ "a": 1 }))).with_auth(object(json!({ "t": "x" })));
        client.invoke("math", "add", &envelope, 500).await.unwrap();

        let body: Value = serde_json::from_slice(&seen.await.unwrap()).unwrap();
        assert_eq!(body, json!({ "params": { "a": 1 }, "auth": { "t": "x" } }));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let client = Client::new(Arc::new(MemoryBus::new()));
        let err = client.call("e", "f", &Params::new(), 0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeout));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_error() {
        let bus = MemoryBus::new();
        let _silent = bus.queue_subscribe("faas:e:slow", "e").await.unwrap();
        let client = Client::new(Arc::new(bus));
        let err = client.call("e", "slow", &Params::new(), 25).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_no_responders() {
        let client = Client::new(Arc::new(MemoryBus::new()));
        let err = client.call("e", "none", &Params::new(), 25).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Call {
                source: NetError::NoResponders(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_undecodable_reply() {
        let bus = MemoryBus::new();
        let _responder = answer_once(&bus, "faas:e:f", b"[1,2,3]").await;
        let client = Client::new(Arc::new(bus.clone()));
        let err = client.call("e", "f", &Params::new(), 500).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Call {
                source: NetError::Decode(_),
                ..
            }
        ));
    }

    #[test]
    fn test_is_nack() {
        assert!(is_nack(&object(json!({ "ack": false }))));
        assert!(!is_nack(&object(json!({ "ack": true }))));
        assert!(!is_nack(&object(json!({ "ack": false, "x": 1 }))));
    }
}
