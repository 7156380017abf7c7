//! Message types carried over the bus.
//!
//! Request bodies are JSON envelopes `{"params": {...}, "auth": {...}?}`.
//! Reply bodies are arbitrary JSON objects, or the [`ACK_FALSE`] sentinel
//! when no result could be produced. Correlation is left to the transport's
//! reply address; no id is carried in the payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Function parameters: an arbitrary JSON object.
pub type Params = Map<String, Value>;

/// Caller-supplied authentication data, passed through uninterpreted.
pub type Auth = Map<String, Value>;

/// The failure reply, published verbatim.
pub const ACK_FALSE: &[u8] = br#"{"ack":false}"#;

/// A request envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Function parameters.
    pub params: Params,
    /// Optional authentication data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

impl Envelope {
    /// Create an envelope with the given parameters and no auth.
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params, auth: None }
    }

    /// Attach auth data.
    #[must_use]
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// A message delivered by a subscription, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// The subject the message was published on.
    pub subject: String,
    /// Where the requester waits for a reply, if anywhere.
    pub reply: Option<String>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ack_false_literal() {
        assert_eq!(ACK_FALSE, b"{\"ack\":false}");
        let value: Value = serde_json::from_slice(ACK_FALSE).unwrap();
        assert_eq!(value, json!({ "ack": false }));
    }

    #[test]
    fn test_envelope_omits_missing_auth() {
        let mut params = Params::new();
        params.insert("a".into(), json!(1));
        let bytes = serde_json::to_vec(&Envelope::new(params)).unwrap();
        assert_eq!(bytes, br#"{"params":{"a":1}}"#);
    }

    #[test]
    fn test_envelope_with_auth() {
        let mut auth = Auth::new();
        auth.insert("token".into(), json!("t"));
        let env = Envelope::default().with_auth(auth);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({ "params": {}, "auth": { "token": "t" } }));
    }
}
