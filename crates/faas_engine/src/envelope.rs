//! Inbound envelope validation.

use faas_net::Envelope;
use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// Decode and validate a request body.
///
/// Checks run in a fixed order: JSON decoding, `params` presence, `params`
/// type, then `auth` type if present. The first failure wins. A JSON `null`
/// body behaves like an empty object. Unknown top-level fields are ignored.
///
/// # Errors
///
/// Returns the first [`EnvelopeError`] encountered.
pub fn validate_envelope(payload: &[u8]) -> Result<Envelope, EnvelopeError> {
    let value: Value = serde_json::from_slice(payload).map_err(EnvelopeError::Malformed)?;
    let mut body = match value {
        Value::Object(body) => body,
        Value::Null => Map::new(),
        _ => return Err(EnvelopeError::NotAnObject),
    };

    let params = match body.remove("params") {
        None => return Err(EnvelopeError::MissingParams),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(EnvelopeError::ParamsNotObject),
    };

    let auth = match body.remove("auth") {
        None => None,
        Some(Value::Object(auth)) => Some(auth),
        Some(_) => return Err(EnvelopeError::AuthNotObject),
    };

    Ok(Envelope { params, auth })
}
