//! JSON codec helpers.
//!
//! Thin wrappers around `serde_json` for encoding and decoding messages. All
//! request and reply bodies on the bus are JSON objects.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails (for example a map
/// with non-string keys).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(value).map_err(NetError::Encode)
}

/// Decode a value from JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    serde_json::from_slice(bytes).map_err(NetError::Decode)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{Map, Value};

    use super::*;

    #[test]
    fn test_decode_object() {
        let map: Map<String, Value> = decode(br#"{"x":1}"#).unwrap();
        assert_eq!(map.get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<Map<String, Value>, _> = decode(b"{not json");
        assert!(matches!(result, Err(NetError::Decode(_))));
    }

    #[test]
    fn test_decode_array_into_object_fails() {
        let result: Result<Map<String, Value>, _> = decode(b"[1,2]");
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_non_string_keys_fails() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        assert!(matches!(encode(&map), Err(NetError::Encode(_))));
    }
}
