//! Pluggable payload codec.
//!
//! # Design
//! Decoding never raises: any malformed or mismatched input yields `None`,
//! and the pipeline turns that into a decode error carrying the status and
//! raw body it observed.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes typed values to bytes and decodes bytes back into typed values.
pub trait Codec: Send + Sync + 'static {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Option<T>;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Option<Bytes>;
}

/// JSON codec backed by `serde_json`.
///
/// An empty body decodes as JSON `null`, so `()` and `Option<T>` targets
/// accept bodyless responses such as `204 No Content`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Option<T> {
        let input = if bytes.is_empty() { &b"null"[..] } else { bytes };
        match serde_json::from_slice(input) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::trace!(error = %e, len = bytes.len(), "json decode failed");
                None
            }
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Option<Bytes> {
        serde_json::to_vec(value).ok().map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        ok: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        age: Option<u32>,
    }

    #[test]
    fn decodes_matching_shape() {
        let ping: Option<Ping> = JsonCodec.decode(br#"{"ok":true}"#);
        assert_eq!(ping, Some(Ping { ok: true }));
    }

    #[test]
    fn mismatched_shape_is_none() {
        let ping: Option<Ping> = JsonCodec.decode(br#"{"error":"not found"}"#);
        assert!(ping.is_none());
    }

    #[test]
    fn malformed_input_is_none() {
        let ping: Option<Ping> = JsonCodec.decode(b"not json");
        assert!(ping.is_none());
    }

    #[test]
    fn empty_body_decodes_into_unit_and_option() {
        let unit: Option<()> = JsonCodec.decode(b"");
        assert_eq!(unit, Some(()));
        let none: Option<Option<Ping>> = JsonCodec.decode(b"");
        assert_eq!(none, Some(None));
        let ping: Option<Ping> = JsonCodec.decode(b"");
        assert!(ping.is_none());
    }

    #[test]
    fn encode_then_decode_returns_the_value() {
        let values = [
            Profile {
                name: "ada".to_string(),
                tags: vec!["admin".to_string(), "ops".to_string()],
                age: Some(36),
            },
            Profile {
                name: String::new(),
                tags: Vec::new(),
                age: None,
            },
        ];
        for v in values {
            let bytes = JsonCodec.encode(&v).unwrap();
            let back: Profile = JsonCodec.decode(&bytes).unwrap();
            assert_eq!(back, v);
        }
    }
}
