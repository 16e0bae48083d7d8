//! Value encoding for cache entries.
//!
//! Binary payloads are stored as `b64:<base64>`, everything else as
//! `json:<text>`. The discriminator keeps both kinds in one string keyspace.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use thiserror::Error;

const BYTES_TAG: &str = "b64:";
const JSON_TAG: &str = "json:";

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Bytes(Vec<u8>),
    Json(Value),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cache entry has no known encoding tag")]
    UnknownTag,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl CachedValue {
    pub fn encode(&self) -> String {
        match self {
            CachedValue::Bytes(bytes) => format!("{BYTES_TAG}{}", STANDARD.encode(bytes)),
            CachedValue::Json(value) => format!("{JSON_TAG}{value}"),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        if let Some(payload) = raw.strip_prefix(BYTES_TAG) {
            return Ok(CachedValue::Bytes(STANDARD.decode(payload)?));
        }
        if let Some(payload) = raw.strip_prefix(JSON_TAG) {
            return Ok(CachedValue::Json(serde_json::from_str(payload)?));
        }
        Err(DecodeError::UnknownTag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes_are_tagged_as_base64() {
        let encoded = CachedValue::Bytes(b"%PDF-1.4".to_vec()).encode();
        assert_eq!(encoded, "b64:JVBERi0xLjQ=");
        assert_eq!(
            CachedValue::decode(&encoded).expect("decode"),
            CachedValue::Bytes(b"%PDF-1.4".to_vec())
        );
    }

    #[test]
    fn json_survives_with_unicode() {
        let value = json!([{"id": 1, "name": "Врач"}]);
        let encoded = CachedValue::Json(value.clone()).encode();
        assert!(encoded.starts_with("json:"));
        assert_eq!(
            CachedValue::decode(&encoded).expect("decode"),
            CachedValue::Json(value)
        );
    }

    #[test]
    fn untagged_entries_are_rejected() {
        assert!(matches!(
            CachedValue::decode("{\"id\":1}"),
            Err(DecodeError::UnknownTag)
        ));
        assert!(matches!(
            CachedValue::decode("b64:@@@"),
            Err(DecodeError::Base64(_))
        ));
    }
}
