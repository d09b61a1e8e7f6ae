//! # Codec Boundary
//!
//! Structured values cross into the store as text. The codec decides the
//! text form and the representation of an explicit null.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use rkv_common::{RkvError, RkvResult};

/// Text codec for structured values.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> RkvResult<String>;

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> RkvResult<T>;

    /// Text written for an explicit null.
    fn null(&self) -> &str;
}

/// JSON through serde_json. Null is `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> RkvResult<String> {
        serde_json::to_string(value).map_err(|err| RkvError::Encode(err.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> RkvResult<T> {
        serde_json::from_str(raw).map_err(|err| RkvError::Decode(err.to_string()))
    }

    fn null(&self) -> &str {
        "null"
    }
}

/// Decodes stored text, treating a stored null or undecodable text as absent.
pub(crate) fn decode_or_absent<C: Codec, T: DeserializeOwned>(
    codec: &C,
    key: &str,
    raw: &str,
) -> Option<T> {
    match codec.decode::<Option<T>>(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %err, "stored value does not decode; treating as absent");
            None
        }
    }
}
