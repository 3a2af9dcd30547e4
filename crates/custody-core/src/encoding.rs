//! Base64 helpers and serde adapters for byte fields
//!
//! Wire byte fields (public keys, signatures, leaves, digests) use standard
//! padded base64. Salts embedded inside leaf JSON use unpadded base64url.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Identity {
//!     #[serde(with = "custody_core::encoding::base64_bytes")]
//!     pk: Vec<u8>,
//! }
//! ```

use crate::{CustodyError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::fmt;
use std::marker::PhantomData;

/// Encode bytes as standard padded base64
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64
pub fn decode_b64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| CustodyError::serialization(format!("invalid base64: {e}")))
}

/// Encode bytes as unpadded base64url
pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url
pub fn decode_b64url(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| CustodyError::serialization(format!("invalid base64url: {e}")))
}

/// Serde module for `Vec<u8>` fields carried as standard base64 strings
///
/// Use with `#[serde(with = "base64_bytes")]`.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes to a base64 string
    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_b64(bytes))
    }

    /// Deserialize bytes from a base64 string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::decode_b64(&text).map_err(serde::de::Error::custom)
    }
}

/// Serde module for `Vec<Vec<u8>>` fields carried as arrays of base64 strings
pub mod base64_list {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize each element as a base64 string
    pub fn serialize<S>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&super::encode_b64(item))?;
        }
        seq.end()
    }

    /// Deserialize an array of base64 strings
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let texts = Vec::<String>::deserialize(deserializer)?;
        texts
            .iter()
            .map(|t| super::decode_b64(t).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Seed that reads a JSON array into a `Vec<T>`, failing as soon as more
/// than `max` elements appear
///
/// The first element past the limit is skipped unparsed and fails the read,
/// so an oversized input is rejected without materializing it.
pub struct BoundedSeq<T> {
    max: usize,
    what: &'static str,
    marker: PhantomData<T>,
}

impl<T> BoundedSeq<T> {
    /// Accept at most `max` elements, described as `what` in errors
    pub fn new(max: usize, what: &'static str) -> Self {
        Self {
            max,
            what,
            marker: PhantomData,
        }
    }
}

impl<'de, T: Deserialize<'de>> DeserializeSeed<'de> for BoundedSeq<T> {
    type Value = Vec<T>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for BoundedSeq<T> {
    type Value = Vec<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an array of at most {} {}", self.max, self.what)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<T>, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(self.max));
        while items.len() < self.max {
            match seq.next_element()? {
                Some(item) => items.push(item),
                None => return Ok(items),
            }
        }
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::custom(format!(
                "more than {} {}",
                self.max, self.what
            )));
        }
        Ok(items)
    }
}

/// Parse the JSON array in `raw`, allowing at most `max` elements
pub fn parse_bounded<T: DeserializeOwned>(
    raw: &RawValue,
    max: usize,
    what: &'static str,
) -> Result<Vec<T>> {
    let mut deserializer = serde_json::Deserializer::from_str(raw.get());
    let items = BoundedSeq::<T>::new(max, what).deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapped {
        #[serde(with = "base64_bytes")]
        pk: Vec<u8>,
        #[serde(with = "base64_list")]
        leaves: Vec<Vec<u8>>,
    }

    #[test]
    fn test_wrapped_fields_use_base64() {
        let value = Wrapped {
            pk: vec![0xFF, 0x00],
            leaves: vec![b"a".to_vec(), b"bc".to_vec()],
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"pk":"/wA=","leaves":["YQ==","YmM="]}"#);
        assert_eq!(serde_json::from_str::<Wrapped>(&json).unwrap(), value);
    }

    #[test]
    fn test_url_variant_has_no_padding() {
        let text = encode_b64url(&[0xFB, 0xFF]);
        assert_eq!(text, "-_8");
        assert_eq!(decode_b64url(&text).unwrap(), vec![0xFB, 0xFF]);
    }

    #[test]
    fn test_bounded_array_limit() {
        let raw: Box<RawValue> = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(parse_bounded::<u8>(&raw, 3, "items").unwrap(), vec![1, 2, 3]);

        let err = parse_bounded::<u8>(&raw, 2, "items").unwrap_err();
        assert!(matches!(err, CustodyError::Serialization { .. }));
        assert!(err.to_string().contains("more than 2 items"));

        let tail: Box<RawValue> = serde_json::from_str(r#"[1, 2, "x"]"#).unwrap();
        assert!(parse_bounded::<u8>(&tail, 2, "items")
            .unwrap_err()
            .to_string()
            .contains("more than 2 items"));

        let object: Box<RawValue> = serde_json::from_str(r#"{"a": 1}"#).unwrap();
        assert!(parse_bounded::<u8>(&object, 2, "items").is_err());
    }

    #[test]
    fn test_invalid_base64_is_serialization_error() {
        assert!(matches!(
            decode_b64("***"),
            Err(CustodyError::Serialization { .. })
        ));
    }
}
