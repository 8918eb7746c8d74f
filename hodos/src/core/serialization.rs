use super::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Compute a stable hash of serialized bytes.
///
/// SeaHash is stable across compiler versions, process restarts and
/// machines, which is what file names derived from cache keys require.
/// Not cryptographically secure.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    seahash::hash(bytes)
}

/// Hash any serializable value through its canonical JSON form.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<u64> {
    serialize_value(value).map(|bytes| hash_bytes(&bytes))
}

/// Serializes a value to bytes using JSON.
///
/// # Errors
/// Returns `CoreError::Json` if the value cannot be serialized.
pub fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(CoreError::Json)
}

/// Deserializes bytes to a value using JSON.
///
/// # Errors
/// Returns `CoreError::Json` if the bytes cannot be deserialized.
pub fn deserialize_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(CoreError::Json)
}

/// Byte encoding used for values written to a cache.
///
/// `Json` is readable and tolerant of schema drift. `Bincode` is compact but
/// cannot represent self-describing types such as `serde_json::Value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    Json,
    Bincode,
}

impl Codec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => serialize_value(value),
            Codec::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(CoreError::Encode),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json => deserialize_value(bytes),
            Codec::Bincode => {
                bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(CoreError::Decode)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_discriminating() {
        let a = hash_value(&("step1", "option1")).unwrap();
        let b = hash_value(&("step1", "option2")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, hash_value(&("step1", "option1")).unwrap());
    }

    #[test]
    fn test_codecs_agree() {
        let value = vec!["hello".to_string(), "world".to_string()];
        for codec in [Codec::Json, Codec::Bincode] {
            let bytes = codec.encode(&value).unwrap();
            let back: Vec<String> = codec.decode(&bytes).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Codec::Json.decode::<String>(b"\xff\x00").is_err());
        assert!(matches!(
            Codec::Bincode.decode::<String>(&[0xff]),
            Err(CoreError::Decode(_))
        ));
    }
}
