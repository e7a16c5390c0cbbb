use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Clone, Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("serialize: {0}")]
    Serialize(String),

    #[error("deserialize: {0}")]
    Deserialize(String),
}

/// Text serialization seam between the log and its payloads.
///
/// The log never inspects payload contents; everything it persists and
/// decodes goes through this trait, so the wire format can change without
/// touching the store.
pub trait TextSerializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SerializationError>;

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializationError>;
}

/// Default serializer: compact JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl TextSerializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SerializationError> {
        serde_json::to_string(value).map_err(|e| SerializationError::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializationError> {
        serde_json::from_str(text).map_err(|e| SerializationError::Deserialize(e.to_string()))
    }
}
