//! Value ⇄ byte encodings used by [`crate::storage::SerializedObjectStore`].

use crate::core::{PropertyValue, TrackError, TrackResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &PropertyValue) -> TrackResult<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> TrackResult<PropertyValue>;
}

impl<S: Serializer + ?Sized> Serializer for Arc<S> {
    fn serialize(&self, value: &PropertyValue) -> TrackResult<Vec<u8>> {
        (**self).serialize(value)
    }

    fn deserialize(&self, bytes: &[u8]) -> TrackResult<PropertyValue> {
        (**self).deserialize(bytes)
    }
}

/// Human-readable JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &PropertyValue) -> TrackResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> TrackResult<PropertyValue> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact MessagePack encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackSerializer;

impl Serializer for MessagePackSerializer {
    fn serialize(&self, value: &PropertyValue) -> TrackResult<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| {
            TrackError::Serialization(format!("Failed to encode MessagePack value: {}", e))
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> TrackResult<PropertyValue> {
        rmp_serde::from_slice(bytes).map_err(|e| {
            TrackError::Serialization(format!("Failed to decode MessagePack value: {}", e))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    #[default]
    Json,
    MessagePack,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::MessagePack => "msgpack",
        }
    }

    pub fn serializer(&self) -> Arc<dyn Serializer> {
        match self {
            SerializationFormat::Json => Arc::new(JsonSerializer),
            SerializationFormat::MessagePack => Arc::new(MessagePackSerializer),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "msgpack" | "messagepack" | "mp" => Ok(SerializationFormat::MessagePack),
            other => Err(TrackError::InvalidConfig(format!(
                "Unknown serialization format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PropertyValue {
        json!({
            "title": "Main",
            "bounds": [10, 20, 800, 600],
            "ratio": 1.5,
            "visible": true,
            "parent": null
        })
    }

    #[test]
    fn test_json_is_readable_text() {
        let bytes = JsonSerializer.serialize(&json!("Ada")).unwrap();
        assert_eq!(bytes, b"\"Ada\"");
        assert_eq!(JsonSerializer.deserialize(&bytes).unwrap(), json!("Ada"));
    }

    #[test]
    fn test_msgpack_preserves_structured_values() {
        let bytes = MessagePackSerializer.serialize(&sample()).unwrap();
        assert_eq!(MessagePackSerializer.deserialize(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = JsonSerializer.deserialize(b"{not json").unwrap_err();
        assert!(matches!(err, TrackError::Serialization(_)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<SerializationFormat>().unwrap(), SerializationFormat::Json);
        assert_eq!(
            "msgpack".parse::<SerializationFormat>().unwrap(),
            SerializationFormat::MessagePack
        );
        assert!("yaml".parse::<SerializationFormat>().is_err());
    }
}
