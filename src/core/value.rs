//! Opaque property values as seen by the tracking core.
//!
//! Every tracked property crosses the core as a [`PropertyValue`]; typed
//! conversion happens at the accessor boundary (see [`crate::metadata::Property`]),
//! and byte encoding is the object store's business.

use super::error::{TrackError, TrackResult};
use serde::{Serialize, de::DeserializeOwned};

pub type PropertyValue = serde_json::Value;

/// Convert a typed value into its opaque form.
pub fn to_property_value<V: Serialize>(property: &str, value: &V) -> TrackResult<PropertyValue> {
    serde_json::to_value(value).map_err(|err| {
        TrackError::Serialization(format!("property '{}': {}", property, err))
    })
}

/// Convert an opaque value back into the property's declared type.
pub fn from_property_value<V: DeserializeOwned>(
    property: &str,
    value: PropertyValue,
) -> TrackResult<V> {
    serde_json::from_value(value).map_err(|err| TrackError::TypeMismatch {
        property: property.to_string(),
        message: err.to_string(),
    })
}

/// Render a key property's value as the instance key.
///
/// Strings are used verbatim, `null` becomes the empty key, anything else is
/// rendered as its JSON text (so `42` becomes `"42"`).
pub fn key_string(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(text) => text.clone(),
        PropertyValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_string_forms() {
        assert_eq!(key_string(&json!("main-window")), "main-window");
        assert_eq!(key_string(&json!(42)), "42");
        assert_eq!(key_string(&json!(null)), "");
        assert_eq!(key_string(&json!(true)), "true");
    }

    #[test]
    fn test_type_mismatch_names_property() {
        let err = from_property_value::<u32>("Age", json!("thirty")).unwrap_err();
        match err {
            TrackError::TypeMismatch { property, .. } => assert_eq!(property, "Age"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
