use super::data_store::DataStore;
use super::memory::MemoryDataStore;
use crate::core::{PropertyValue, TrackError, TrackResult};
use crate::serialization::{JsonSerializer, Serializer};
use std::sync::Arc;

/// Value-level store consumed by tracking configurations.
///
/// Round-trip fidelity (persist then retrieve yields an equivalent value) is
/// the implementation's contract.
pub trait ObjectStore: Send + Sync {
    fn persist(&self, value: &PropertyValue, key: &str) -> TrackResult<()>;
    fn retrieve(&self, key: &str) -> TrackResult<PropertyValue>;
    fn contains_key(&self, key: &str) -> TrackResult<bool>;
}

impl<O: ObjectStore + ?Sized> ObjectStore for Arc<O> {
    fn persist(&self, value: &PropertyValue, key: &str) -> TrackResult<()> {
        (**self).persist(value, key)
    }

    fn retrieve(&self, key: &str) -> TrackResult<PropertyValue> {
        (**self).retrieve(key)
    }

    fn contains_key(&self, key: &str) -> TrackResult<bool> {
        (**self).contains_key(key)
    }
}

/// [`ObjectStore`] built from a byte store and a serializer.
#[derive(Debug)]
pub struct SerializedObjectStore<D, S> {
    data_store: D,
    serializer: S,
}

pub type InMemoryObjectStore = SerializedObjectStore<MemoryDataStore, JsonSerializer>;

impl<D: DataStore, S: Serializer> SerializedObjectStore<D, S> {
    pub fn new(data_store: D, serializer: S) -> Self {
        Self {
            data_store,
            serializer,
        }
    }

    pub fn data_store(&self) -> &D {
        &self.data_store
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }
}

impl InMemoryObjectStore {
    pub fn in_memory() -> Self {
        Self::new(MemoryDataStore::new(), JsonSerializer)
    }
}

impl<D: DataStore, S: Serializer> ObjectStore for SerializedObjectStore<D, S> {
    fn persist(&self, value: &PropertyValue, key: &str) -> TrackResult<()> {
        let bytes = self.serializer.serialize(value)?;
        self.data_store.set_data(key, bytes)
    }

    fn retrieve(&self, key: &str) -> TrackResult<PropertyValue> {
        let bytes = self
            .data_store
            .get_data(key)?
            .ok_or_else(|| TrackError::KeyNotFound(key.to_string()))?;
        self.serializer.deserialize(&bytes)
    }

    fn contains_key(&self, key: &str) -> TrackResult<bool> {
        self.data_store.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::MessagePackSerializer;
    use serde_json::json;

    #[test]
    fn test_round_trip_through_bytes() {
        let store = SerializedObjectStore::new(MemoryDataStore::new(), MessagePackSerializer);
        store.persist(&json!({"x": 1, "y": [2, 3]}), "Shape_a.Origin").unwrap();

        assert!(store.contains_key("Shape_a.Origin").unwrap());
        assert_eq!(
            store.retrieve("Shape_a.Origin").unwrap(),
            json!({"x": 1, "y": [2, 3]})
        );
    }

    #[test]
    fn test_missing_key_is_reported() {
        let store = InMemoryObjectStore::in_memory();
        let err = store.retrieve("Shape_a.Origin").unwrap_err();
        assert_eq!(err, TrackError::KeyNotFound("Shape_a.Origin".to_string()));
    }

    #[test]
    fn test_corrupt_bytes_surface_as_serialization_error() {
        let store = InMemoryObjectStore::in_memory();
        store
            .data_store()
            .set_data("Shape_a.Origin", b"{broken".to_vec())
            .unwrap();
        assert!(matches!(
            store.retrieve("Shape_a.Origin"),
            Err(TrackError::Serialization(_))
        ));
    }
}
