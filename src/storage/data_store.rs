use crate::core::TrackResult;
use std::sync::Arc;

/// Byte-level key/value storage.
pub trait DataStore: Send + Sync {
    fn set_data(&self, key: &str, data: Vec<u8>) -> TrackResult<()>;
    fn get_data(&self, key: &str) -> TrackResult<Option<Vec<u8>>>;
    fn contains_key(&self, key: &str) -> TrackResult<bool>;
    /// Returns whether a slot was removed.
    fn remove_data(&self, key: &str) -> TrackResult<bool>;
    /// All keys, sorted.
    fn keys(&self) -> TrackResult<Vec<String>>;
}

impl<D: DataStore + ?Sized> DataStore for Arc<D> {
    fn set_data(&self, key: &str, data: Vec<u8>) -> TrackResult<()> {
        (**self).set_data(key, data)
    }

    fn get_data(&self, key: &str) -> TrackResult<Option<Vec<u8>>> {
        (**self).get_data(key)
    }

    fn contains_key(&self, key: &str) -> TrackResult<bool> {
        (**self).contains_key(key)
    }

    fn remove_data(&self, key: &str) -> TrackResult<bool> {
        (**self).remove_data(key)
    }

    fn keys(&self) -> TrackResult<Vec<String>> {
        (**self).keys()
    }
}
