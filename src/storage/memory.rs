use super::data_store::DataStore;
use crate::core::TrackResult;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Process-local byte store. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataStore for MemoryDataStore {
    fn set_data(&self, key: &str, data: Vec<u8>) -> TrackResult<()> {
        self.entries.write()?.insert(key.to_string(), data);
        Ok(())
    }

    fn get_data(&self, key: &str) -> TrackResult<Option<Vec<u8>>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn contains_key(&self, key: &str) -> TrackResult<bool> {
        Ok(self.entries.read()?.contains_key(key))
    }

    fn remove_data(&self, key: &str) -> TrackResult<bool> {
        Ok(self.entries.write()?.remove(key).is_some())
    }

    fn keys(&self) -> TrackResult<Vec<String>> {
        Ok(self.entries.read()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryDataStore::new();
        store.set_data("Person_42.Name", b"Ada".to_vec()).unwrap();

        assert!(store.contains_key("Person_42.Name").unwrap());
        assert_eq!(store.get_data("Person_42.Name").unwrap(), Some(b"Ada".to_vec()));
        assert_eq!(store.get_data("Person_42.Age").unwrap(), None);

        assert!(store.remove_data("Person_42.Name").unwrap());
        assert!(!store.remove_data("Person_42.Name").unwrap());
        assert!(store.is_empty());
    }
}
