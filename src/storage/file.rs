//! Single-file byte store.
//!
//! All slots live in one MessagePack document (`{version, entries}`) that is
//! loaded when the store is opened and rewritten after every mutation. Writes
//! go to a temp file in the same directory which then replaces the target, so
//! a crash mid-write leaves the previous document intact.

use super::data_store::DataStore;
use crate::core::{TrackError, TrackResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;
use tracing::{Level, event};

const DATA_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DataFile {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug)]
pub struct FileDataStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl FileDataStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| {
                TrackError::Storage(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            let file: DataFile = rmp_serde::from_slice(&bytes).map_err(|e| {
                TrackError::Storage(format!("Corrupted data file '{}': {}", path.display(), e))
            })?;
            if file.version != DATA_FILE_VERSION {
                return Err(TrackError::Storage(format!(
                    "Unsupported data file version {} in '{}'",
                    file.version,
                    path.display()
                )));
            }
            event!(Level::DEBUG, path = %path.display(), entries = file.entries.len(), "data file loaded");
            file.entries
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Open `file_name` inside `dir`, creating the directory when missing.
    pub fn open_in<P: AsRef<Path>>(dir: P, file_name: &str) -> TrackResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            TrackError::Storage(format!("Failed to create directory '{}': {}", dir.display(), e))
        })?;
        Self::open(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, Vec<u8>>) -> TrackResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| {
            TrackError::Storage(format!("Failed to create directory '{}': {}", dir.display(), e))
        })?;

        let document = DataFile {
            version: DATA_FILE_VERSION,
            entries: entries.clone(),
        };
        let bytes = rmp_serde::to_vec(&document)
            .map_err(|e| TrackError::Storage(format!("Failed to encode data file: {}", e)))?;

        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| TrackError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&bytes)
            .map_err(|e| TrackError::Storage(format!("Failed to write temp file: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| TrackError::Storage(format!("Failed to sync temp file: {}", e)))?;
        temp.persist(&self.path).map_err(|e| {
            TrackError::Storage(format!(
                "Failed to replace '{}': {}",
                self.path.display(),
                e.error
            ))
        })?;

        event!(Level::DEBUG, path = %self.path.display(), entries = entries.len(), "data file flushed");
        Ok(())
    }
}

impl DataStore for FileDataStore {
    fn set_data(&self, key: &str, data: Vec<u8>) -> TrackResult<()> {
        let mut entries = self.entries.write()?;
        let previous = entries.insert(key.to_string(), data);
        if let Err(err) = self.flush(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn get_data(&self, key: &str) -> TrackResult<Option<Vec<u8>>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn contains_key(&self, key: &str) -> TrackResult<bool> {
        Ok(self.entries.read()?.contains_key(key))
    }

    fn remove_data(&self, key: &str) -> TrackResult<bool> {
        let mut entries = self.entries.write()?;
        let Some(previous) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(err) = self.flush(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(true)
    }

    fn keys(&self) -> TrackResult<Vec<String>> {
        Ok(self.entries.read()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reopen_sees_previous_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        {
            let store = FileDataStore::open(&path).unwrap();
            store.set_data("Window_main.Width", b"800".to_vec()).unwrap();
            store.set_data("Window_main.Height", b"600".to_vec()).unwrap();
            assert!(store.remove_data("Window_main.Height").unwrap());
        }

        let reopened = FileDataStore::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["Window_main.Width".to_string()]);
        assert_eq!(
            reopened.get_data("Window_main.Width").unwrap(),
            Some(b"800".to_vec())
        );
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = FileDataStore::open_in(dir.path().join("nested"), "state.bin").unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupted_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        fs::write(&path, b"definitely not msgpack").unwrap();

        let err = FileDataStore::open(&path).unwrap_err();
        assert!(matches!(err, TrackError::Storage(_)));
    }
}
