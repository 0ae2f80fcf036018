use crate::core::{TrackError, TrackResult};
use crate::serialization::SerializationFormat;
use crate::storage::{DataStore, FileDataStore, MemoryDataStore, ObjectStore, SerializedObjectStore};
use crate::tracking::Tracker;
use std::path::PathBuf;
use std::sync::Arc;

/// Where tracked values end up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    File(PathBuf),
}

/// Tracker configuration
///
/// Similar to a connection string: `memory://` or
/// `file:///path/to/state.bin?format=msgpack&name=main`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackerConfig {
    /// Tracker context name (selects which trackability markers apply)
    pub name: Option<String>,

    /// Storage medium
    pub backend: StorageBackend,

    /// Value encoding inside the store
    pub format: SerializationFormat,
}

impl TrackerConfig {
    /// In-memory, JSON-encoded, unnamed tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracker context name
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Keep values in memory only
    pub fn memory(mut self) -> Self {
        self.backend = StorageBackend::Memory;
        self
    }

    /// Keep values in a single file
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend = StorageBackend::File(path.into());
        self
    }

    /// Set value encoding
    pub fn format(mut self, format: SerializationFormat) -> Self {
        self.format = format;
        self
    }

    /// Parse from a URL
    ///
    /// # Examples
    ///
    /// ```
    /// use settings_tracker::{SerializationFormat, StorageBackend, TrackerConfig};
    ///
    /// let config = TrackerConfig::from_url("file:///tmp/app/state.bin?format=msgpack&name=main").unwrap();
    /// assert_eq!(config.backend, StorageBackend::File("/tmp/app/state.bin".into()));
    /// assert_eq!(config.format, SerializationFormat::MessagePack);
    /// assert_eq!(config.name.as_deref(), Some("main"));
    /// ```
    pub fn from_url(url: &str) -> TrackResult<Self> {
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let mut config = if let Some(rest) = location.strip_prefix("memory://") {
            if !rest.is_empty() {
                return Err(TrackError::InvalidConfig(format!(
                    "memory:// takes no path, got '{}'",
                    rest
                )));
            }
            Self::new().memory()
        } else if let Some(path) = location.strip_prefix("file://") {
            Self::new().file(path)
        } else {
            return Err(TrackError::InvalidConfig(
                "URL must start with 'memory://' or 'file://'".to_string(),
            ));
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                TrackError::InvalidConfig(format!("Invalid query parameter '{}'", pair))
            })?;
            match key {
                "format" => config.format = value.parse()?,
                "name" => config.name = Some(value.to_string()),
                other => {
                    return Err(TrackError::InvalidConfig(format!(
                        "Unknown parameter '{}'",
                        other
                    )));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to URL form
    pub fn to_url(&self) -> String {
        let location = match &self.backend {
            StorageBackend::Memory => "memory://".to_string(),
            StorageBackend::File(path) => format!("file://{}", path.display()),
        };
        let mut url = format!("{}?format={}", location, self.format);
        if let Some(name) = &self.name {
            url.push_str("&name=");
            url.push_str(name);
        }
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> TrackResult<()> {
        if matches!(&self.name, Some(name) if name.is_empty()) {
            return Err(TrackError::InvalidConfig(
                "Tracker name cannot be empty".to_string(),
            ));
        }

        if let StorageBackend::File(path) = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(TrackError::InvalidConfig(
                    "File path cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build the object store described by this configuration
    pub fn build_store(&self) -> TrackResult<Arc<dyn ObjectStore>> {
        self.validate()?;
        let data_store: Arc<dyn DataStore> = match &self.backend {
            StorageBackend::Memory => Arc::new(MemoryDataStore::new()),
            StorageBackend::File(path) => Arc::new(FileDataStore::open(path)?),
        };
        Ok(Arc::new(SerializedObjectStore::new(
            data_store,
            self.format.serializer(),
        )))
    }
}

impl Tracker {
    /// Create a tracker from configuration
    pub fn from_config(config: &TrackerConfig) -> TrackResult<Self> {
        let tracker = Tracker::new(config.build_store()?);
        Ok(match &config.name {
            Some(name) => tracker.with_name(name.clone()),
            None => tracker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.backend, StorageBackend::Memory);
        assert_eq!(config.format, SerializationFormat::Json);
        assert!(config.name.is_none());
        assert_eq!(config.to_url(), "memory://?format=json");
    }

    #[test]
    fn test_url_round_trip() {
        let config = TrackerConfig::new()
            .file("/var/lib/app/state.bin")
            .format(SerializationFormat::MessagePack)
            .name("main");
        let parsed = TrackerConfig::from_url(&config.to_url()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_urls() {
        assert!(TrackerConfig::from_url("redis://localhost").is_err());
        assert!(TrackerConfig::from_url("memory://somewhere").is_err());
        assert!(TrackerConfig::from_url("memory://?format=yaml").is_err());
        assert!(TrackerConfig::from_url("memory://?colour=blue").is_err());
        assert!(TrackerConfig::from_url("memory://?name=").is_err());
        assert!(TrackerConfig::from_url("file://").is_err());
    }

    #[test]
    fn test_from_config_applies_name() {
        let tracker = Tracker::from_config(&TrackerConfig::new().name("layout")).unwrap();
        assert_eq!(tracker.name(), Some("layout"));
        assert!(tracker.is_empty());
    }
}
