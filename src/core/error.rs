use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("No tracking configuration registered for target of type '{0}'")]
    ConfigurationNotFound(String),

    #[error("Property '{property}' not found on type '{type_name}'")]
    PropertyNotFound { type_name: String, property: String },

    #[error("Type mismatch for property '{property}': {message}")]
    TypeMismatch { property: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key '{0}' not found in store")]
    KeyNotFound(String),

    #[error("Type '{type_name}' declares more than one key property: {properties:?}")]
    AmbiguousKey {
        type_name: String,
        properties: Vec<String>,
    },

    #[error("Type '{type_name}' declares property '{property}' more than once")]
    DuplicateProperty { type_name: String, property: String },

    #[error("Cached descriptor does not match type '{0}'")]
    DescriptorMismatch(String),

    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Type '{0}' does not expose an event source")]
    MissingEventSource(String),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type TrackResult<T> = std::result::Result<T, TrackError>;

impl<T> From<std::sync::PoisonError<T>> for TrackError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
