// ============================================================================
// Settings Tracker Library
// ============================================================================

//! Persist selected properties of live objects and restore them later.
//!
//! A type describes itself through [`Trackable`] (usually via
//! `#[derive(Trackable)]`). A [`Tracker`] creates one
//! [`TrackingConfiguration`] per object; the configuration copies values
//! between the object and an [`ObjectStore`] under keys of the form
//! `"{TypeName}_{Key}.{Property}"`.
//!
//! # Examples
//!
//! ```
//! use settings_tracker::{Trackable, Tracker, tracked};
//!
//! #[derive(Trackable)]
//! #[trackable]
//! struct Window {
//!     #[tracking_key]
//!     id: String,
//!     width: u32,
//!     height: u32,
//! }
//!
//! let tracker = Tracker::in_memory();
//! let main = tracked(Window { id: "main".into(), width: 800, height: 600 });
//! tracker.configure(&main).unwrap().persist();
//!
//! let restored = tracked(Window { id: "main".into(), width: 0, height: 0 });
//! tracker.configure(&restored).unwrap().apply();
//! assert_eq!(restored.read().unwrap().width, 800);
//! ```

pub mod config;
pub mod core;
pub mod events;
pub mod metadata;
pub mod serialization;
pub mod storage;
pub mod tracking;

pub use config::{StorageBackend, TrackerConfig};
pub use core::{PropertyValue, TrackError, TrackResult};
pub use events::{EventHandler, EventHub, EventSource, Signal};
pub use metadata::{
    MetadataResolver, Property, PropertyRef, Trackable, TrackableMarker, TypeDescriptor,
    TypeDescriptorBuilder, TypeMetadata,
};
pub use serialization::{JsonSerializer, MessagePackSerializer, SerializationFormat, Serializer};
pub use storage::{
    DataStore, FileDataStore, InMemoryObjectStore, MemoryDataStore, ObjectStore,
    SerializedObjectStore,
};
pub use tracking::{
    Operation, OperationReport, OperationStatus, PersistMode, PropertyOutcome, PropertyStatus,
    Tracked, Tracker, TrackingAware, TrackingConfiguration, TrackingOperationEvent, tracked,
};

pub use settings_tracker_derive::Trackable;
