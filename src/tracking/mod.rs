pub mod configuration;
pub mod lifecycle;
pub mod tracker;

pub use configuration::{PersistMode, Tracked, TrackingAware, TrackingConfiguration, tracked};
pub use lifecycle::{
    AfterHandler, BeforeHandler, Operation, OperationReport, OperationStatus, PropertyOutcome,
    PropertyStatus, TrackingOperationEvent,
};
pub use tracker::Tracker;
