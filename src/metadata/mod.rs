pub mod descriptor;
pub mod resolver;

pub use descriptor::{
    ConfigureHook, Getter, Property, PropertyRef, Setter, Trackable, TrackableMarker,
    TypeDescriptor, TypeDescriptorBuilder,
};
pub use resolver::{MetadataResolver, TypeMetadata};
