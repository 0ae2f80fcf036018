//! Per-type property tables and trackability markers.
//!
//! A [`TypeDescriptor`] is the explicit replacement for runtime reflection: it
//! lists every property a type exposes (name plus getter/setter pair), the
//! class-level and property-level trackability markers per tracker context,
//! the designated key property, and the optional capability hooks the tracking
//! core checks for at configuration time.
//!
//! Descriptors are usually produced by `#[derive(Trackable)]`, but can be
//! written by hand with [`TypeDescriptor::builder`]:
//!
//! ```
//! use settings_tracker::{Property, TrackResult, Trackable, TypeDescriptor};
//!
//! struct Person {
//!     id: u32,
//!     name: String,
//!     secret: String,
//! }
//!
//! impl Trackable for Person {
//!     fn describe() -> TrackResult<TypeDescriptor<Self>> {
//!         TypeDescriptor::builder("Person")
//!             .trackable(true)
//!             .property(Property::new("Id", |p: &Person| &p.id, |p, v| p.id = v).key())
//!             .property(Property::new("Name", |p: &Person| &p.name, |p, v| p.name = v))
//!             .property(Property::new("Secret", |p: &Person| &p.secret, |p, v| p.secret = v))
//!             .exclude("Secret")
//!             .build()
//!     }
//! }
//! ```

use crate::core::{
    PropertyValue, TrackError, TrackResult, from_property_value, to_property_value,
};
use crate::events::{EventHub, Signal};
use crate::tracking::{TrackingAware, TrackingConfiguration};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type whose properties can be persisted by a [`crate::Tracker`].
pub trait Trackable: Send + Sync + Sized + 'static {
    /// Declare the type's properties, markers and capabilities.
    ///
    /// Called at most once per type and resolver; the result is cached.
    fn describe() -> TrackResult<TypeDescriptor<Self>>;
}

pub type Getter<T> = Arc<dyn Fn(&T) -> TrackResult<PropertyValue> + Send + Sync>;
pub type Setter<T> = Arc<dyn Fn(&mut T, PropertyValue) -> TrackResult<()> + Send + Sync>;
pub type ConfigureHook<T> = Arc<dyn Fn(&T, &TrackingConfiguration<T>) + Send + Sync>;

/// Trackable / not-trackable marker scoped to a tracker context.
///
/// `context == None` addresses trackers that have no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackableMarker {
    pub context: Option<String>,
    pub trackable: bool,
}

fn set_marker(markers: &mut Vec<TrackableMarker>, context: Option<String>, trackable: bool) {
    match markers.iter_mut().find(|marker| marker.context == context) {
        Some(existing) => existing.trackable = trackable,
        None => markers.push(TrackableMarker { context, trackable }),
    }
}

fn marker_for(markers: &[TrackableMarker], context: Option<&str>) -> Option<bool> {
    markers
        .iter()
        .find(|marker| marker.context.as_deref() == context)
        .map(|marker| marker.trackable)
}

/// One named property with its accessor pair.
pub struct Property<T> {
    name: String,
    getter: Getter<T>,
    setter: Setter<T>,
    markers: Vec<TrackableMarker>,
    is_key: bool,
}

impl<T: 'static> Property<T> {
    /// Property backed by a field-like accessor pair of type `V`.
    pub fn new<V, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        V: Serialize + DeserializeOwned + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        Self::from_accessors(
            name,
            Arc::new(move |target: &T| to_property_value(&get_name, get(target))),
            Arc::new(move |target: &mut T, value: PropertyValue| {
                let typed = from_property_value::<V>(&set_name, value)?;
                set(target, typed);
                Ok(())
            }),
        )
    }

    /// Property whose getter produces an owned value, e.g. a computed one.
    pub fn computed<V, G, S>(name: impl Into<String>, get: G, set: S) -> Self
    where
        V: Serialize + DeserializeOwned + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();
        Self::from_accessors(
            name,
            Arc::new(move |target: &T| to_property_value(&get_name, &get(target))),
            Arc::new(move |target: &mut T, value: PropertyValue| {
                let typed = from_property_value::<V>(&set_name, value)?;
                set(target, typed);
                Ok(())
            }),
        )
    }

    /// Property working directly on opaque values.
    pub fn from_accessors(name: impl Into<String>, getter: Getter<T>, setter: Setter<T>) -> Self {
        Self {
            name: name.into(),
            getter,
            setter,
            markers: Vec::new(),
            is_key: false,
        }
    }

    pub fn trackable(mut self, trackable: bool) -> Self {
        set_marker(&mut self.markers, None, trackable);
        self
    }

    pub fn trackable_in(mut self, context: impl Into<String>, trackable: bool) -> Self {
        set_marker(&mut self.markers, Some(context.into()), trackable);
        self
    }

    /// Mark this property as the per-instance identity key.
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

impl<T> Property<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn marker_for(&self, context: Option<&str>) -> Option<bool> {
        marker_for(&self.markers, context)
    }

    pub fn get(&self, target: &T) -> TrackResult<PropertyValue> {
        (self.getter)(target)
    }

    pub fn set(&self, target: &mut T, value: PropertyValue) -> TrackResult<()> {
        (self.setter)(target, value)
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .field("is_key", &self.is_key)
            .finish()
    }
}

/// Compile-time reference to a property of `T`.
///
/// Only usable with configurations of the same target type, which rules out
/// naming a property of the wrong type.
pub struct PropertyRef<T> {
    name: &'static str,
    _target: PhantomData<fn(&T)>,
}

impl<T> PropertyRef<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _target: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PropertyRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyRef<T> {}

impl<T> fmt::Debug for PropertyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyRef").field(&self.name).finish()
    }
}

pub(crate) struct Capabilities<T> {
    pub on_configure: Option<ConfigureHook<T>>,
    pub persist_requests: Option<fn(&T) -> Signal>,
    pub event_source: Option<fn(&T) -> &EventHub>,
}

impl<T> Default for Capabilities<T> {
    fn default() -> Self {
        Self {
            on_configure: None,
            persist_requests: None,
            event_source: None,
        }
    }
}

/// Everything the tracking core knows about a type.
pub struct TypeDescriptor<T> {
    type_name: String,
    properties: Vec<Property<T>>,
    class_markers: Vec<TrackableMarker>,
    capabilities: Capabilities<T>,
}

impl<T: 'static> TypeDescriptor<T> {
    pub fn builder(type_name: impl Into<String>) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            type_name: type_name.into(),
            properties: Vec::new(),
            class_markers: Vec::new(),
            exclusions: Vec::new(),
            capabilities: Capabilities::default(),
        }
    }
}

impl<T> TypeDescriptor<T> {
    /// Runtime type name used as the first segment of every store key.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[Property<T>] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property<T>> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn key_property(&self) -> Option<&Property<T>> {
        self.properties.iter().find(|property| property.is_key)
    }

    pub fn class_marker_for(&self, context: Option<&str>) -> Option<bool> {
        marker_for(&self.class_markers, context)
    }

    pub fn is_self_configuring(&self) -> bool {
        self.capabilities.on_configure.is_some()
    }

    pub fn requests_persistence(&self) -> bool {
        self.capabilities.persist_requests.is_some()
    }

    pub fn has_event_source(&self) -> bool {
        self.capabilities.event_source.is_some()
    }

    pub(crate) fn capabilities(&self) -> &Capabilities<T> {
        &self.capabilities
    }
}

impl<T> fmt::Debug for TypeDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("properties", &self.properties)
            .field("class_markers", &self.class_markers)
            .finish()
    }
}

pub struct TypeDescriptorBuilder<T> {
    type_name: String,
    properties: Vec<Property<T>>,
    class_markers: Vec<TrackableMarker>,
    exclusions: Vec<(String, Option<String>)>,
    capabilities: Capabilities<T>,
}

impl<T: 'static> TypeDescriptorBuilder<T> {
    /// Class-level marker for unnamed trackers.
    pub fn trackable(mut self, trackable: bool) -> Self {
        set_marker(&mut self.class_markers, None, trackable);
        self
    }

    /// Class-level marker for the tracker named `context`.
    pub fn trackable_in(mut self, context: impl Into<String>, trackable: bool) -> Self {
        set_marker(&mut self.class_markers, Some(context.into()), trackable);
        self
    }

    pub fn property(mut self, property: Property<T>) -> Self {
        self.properties.push(property);
        self
    }

    /// Mark an already declared (or later declared) property as not
    /// trackable for unnamed trackers.
    pub fn exclude(mut self, property: impl Into<String>) -> Self {
        self.exclusions.push((property.into(), None));
        self
    }

    pub fn exclude_in(mut self, context: impl Into<String>, property: impl Into<String>) -> Self {
        self.exclusions.push((property.into(), Some(context.into())));
        self
    }

    /// Hook invoked once when a configuration for an instance is created.
    pub fn on_configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T, &TrackingConfiguration<T>) + Send + Sync + 'static,
    {
        self.capabilities.on_configure = Some(Arc::new(hook));
        self
    }

    pub fn tracking_aware(self) -> Self
    where
        T: TrackingAware,
    {
        self.on_configure(|target: &T, configuration: &TrackingConfiguration<T>| {
            target.init_tracking(configuration)
        })
    }

    /// Signal the instance raises to ask for immediate persistence.
    pub fn persist_requests(mut self, accessor: fn(&T) -> Signal) -> Self {
        self.capabilities.persist_requests = Some(accessor);
        self
    }

    /// Events the instance exposes for `register_persist_trigger`.
    pub fn event_source(mut self, accessor: fn(&T) -> &EventHub) -> Self {
        self.capabilities.event_source = Some(accessor);
        self
    }

    pub fn build(mut self) -> TrackResult<TypeDescriptor<T>> {
        let mut seen = HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(TrackError::DuplicateProperty {
                    type_name: self.type_name.clone(),
                    property: property.name.clone(),
                });
            }
        }

        let keys = self
            .properties
            .iter()
            .filter(|property| property.is_key)
            .map(|property| property.name.clone())
            .collect::<Vec<_>>();
        if keys.len() > 1 {
            return Err(TrackError::AmbiguousKey {
                type_name: self.type_name,
                properties: keys,
            });
        }

        for (name, context) in std::mem::take(&mut self.exclusions) {
            let property = self
                .properties
                .iter_mut()
                .find(|property| property.name == name)
                .ok_or_else(|| TrackError::PropertyNotFound {
                    type_name: self.type_name.clone(),
                    property: name.clone(),
                })?;
            set_marker(&mut property.markers, context, false);
        }

        Ok(TypeDescriptor {
            type_name: self.type_name,
            properties: self.properties,
            class_markers: self.class_markers,
            capabilities: self.capabilities,
        })
    }
}
