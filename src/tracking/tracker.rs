//! Registry of tracking configurations.

use super::configuration::{ErasedConfiguration, PersistMode, Tracked, TrackingConfiguration};
use super::lifecycle::OperationReport;
use crate::core::{TrackError, TrackResult};
use crate::metadata::{MetadataResolver, Trackable};
use crate::storage::{InMemoryObjectStore, ObjectStore};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, event};

/// Owns every configuration of a session and drives bulk operations.
///
/// The tracker never owns the tracked objects: it holds weak references and
/// configurations whose objects are gone simply stop doing work.
///
/// # Examples
///
/// ```
/// use settings_tracker::{Property, TrackResult, Trackable, Tracker, TypeDescriptor, tracked};
///
/// struct Person { id: u32, name: String }
///
/// impl Trackable for Person {
///     fn describe() -> TrackResult<TypeDescriptor<Self>> {
///         TypeDescriptor::builder("Person")
///             .trackable(true)
///             .property(Property::new("Id", |p: &Person| &p.id, |p, v| p.id = v).key())
///             .property(Property::new("Name", |p: &Person| &p.name, |p, v| p.name = v))
///             .build()
///     }
/// }
///
/// # fn main() -> TrackResult<()> {
/// let tracker = Tracker::in_memory();
/// let ada = tracked(Person { id: 42, name: "Ada".into() });
/// tracker.configure(&ada)?.persist();
///
/// let fresh = tracked(Person { id: 42, name: String::new() });
/// tracker.configure(&fresh)?.apply();
/// assert_eq!(fresh.read().unwrap().name, "Ada");
/// # Ok(())
/// # }
/// ```
pub struct Tracker {
    name: Option<String>,
    store: Arc<dyn ObjectStore>,
    resolver: Arc<MetadataResolver>,
    configurations: Mutex<Vec<Arc<dyn ErasedConfiguration>>>,
}

impl Tracker {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: None,
            store,
            resolver: MetadataResolver::global(),
            configurations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_store<O: ObjectStore + 'static>(store: O) -> Self {
        Self::new(Arc::new(store))
    }

    /// Tracker backed by a JSON-encoded in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(InMemoryObjectStore::in_memory())
    }

    /// Context name; selects which trackability markers apply.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<MetadataResolver> {
        &self.resolver
    }

    /// Return the configuration for `target`, creating it on first use.
    ///
    /// Identity-based: calling this twice with the same object returns the
    /// same configuration.
    pub fn configure<T: Trackable>(
        &self,
        target: &Tracked<T>,
    ) -> TrackResult<TrackingConfiguration<T>> {
        if let Some(existing) = self.configuration(target)? {
            return Ok(existing);
        }

        let descriptor = self.resolver.descriptor::<T>()?;
        let metadata = self.resolver.resolve::<T>(self.name())?;
        let created =
            TrackingConfiguration::create(target, descriptor, &metadata, self.store.clone())?;

        {
            let mut configurations = self.configurations.lock()?;
            if let Some(existing) = find(&configurations, target)? {
                return Ok(existing);
            }
            configurations.push(Arc::new(created.clone()));
        }

        // Only the registering caller reaches this point, and the registry
        // lock is released so the hook may call back into the tracker.
        created.initialize(target)?;
        event!(
            Level::DEBUG,
            type_name = created.type_name(),
            key = %created.key(),
            tracker = ?self.name,
            "tracking configuration created"
        );
        Ok(created)
    }

    /// Existing configuration for `target`, if any.
    pub fn configuration<T: Trackable>(
        &self,
        target: &Tracked<T>,
    ) -> TrackResult<Option<TrackingConfiguration<T>>> {
        let configurations = self.configurations.lock()?;
        find(&configurations, target)
    }

    pub fn is_configured<T: Trackable>(&self, target: &Tracked<T>) -> bool {
        matches!(self.configuration(target), Ok(Some(_)))
    }

    /// Apply every configuration in registration order.
    pub fn apply_all(&self) -> TrackResult<Vec<OperationReport>> {
        Ok(self
            .snapshot()?
            .iter()
            .map(|configuration| configuration.apply())
            .collect())
    }

    pub fn apply_state<T: Trackable>(&self, target: &Tracked<T>) -> TrackResult<OperationReport> {
        Ok(self.require(target)?.apply())
    }

    pub fn persist_state<T: Trackable>(&self, target: &Tracked<T>) -> TrackResult<OperationReport> {
        Ok(self.require(target)?.persist())
    }

    /// Persist every live configuration in automatic mode.
    ///
    /// Meant to be called by the host at a lifecycle moment such as shutdown.
    pub fn persist_automatic_targets(&self) -> TrackResult<Vec<OperationReport>> {
        Ok(self
            .snapshot()?
            .iter()
            .filter(|configuration| {
                configuration.mode() == PersistMode::Automatic && configuration.is_alive()
            })
            .map(|configuration| configuration.persist())
            .collect())
    }

    /// Forget configurations whose objects are gone. Returns how many were removed.
    pub fn prune_dropped(&self) -> TrackResult<usize> {
        let mut configurations = self.configurations.lock()?;
        let before = configurations.len();
        configurations.retain(|configuration| configuration.is_alive());
        Ok(before - configurations.len())
    }

    pub fn len(&self) -> usize {
        self.configurations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> TrackResult<Vec<Arc<dyn ErasedConfiguration>>> {
        Ok(self.configurations.lock()?.clone())
    }

    fn require<T: Trackable>(&self, target: &Tracked<T>) -> TrackResult<TrackingConfiguration<T>> {
        match self.configuration(target)? {
            Some(configuration) => Ok(configuration),
            None => {
                let type_name = std::any::type_name::<T>();
                event!(Level::ERROR, type_name, "target was never configured");
                Err(TrackError::ConfigurationNotFound(type_name.to_string()))
            }
        }
    }
}

fn find<T: Trackable>(
    configurations: &[Arc<dyn ErasedConfiguration>],
    target: &Tracked<T>,
) -> TrackResult<Option<TrackingConfiguration<T>>> {
    let addr = Arc::as_ptr(target) as *const () as usize;
    let Some(found) = configurations
        .iter()
        .find(|configuration| configuration.target_addr() == addr)
    else {
        return Ok(None);
    };

    found
        .as_any()
        .downcast_ref::<TrackingConfiguration<T>>()
        .cloned()
        .map(Some)
        .ok_or_else(|| TrackError::DescriptorMismatch(found.type_name().to_string()))
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.name)
            .field("configurations", &self.len())
            .finish()
    }
}
