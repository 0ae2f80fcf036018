//! Per-instance tracking configuration: the Apply / Persist engine.

use super::lifecycle::{
    LifecycleHooks, Operation, OperationReport, OperationStatus, PropertyOutcome, PropertyStatus,
    TrackingOperationEvent,
};
use crate::core::{TrackError, TrackResult, key_string};
use crate::events::{EventHub, EventSource};
use crate::metadata::{Property, PropertyRef, Trackable, TypeDescriptor, TypeMetadata};
use crate::storage::ObjectStore;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};
use tracing::{Level, event};

/// Shared handle to a tracked object. The tracker only keeps weak references.
pub type Tracked<T> = Arc<RwLock<T>>;

pub fn tracked<T>(value: T) -> Tracked<T> {
    Arc::new(RwLock::new(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Swept by [`crate::Tracker::persist_automatic_targets`].
    #[default]
    Automatic,
    /// Persisted only on explicit request or by a registered trigger.
    Manual,
}

/// Self-configuring capability: the object adjusts its own configuration
/// when it is first configured.
///
/// Register with [`crate::TypeDescriptorBuilder::tracking_aware`] or
/// `#[trackable(aware)]`. The hook runs while the target is read-locked, so
/// it must not call `apply` or `persist` on the configuration.
pub trait TrackingAware: Trackable {
    fn init_tracking(&self, configuration: &TrackingConfiguration<Self>);
}

struct ConfigurationState {
    key: String,
    properties: BTreeSet<String>,
    mode: PersistMode,
}

struct ConfigurationInner<T> {
    target: Weak<RwLock<T>>,
    descriptor: Arc<TypeDescriptor<T>>,
    store: Arc<dyn ObjectStore>,
    events: Option<EventHub>,
    state: Mutex<ConfigurationState>,
    applied: AtomicBool,
    hooks: Mutex<LifecycleHooks>,
}

/// Binds one tracked object to its tracked properties, key and mode.
///
/// Cloning yields another handle to the same configuration.
pub struct TrackingConfiguration<T> {
    inner: Arc<ConfigurationInner<T>>,
}

impl<T> Clone for TrackingConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Trackable> TrackingConfiguration<T> {
    /// Build a configuration without side effects on the target.
    ///
    /// The self-configure hook and event subscriptions are installed by
    /// [`Self::initialize`], which the registry calls exactly once per target.
    pub(crate) fn create(
        target: &Tracked<T>,
        descriptor: Arc<TypeDescriptor<T>>,
        metadata: &TypeMetadata,
        store: Arc<dyn ObjectStore>,
    ) -> TrackResult<Self> {
        let guard = target.read()?;

        let key = match &metadata.key_property_name {
            Some(name) => {
                let property =
                    descriptor
                        .property(name)
                        .ok_or_else(|| TrackError::PropertyNotFound {
                            type_name: descriptor.type_name().to_string(),
                            property: name.clone(),
                        })?;
                key_string(&property.get(&*guard)?)
            }
            None => String::new(),
        };

        let events = descriptor
            .capabilities()
            .event_source
            .map(|accessor| accessor(&*guard).clone());
        drop(guard);

        Ok(Self {
            inner: Arc::new(ConfigurationInner {
                target: Arc::downgrade(target),
                descriptor,
                store,
                events,
                state: Mutex::new(ConfigurationState {
                    key,
                    properties: metadata.trackable_property_names.iter().cloned().collect(),
                    mode: PersistMode::default(),
                }),
                applied: AtomicBool::new(false),
                hooks: Mutex::new(LifecycleHooks::default()),
            }),
        })
    }

    /// Run the self-configure hook, then subscribe to the target's
    /// persist-request signal.
    pub(crate) fn initialize(&self, target: &Tracked<T>) -> TrackResult<()> {
        let capabilities = self.inner.descriptor.capabilities();
        let guard = target.read()?;
        let persist_requests = capabilities
            .persist_requests
            .map(|accessor| accessor(&*guard));
        if let Some(hook) = &capabilities.on_configure {
            hook(&*guard, self);
        }
        drop(guard);

        if let Some(signal) = persist_requests {
            let weak = Arc::downgrade(&self.inner);
            signal.subscribe(move || {
                if let Some(inner) = weak.upgrade() {
                    TrackingConfiguration { inner }.persist();
                }
            })?;
        }
        Ok(())
    }

    pub fn add_properties<I, S>(&self, properties: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state();
        for property in properties {
            state.properties.insert(property.into());
        }
        drop(state);
        self
    }

    pub fn remove_properties<I, S>(&self, properties: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state();
        for property in properties {
            state.properties.remove(property.as_ref());
        }
        drop(state);
        self
    }

    pub fn add_property_refs(&self, properties: &[PropertyRef<T>]) -> &Self {
        self.add_properties(properties.iter().map(PropertyRef::name))
    }

    pub fn remove_property_refs(&self, properties: &[PropertyRef<T>]) -> &Self {
        self.remove_properties(properties.iter().map(PropertyRef::name))
    }

    pub fn set_mode(&self, mode: PersistMode) -> &Self {
        self.state().mode = mode;
        self
    }

    pub fn set_key(&self, key: impl Into<String>) -> &Self {
        self.state().key = key.into();
        self
    }

    /// Persist whenever the target's own `event` fires, once state has been
    /// applied at least once. Switches the configuration to manual mode.
    pub fn register_persist_trigger(&self, event: &str) -> TrackResult<&Self> {
        let hub = self.inner.events.as_ref().ok_or_else(|| {
            TrackError::MissingEventSource(self.inner.descriptor.type_name().to_string())
        })?;
        self.register_persist_trigger_on(event, hub)
    }

    /// Persist whenever `event` fires on `source`, once state has been
    /// applied at least once. Switches the configuration to manual mode.
    ///
    /// Until the first apply, firing the trigger is ignored so a freshly
    /// constructed object cannot overwrite stored state with its defaults.
    pub fn register_persist_trigger_on(
        &self,
        event: &str,
        source: &dyn EventSource,
    ) -> TrackResult<&Self> {
        let weak = Arc::downgrade(&self.inner);
        source.add_event_handler(
            event,
            Arc::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.applied.load(Ordering::SeqCst) {
                    TrackingConfiguration { inner }.persist();
                }
            }),
        )?;
        self.set_mode(PersistMode::Manual);
        Ok(self)
    }

    pub fn on_applying<F>(&self, handler: F) -> &Self
    where
        F: Fn(&mut TrackingOperationEvent) + Send + Sync + 'static,
    {
        self.hooks().applying.push(Arc::new(handler));
        self
    }

    pub fn on_applied<F>(&self, handler: F) -> &Self
    where
        F: Fn(&OperationReport) + Send + Sync + 'static,
    {
        self.hooks().applied.push(Arc::new(handler));
        self
    }

    pub fn on_persisting<F>(&self, handler: F) -> &Self
    where
        F: Fn(&mut TrackingOperationEvent) + Send + Sync + 'static,
    {
        self.hooks().persisting.push(Arc::new(handler));
        self
    }

    pub fn on_persisted<F>(&self, handler: F) -> &Self
    where
        F: Fn(&OperationReport) + Send + Sync + 'static,
    {
        self.hooks().persisted.push(Arc::new(handler));
        self
    }

    /// Load every tracked property that has a stored value into the target.
    pub fn apply(&self) -> OperationReport {
        let report = self.run(Operation::Apply);
        if report.is_completed() {
            self.inner.applied.store(true, Ordering::SeqCst);
        }
        report
    }

    /// Write every tracked property's current value to the store.
    pub fn persist(&self) -> OperationReport {
        self.run(Operation::Persist)
    }

    fn run(&self, operation: Operation) -> OperationReport {
        let type_name = self.type_name();

        let Some(target) = self.inner.target.upgrade() else {
            let key = self.key();
            event!(Level::DEBUG, type_name, key = %key, ?operation, "target dropped, skipping");
            return OperationReport::skipped(
                operation,
                type_name,
                &key,
                OperationStatus::TargetDropped,
            );
        };

        if !self.fire_before(operation) {
            let key = self.key();
            event!(Level::DEBUG, type_name, key = %key, ?operation, "cancelled by handler");
            return OperationReport::skipped(operation, type_name, &key, OperationStatus::Cancelled);
        }

        let (key, properties) = {
            let state = self.state();
            (state.key.clone(), state.properties.iter().cloned().collect::<Vec<_>>())
        };

        // Never block: the lock may be held by this very thread when the
        // target raises a trigger from one of its own methods.
        let outcomes = match operation {
            Operation::Apply => match target.try_write() {
                Ok(mut guard) => properties
                    .iter()
                    .map(|property| {
                        let store_key = self.construct_key(&key, property);
                        let result = self.apply_property(&mut *guard, property, &store_key);
                        self.outcome(operation, property, store_key, result)
                    })
                    .collect(),
                Err(TryLockError::WouldBlock) => return self.busy(operation, &key),
                Err(TryLockError::Poisoned(err)) => {
                    self.lock_failures(operation, &key, &properties, err)
                }
            },
            Operation::Persist => match target.try_read() {
                Ok(guard) => properties
                    .iter()
                    .map(|property| {
                        let store_key = self.construct_key(&key, property);
                        let result = self.persist_property(&*guard, property, &store_key);
                        self.outcome(operation, property, store_key, result)
                    })
                    .collect(),
                Err(TryLockError::WouldBlock) => return self.busy(operation, &key),
                Err(TryLockError::Poisoned(err)) => {
                    self.lock_failures(operation, &key, &properties, err)
                }
            },
        };
        drop(target);

        let report = OperationReport {
            operation,
            type_name: type_name.to_string(),
            key,
            status: OperationStatus::Completed,
            outcomes,
        };

        let handlers = self.hooks().after(operation);
        for handler in &handlers {
            handler(&report);
        }
        report
    }

    fn busy(&self, operation: Operation, key: &str) -> OperationReport {
        let type_name = self.type_name();
        event!(
            Level::WARN,
            type_name,
            key = %key,
            ?operation,
            "target is locked, skipping"
        );
        OperationReport::skipped(operation, type_name, key, OperationStatus::Busy)
    }

    fn apply_property(
        &self,
        target: &mut T,
        property: &str,
        store_key: &str,
    ) -> TrackResult<PropertyStatus> {
        let accessor = self.accessor(property)?;
        if !self.inner.store.contains_key(store_key)? {
            return Ok(PropertyStatus::NotStored);
        }
        let value = self.inner.store.retrieve(store_key)?;
        accessor.set(target, value)?;
        Ok(PropertyStatus::Applied)
    }

    fn persist_property(
        &self,
        target: &T,
        property: &str,
        store_key: &str,
    ) -> TrackResult<PropertyStatus> {
        let accessor = self.accessor(property)?;
        let value = accessor.get(target)?;
        self.inner.store.persist(&value, store_key)?;
        Ok(PropertyStatus::Persisted)
    }

    fn accessor(&self, property: &str) -> TrackResult<&Property<T>> {
        self.inner
            .descriptor
            .property(property)
            .ok_or_else(|| TrackError::PropertyNotFound {
                type_name: self.type_name().to_string(),
                property: property.to_string(),
            })
    }

    fn outcome(
        &self,
        operation: Operation,
        property: &str,
        store_key: String,
        result: TrackResult<PropertyStatus>,
    ) -> PropertyOutcome {
        let status = match result {
            Ok(status) => status,
            Err(err) => {
                event!(
                    Level::WARN,
                    key = %store_key,
                    property,
                    ?operation,
                    error = %err,
                    "tracked property failed"
                );
                PropertyStatus::Failed(err)
            }
        };
        PropertyOutcome {
            property: property.to_string(),
            store_key,
            status,
        }
    }

    fn lock_failures<E: fmt::Display>(
        &self,
        operation: Operation,
        key: &str,
        properties: &[String],
        err: E,
    ) -> Vec<PropertyOutcome> {
        let error = TrackError::LockError(err.to_string());
        properties
            .iter()
            .map(|property| {
                self.outcome(
                    operation,
                    property,
                    self.construct_key(key, property),
                    Err(error.clone()),
                )
            })
            .collect()
    }

    fn fire_before(&self, operation: Operation) -> bool {
        let handlers = self.hooks().before(operation);
        if handlers.is_empty() {
            return true;
        }
        let mut event = TrackingOperationEvent::new(operation, self.type_name(), &self.key());
        for handler in &handlers {
            handler(&mut event);
        }
        !event.is_cancelled()
    }
}

impl<T> TrackingConfiguration<T> {
    fn state(&self) -> MutexGuard<'_, ConfigurationState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks(&self) -> MutexGuard<'_, LifecycleHooks> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn construct_key(&self, key: &str, property: &str) -> String {
        format!("{}_{}.{}", self.type_name(), key, property)
    }

    /// Store key for `property`: `"{TypeName}_{Key}.{Property}"`.
    pub fn store_key(&self, property: &str) -> String {
        self.construct_key(&self.key(), property)
    }

    pub fn type_name(&self) -> &str {
        self.inner.descriptor.type_name()
    }

    pub fn key(&self) -> String {
        self.state().key.clone()
    }

    pub fn mode(&self) -> PersistMode {
        self.state().mode
    }

    /// Tracked property names, sorted.
    pub fn tracked_properties(&self) -> Vec<String> {
        self.state().properties.iter().cloned().collect()
    }

    pub fn is_tracking(&self, property: &str) -> bool {
        self.state().properties.contains(property)
    }

    /// Whether a completed apply has happened. Never resets.
    pub fn applied(&self) -> bool {
        self.inner.applied.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.target.strong_count() > 0
    }

    pub fn target(&self) -> Option<Tracked<T>> {
        self.inner.target.upgrade()
    }

    pub fn descriptor(&self) -> &TypeDescriptor<T> {
        &self.inner.descriptor
    }

    pub fn ptr_eq(&self, other: &TrackingConfiguration<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn target_addr(&self) -> usize {
        self.inner.target.as_ptr() as *const () as usize
    }
}

impl<T> fmt::Debug for TrackingConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TrackingConfiguration")
            .field("type_name", &self.type_name())
            .field("key", &state.key)
            .field("properties", &state.properties)
            .field("mode", &state.mode)
            .field("applied", &self.applied())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Type-erased view used by the registry.
pub(crate) trait ErasedConfiguration: Send + Sync {
    fn target_addr(&self) -> usize;
    fn is_alive(&self) -> bool;
    fn mode(&self) -> PersistMode;
    fn type_name(&self) -> &str;
    fn apply(&self) -> OperationReport;
    fn persist(&self) -> OperationReport;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Trackable> ErasedConfiguration for TrackingConfiguration<T> {
    fn target_addr(&self) -> usize {
        TrackingConfiguration::target_addr(self)
    }

    fn is_alive(&self) -> bool {
        TrackingConfiguration::is_alive(self)
    }

    fn mode(&self) -> PersistMode {
        TrackingConfiguration::mode(self)
    }

    fn type_name(&self) -> &str {
        TrackingConfiguration::type_name(self)
    }

    fn apply(&self) -> OperationReport {
        TrackingConfiguration::apply(self)
    }

    fn persist(&self) -> OperationReport {
        TrackingConfiguration::persist(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
