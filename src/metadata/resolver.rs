//! Memoized trackability resolution per (type, tracker context).

use super::descriptor::{Trackable, TypeDescriptor};
use crate::core::{TrackError, TrackResult};
use dashmap::DashMap;
use lazy_static::lazy_static;
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Level, event};

/// Resolved trackability of one type for one tracker context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetadata {
    pub context: Option<String>,
    pub key_property_name: Option<String>,
    /// Declaration order; never contains the key property.
    pub trackable_property_names: Vec<String>,
}

impl TypeMetadata {
    /// Apply the two-level marker rule to every declared property.
    ///
    /// A property marker scoped to `context` wins; without one, the class
    /// marker for `context` decides. The key property is always left out.
    pub fn resolve_from<T>(descriptor: &TypeDescriptor<T>, context: Option<&str>) -> Self {
        let class_trackable = descriptor.class_marker_for(context).unwrap_or(false);

        let trackable_property_names = descriptor
            .properties()
            .iter()
            .filter(|property| !property.is_key())
            .filter(|property| property.marker_for(context).unwrap_or(class_trackable))
            .map(|property| property.name().to_string())
            .collect();

        Self {
            context: context.map(str::to_string),
            key_property_name: descriptor
                .key_property()
                .map(|property| property.name().to_string()),
            trackable_property_names,
        }
    }
}

type MetadataKey = (TypeId, Option<String>);

/// Cache of type descriptors and resolved metadata.
///
/// Both maps are filled through `DashMap` entries, so a slot is computed at
/// most once even when several threads configure the same unseen type.
pub struct MetadataResolver {
    descriptors: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    metadata: DashMap<MetadataKey, Arc<TypeMetadata>>,
    resolutions: AtomicUsize,
}

lazy_static! {
    static ref GLOBAL_RESOLVER: Arc<MetadataResolver> = Arc::new(MetadataResolver::new());
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self {
            descriptors: DashMap::new(),
            metadata: DashMap::new(),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Process-wide resolver shared by trackers that were not given one.
    pub fn global() -> Arc<MetadataResolver> {
        GLOBAL_RESOLVER.clone()
    }

    pub fn descriptor<T: Trackable>(&self) -> TrackResult<Arc<TypeDescriptor<T>>> {
        let erased = {
            let entry = self
                .descriptors
                .entry(TypeId::of::<T>())
                .or_try_insert_with(|| {
                    let descriptor = T::describe()?;
                    event!(
                        Level::TRACE,
                        type_name = descriptor.type_name(),
                        properties = descriptor.properties().len(),
                        "type descriptor built"
                    );
                    Ok::<_, TrackError>(Arc::new(descriptor) as Arc<dyn Any + Send + Sync>)
                })?;
            entry.value().clone()
        };

        erased.downcast::<TypeDescriptor<T>>().map_err(|_| {
            TrackError::DescriptorMismatch(std::any::type_name::<T>().to_string())
        })
    }

    pub fn resolve<T: Trackable>(&self, context: Option<&str>) -> TrackResult<Arc<TypeMetadata>> {
        let key = (TypeId::of::<T>(), context.map(str::to_string));
        if let Some(cached) = self.metadata.get(&key) {
            return Ok(cached.value().clone());
        }

        let descriptor = self.descriptor::<T>()?;
        let entry = self.metadata.entry(key).or_insert_with(|| {
            self.resolutions.fetch_add(1, Ordering::Relaxed);
            let metadata = TypeMetadata::resolve_from(&descriptor, context);
            event!(
                Level::TRACE,
                type_name = descriptor.type_name(),
                context = ?context,
                tracked = metadata.trackable_property_names.len(),
                "type metadata resolved"
            );
            Arc::new(metadata)
        });
        Ok(entry.value().clone())
    }

    /// Number of (type, context) slots computed so far.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn cached_entries(&self) -> usize {
        self.metadata.len()
    }

    pub fn clear(&self) {
        self.metadata.clear();
        self.descriptors.clear();
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Property;

    struct Panel {
        id: u32,
        title: String,
        collapsed: bool,
        secret: String,
    }

    impl Trackable for Panel {
        fn describe() -> TrackResult<TypeDescriptor<Self>> {
            TypeDescriptor::builder("Panel")
                .trackable(true)
                .trackable_in("layout", false)
                .property(Property::new("Id", |p: &Panel| &p.id, |p, v| p.id = v).key())
                .property(Property::new("Title", |p: &Panel| &p.title, |p, v| p.title = v))
                .property(
                    Property::new("Collapsed", |p: &Panel| &p.collapsed, |p, v| p.collapsed = v)
                        .trackable_in("layout", true),
                )
                .property(
                    Property::new("Secret", |p: &Panel| &p.secret, |p, v| p.secret = v)
                        .trackable(false),
                )
                .build()
        }
    }

    #[test]
    fn test_class_marker_tracks_unmarked_properties() {
        let resolver = MetadataResolver::new();
        let metadata = resolver.resolve::<Panel>(None).unwrap();
        assert_eq!(metadata.key_property_name.as_deref(), Some("Id"));
        assert_eq!(metadata.trackable_property_names, vec!["Title", "Collapsed"]);
    }

    #[test]
    fn test_context_scopes_markers() {
        let resolver = MetadataResolver::new();
        let metadata = resolver.resolve::<Panel>(Some("layout")).unwrap();
        assert_eq!(metadata.context.as_deref(), Some("layout"));
        assert_eq!(metadata.trackable_property_names, vec!["Collapsed"]);

        let unknown = resolver.resolve::<Panel>(Some("unknown")).unwrap();
        assert!(unknown.trackable_property_names.is_empty());
    }

    #[test]
    fn test_resolution_is_memoized_per_context() {
        let resolver = MetadataResolver::new();
        let first = resolver.resolve::<Panel>(None).unwrap();
        let second = resolver.resolve::<Panel>(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.resolutions(), 1);

        resolver.resolve::<Panel>(Some("layout")).unwrap();
        assert_eq!(resolver.resolutions(), 2);
        assert_eq!(resolver.cached_entries(), 2);
    }

    #[test]
    fn test_concurrent_first_resolution_computes_once() {
        let resolver = Arc::new(MetadataResolver::new());
        let handles = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve::<Panel>(None).unwrap())
            })
            .collect::<Vec<_>>();
        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(resolver.resolutions(), 1);
        assert!(results.iter().all(|m| Arc::ptr_eq(m, &results[0])));
    }
}
