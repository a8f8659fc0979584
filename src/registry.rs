//! Entry registry
//!
//! Process-scoped mapping from `EntryKey` to `DeferredEntry`. Registration is
//! duplicate-checked through the DashMap entry API, so a failed `register`
//! leaves the registry untouched. Lookups never construct; `resolve` does.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::entry::{AnyEntry, DeferredEntry, Factory};
use crate::error::{RegistrarError, Result};
use crate::key::EntryKey;

type Listener = Arc<dyn Fn(&EntryKey) + Send + Sync>;

/// Registry-wide "entry materialized" callbacks
#[derive(Default)]
pub struct MaterializeListeners {
    listeners: RwLock<Vec<Listener>>,
}

impl MaterializeListeners {
    pub(crate) fn notify(&self, key: &EntryKey) {
        // Snapshot so a listener may add listeners
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for listener in listeners {
            listener(key);
        }
    }

    fn push(&self, listener: Listener) {
        self.listeners.write().push(listener);
    }
}

/// Mapping from `EntryKey` to deferred entries
#[derive(Default)]
pub struct Registry {
    entries: DashMap<EntryKey, Arc<dyn AnyEntry>>,
    /// Registration order, for deterministic iteration
    order: RwLock<Vec<EntryKey>>,
    listeners: Arc<MaterializeListeners>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new deferred entry. Nothing is constructed.
    #[instrument(skip(self, factory), fields(entry = %key))]
    pub fn register<V, F>(&self, key: EntryKey, factory: F) -> Result<DeferredEntry<V>>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<V> + Send + 'static,
    {
        self.register_boxed(key, Box::new(factory))
    }

    pub(crate) fn register_boxed<V>(
        &self,
        key: EntryKey,
        factory: Factory<V>,
    ) -> Result<DeferredEntry<V>>
    where
        V: Send + Sync + 'static,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => Err(RegistrarError::DuplicateKey { key }),
            Entry::Vacant(slot) => {
                let entry = DeferredEntry::new(key.clone(), factory, Arc::clone(&self.listeners));
                slot.insert(Arc::new(entry.clone()));
                self.order.write().push(key);
                debug!("Entry registered");
                Ok(entry)
            }
        }
    }

    /// Typed lookup; never triggers construction
    pub fn get<V: Send + Sync + 'static>(&self, key: &EntryKey) -> Option<DeferredEntry<V>> {
        self.entries
            .get(key)
            .and_then(|e| e.as_any().downcast_ref::<DeferredEntry<V>>().cloned())
    }

    /// Untyped lookup; never triggers construction
    pub fn get_any(&self, key: &EntryKey) -> Option<Arc<dyn AnyEntry>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Resolve an entry, constructing it on first access
    pub fn resolve<V: Send + Sync + 'static>(&self, key: &EntryKey) -> Result<Arc<V>> {
        let erased = self
            .get_any(key)
            .ok_or_else(|| RegistrarError::UnknownKey { key: key.clone() })?;
        let entry = erased
            .as_any()
            .downcast_ref::<DeferredEntry<V>>()
            .ok_or_else(|| RegistrarError::EntryTypeMismatch {
                key: key.clone(),
                expected: std::any::type_name::<V>(),
            })?;
        entry.resolve()
    }

    /// Register a callback fired whenever any entry materializes
    pub fn on_materialized(&self, listener: impl Fn(&EntryKey) + Send + Sync + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    /// Keys in registration order
    pub fn keys(&self) -> Vec<EntryKey> {
        self.order.read().clone()
    }

    /// Materialize every entry in registration order, collecting failures
    #[instrument(skip(self))]
    pub fn materialize_all(&self) -> Vec<RegistrarError> {
        let mut failures = Vec::new();
        for key in self.keys() {
            if let Some(entry) = self.get_any(&key) {
                if let Err(e) = entry.materialize() {
                    failures.push(e);
                }
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn duplicate_key_leaves_registry_unchanged() {
        let registry = Registry::new();
        let key = EntryKey::new("block", "stone");
        registry.register(key.clone(), || Ok(1u32)).unwrap();

        let err = registry.register(key.clone(), || Ok(2u32)).unwrap_err();
        assert!(matches!(err, RegistrarError::DuplicateKey { .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(*registry.resolve::<u32>(&key).unwrap(), 1);
    }

    #[test]
    fn get_never_constructs() {
        let registry = Registry::new();
        let key = EntryKey::new("item", "ruby");
        registry.register(key.clone(), || Ok("ruby")).unwrap();

        let entry = registry.get::<&str>(&key).unwrap();
        assert!(!entry.is_materialized());
        assert!(!registry.get_any(&key).unwrap().is_materialized());
    }

    #[test]
    fn resolve_unknown_and_mismatched() {
        let registry = Registry::new();
        let key = EntryKey::new("item", "ruby");
        assert!(matches!(
            registry.resolve::<u8>(&key),
            Err(RegistrarError::UnknownKey { .. })
        ));

        registry.register(key.clone(), || Ok(1u8)).unwrap();
        assert!(matches!(
            registry.resolve::<String>(&key),
            Err(RegistrarError::EntryTypeMismatch { .. })
        ));
    }

    #[test]
    fn listeners_see_each_materialization_once() {
        let registry = Registry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        registry.on_materialized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for name in ["a", "b", "c"] {
            registry.register(EntryKey::new("block", name), || Ok(())).unwrap();
        }
        assert!(registry.materialize_all().is_empty());
        assert!(registry.materialize_all().is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn keys_keep_registration_order() {
        let registry = Registry::new();
        for name in ["z", "a", "m"] {
            registry.register(EntryKey::new("item", name), || Ok(())).unwrap();
        }
        let names: Vec<String> = registry.keys().iter().map(|k| k.name().to_string()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
