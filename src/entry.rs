//! Deferred entries
//!
//! A `DeferredEntry<V>` owns a factory and a memoized value. The factory runs
//! at most once, on the first `resolve()`; concurrent first resolvers block on
//! the single-initialization cell and observe the same `Arc<V>`. Hooks attached
//! before materialization fire once, in attach order, inside that same
//! initialization, so no resolver can see the value before its hooks ran.
//!
//! Hooks and factories must not resolve the entry they belong to.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{RegistrarError, Result};
use crate::key::EntryKey;
use crate::registry::MaterializeListeners;

pub(crate) type Factory<V> = Box<dyn FnOnce() -> anyhow::Result<V> + Send>;
pub(crate) type Hook<V> = Box<dyn FnOnce(&V) + Send>;

struct HookState<V> {
    /// Set once construction succeeded; later hooks fire immediately
    fired: Option<Arc<V>>,
    pending: Vec<Hook<V>>,
}

struct Inner<V> {
    key: EntryKey,
    factory: Mutex<Option<Factory<V>>>,
    value: OnceCell<Arc<V>>,
    hooks: Mutex<HookState<V>>,
    listeners: Arc<MaterializeListeners>,
}

/// Lazily constructed, process-scoped entry value
pub struct DeferredEntry<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for DeferredEntry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> DeferredEntry<V> {
    pub(crate) fn new(
        key: EntryKey,
        factory: Factory<V>,
        listeners: Arc<MaterializeListeners>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                factory: Mutex::new(Some(factory)),
                value: OnceCell::new(),
                hooks: Mutex::new(HookState {
                    fired: None,
                    pending: Vec::new(),
                }),
                listeners,
            }),
        }
    }

    #[inline]
    pub fn key(&self) -> &EntryKey {
        &self.inner.key
    }

    /// The memoized value, without triggering construction
    pub fn get(&self) -> Option<Arc<V>> {
        self.inner.value.get().cloned()
    }

    pub fn is_materialized(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Return the value, constructing it on first call
    pub fn resolve(&self) -> Result<Arc<V>> {
        if let Some(value) = self.inner.value.get() {
            return Ok(Arc::clone(value));
        }
        self.inner
            .value
            .get_or_try_init(|| self.construct())
            .cloned()
    }

    /// Attach a hook fired once with the constructed value.
    ///
    /// If the entry already materialized the hook runs right away on the
    /// calling thread.
    pub fn on_materialized(&self, hook: impl FnOnce(&V) + Send + 'static) {
        let mut state = self.inner.hooks.lock();
        let fired = state.fired.clone();
        match fired {
            Some(value) => {
                drop(state);
                hook(&value);
            }
            None => state.pending.push(Box::new(hook)),
        }
    }

    fn construct(&self) -> Result<Arc<V>> {
        let key = &self.inner.key;
        let factory = self
            .inner
            .factory
            .lock()
            .take()
            .ok_or_else(|| RegistrarError::ConstructionPoisoned { key: key.clone() })?;

        let value = factory().map_err(|e| RegistrarError::ConstructionFailed {
            key: key.clone(),
            reason: format!("{e:#}"),
        })?;
        let value = Arc::new(value);

        let pending = {
            let mut state = self.inner.hooks.lock();
            state.fired = Some(Arc::clone(&value));
            std::mem::take(&mut state.pending)
        };
        debug!(entry = %key, hooks = pending.len(), "Entry materialized");
        for hook in pending {
            hook(&value);
        }
        self.inner.listeners.notify(key);

        Ok(value)
    }
}

impl<V> fmt::Debug for DeferredEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEntry")
            .field("key", &self.inner.key)
            .field("materialized", &self.inner.value.get().is_some())
            .finish()
    }
}

/// Type-erased view of a `DeferredEntry` as stored in the registry
pub trait AnyEntry: Send + Sync {
    fn key(&self) -> &EntryKey;
    fn is_materialized(&self) -> bool;
    /// Resolve, discarding the value
    fn materialize(&self) -> Result<()>;
    fn value_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<V: Send + Sync + 'static> AnyEntry for DeferredEntry<V> {
    fn key(&self) -> &EntryKey {
        DeferredEntry::key(self)
    }

    fn is_materialized(&self) -> bool {
        DeferredEntry::is_materialized(self)
    }

    fn materialize(&self) -> Result<()> {
        self.resolve().map(|_| ())
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<V>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
