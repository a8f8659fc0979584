//! String interning for entry kinds and names
//!
//! Every distinct kind or name string is allocated once and shared as
//! `Arc<str>`, so `EntryKey` clones and comparisons stay cheap while keys
//! travel through the registry, the provider set and spawned producers.

use std::sync::Arc;

use dashmap::DashSet;
use once_cell::sync::Lazy;

static INTERNER: Lazy<Interner> = Lazy::new(Interner::default);

/// Thread-safe string interner
#[derive(Default)]
pub struct Interner {
    strings: DashSet<Arc<str>>,
}

impl Interner {
    /// Intern a string, returning the shared `Arc<str>` for its content
    pub fn intern(&self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing.key());
        }

        // Two callers may race past the lookup; `insert` keeps the first
        // allocation and the loser re-reads it.
        let candidate: Arc<str> = Arc::from(s);
        if self.strings.insert(Arc::clone(&candidate)) {
            return candidate;
        }
        self.strings
            .get(s)
            .map_or(candidate, |existing| Arc::clone(existing.key()))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Intern using the process-wide interner
#[inline]
pub fn intern(s: &str) -> Arc<str> {
    INTERNER.intern(s)
}
