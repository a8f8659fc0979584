//! Per-run duplicate output detection

use dashmap::DashSet;

/// Set of output ids emitted in the current run.
///
/// `claim` is an idempotent check; callers decide how to report a refused
/// claim. A producer that fails after claiming releases its ids, so only
/// committed outputs stay claimed.
#[derive(Debug, Default)]
pub struct DuplicateGuard {
    seen: DashSet<String>,
}

impl DuplicateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` on the first claim of `id` in this run, `false` afterwards
    pub fn claim(&self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    /// Give up a claim made by an output that was never committed
    pub fn release(&self, id: &str) {
        self.seen.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
