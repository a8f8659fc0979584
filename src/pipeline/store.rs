//! Per-run output storage with DashMap
//!
//! Holds the committed artifacts of every producer that emitted something,
//! keyed by (entry, kind), so dependent kinds can read their dependency's
//! output for the same (or a declared upstream) entry.

use std::sync::Arc;

use dashmap::DashMap;

use crate::artifact::Artifact;
use crate::key::EntryKey;
use crate::kind::ArtifactKind;

/// Thread-safe storage for committed producer outputs
#[derive(Clone, Default)]
pub struct OutputStore {
    outputs: Arc<DashMap<(EntryKey, ArtifactKind), Arc<[Artifact]>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: EntryKey, kind: ArtifactKind, artifacts: Arc<[Artifact]>) {
        self.outputs.insert((key, kind), artifacts);
    }

    pub fn get(&self, key: &EntryKey, kind: ArtifactKind) -> Option<Arc<[Artifact]>> {
        self.outputs
            .get(&(key.clone(), kind))
            .map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, key: &EntryKey, kind: ArtifactKind) -> bool {
        self.outputs.contains_key(&(key.clone(), kind))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
