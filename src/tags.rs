//! Tag table
//!
//! Builders add their entry to named tags (`mineable/pickaxe`,
//! `minecraft:logs`). Unlike every other producer, a tag file collects many
//! entries: the `tags` kind writes one file per (registry kind, tag) once per
//! run, listing its members sorted.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use serde_json::json;

use crate::artifact::Artifact;
use crate::error::Result;
use crate::key::{validate_name, validate_namespace};

/// `(registry kind, tag id)` -> member ids
#[derive(Debug, Default)]
pub struct TagTable {
    entries: DashMap<(String, String), BTreeSet<String>>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `member` to `tag` of the `kind` registry. Adding twice is a no-op.
    pub fn add(&self, kind: &str, tag: &str, member: impl Into<String>) {
        self.entries
            .entry((kind.to_string(), tag.to_string()))
            .or_default()
            .insert(member.into());
    }

    /// Members of one tag, sorted
    pub fn members(&self, kind: &str, tag: &str) -> Vec<String> {
        self.entries
            .get(&(kind.to_string(), tag.to_string()))
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `data/<ns>/tags/<kind>/<path>.json` per tag, ordered by id
    pub fn to_artifacts(&self) -> Vec<Artifact> {
        let sorted: BTreeMap<String, Vec<String>> = self
            .entries
            .iter()
            .map(|e| {
                let (kind, tag) = e.key();
                let (namespace, path) = tag.split_once(':').unwrap_or(("minecraft", tag));
                (
                    format!("data/{namespace}/tags/{kind}/{path}.json"),
                    e.value().iter().cloned().collect(),
                )
            })
            .collect();

        sorted
            .into_iter()
            .map(|(id, values)| Artifact::json(id, json!({ "replace": false, "values": values })))
            .collect()
    }
}

/// Full `namespace:path` tag id; a bare path lives in `default_namespace`
pub fn tag_id(default_namespace: &str, tag: &str) -> Result<String> {
    let (namespace, path) = tag.split_once(':').unwrap_or((default_namespace, tag));
    validate_namespace(namespace)?;
    validate_name(path)?;
    Ok(format!("{namespace}:{path}"))
}
