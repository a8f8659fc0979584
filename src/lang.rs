//! Translation table
//!
//! Builders add labels under namespaced keys (`block.demo.polished_stone`).
//! The `lang` kind writes the whole table once per run, keys sorted.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde_json::Value;
use tracing::warn;

/// Namespaced key -> human-readable label
#[derive(Debug, Default)]
pub struct LangTable {
    entries: DashMap<String, String>,
}

impl LangTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label; a different label for an existing key replaces it
    pub fn add(&self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        if let Some(previous) = self.entries.insert(key.clone(), label.clone()) {
            if previous != label {
                warn!(key = %key, previous = %previous, label = %label, "Translation replaced");
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot as a JSON object with sorted keys
    pub fn to_json(&self) -> Value {
        let sorted: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        serde_json::to_value(sorted).unwrap_or(Value::Null)
    }
}

/// `<kind>.<namespace>.<name>`, with `/` in names turned into `.`
pub fn translation_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}.{namespace}.{}", name.replace('/', "."))
}

/// English label derived from an entry name: `polished_stone` -> `Polished Stone`
pub fn automatic_name(name: &str) -> String {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.split(['_', '-', '.'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
