//! Output sinks
//!
//! A sink persists committed artifacts. The pipeline awaits every write as
//! part of the producer's completion.
//!
//! - [`OutputSink`] - core trait
//! - [`FsSink`] - pretty JSON files under a root directory
//! - [`MemorySink`] - in-memory map, for tests and dry runs

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::artifact::Artifact;

/// Persistence collaborator for emitted artifacts
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, artifact: &Artifact) -> anyhow::Result<()>;
}

/// Writes `<root>/<artifact id>` as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output ids must stay below the root
    fn resolve(&self, id: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.is_empty() || escapes {
            bail!("output id '{id}' is not a relative path below the output root");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl OutputSink for FsSink {
    async fn write(&self, artifact: &Artifact) -> anyhow::Result<()> {
        let path = self.resolve(&artifact.id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut body = serde_json::to_string_pretty(&artifact.body)?;
        body.push('\n');
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Keeps every written artifact in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    outputs: DashMap<String, Value>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.outputs.get(id).map(|v| v.value().clone())
    }

    /// Written ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.outputs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, artifact: &Artifact) -> anyhow::Result<()> {
        self.outputs.insert(artifact.id.clone(), artifact.body.clone());
        Ok(())
    }
}
