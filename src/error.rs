//! Error types with fix suggestions
//!
//! Error code ranges:
//! - REG-001-009: Registry / entry identity errors
//! - REG-010-019: Builder and kind configuration errors
//! - REG-020-029: Pipeline setup errors
//! - REG-030-039: Pipeline run errors
//! - REG-040-049: Config / IO errors

use thiserror::Error;

use crate::key::EntryKey;

pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum RegistrarError {
    // ─────────────────────────────────────────────────────────────
    // Registry errors (REG-001 to REG-009)
    // ─────────────────────────────────────────────────────────────
    #[error("[REG-001] Entry '{key}' is already registered")]
    DuplicateKey { key: EntryKey },

    #[error("[REG-002] Entry '{key}' is not registered")]
    UnknownKey { key: EntryKey },

    #[error("[REG-003] Entry '{key}' holds a different value type than '{expected}'")]
    EntryTypeMismatch { key: EntryKey, expected: &'static str },

    #[error("[REG-004] Failed to construct entry '{key}': {reason}")]
    ConstructionFailed { key: EntryKey, reason: String },

    #[error("[REG-005] Entry '{key}' failed to construct earlier and cannot be retried")]
    ConstructionPoisoned { key: EntryKey },

    // ─────────────────────────────────────────────────────────────
    // Builder / kind errors (REG-010 to REG-019)
    // ─────────────────────────────────────────────────────────────
    #[error("[REG-010] Builder for '{key}' was already registered")]
    AlreadyRegistered { key: EntryKey },

    #[error("[REG-011] Invalid {what} '{value}'")]
    InvalidName { what: &'static str, value: String },

    #[error("[REG-012] Artifact kind '{kind}' already registered as {existing}, got {requested}")]
    KindConflict {
        kind: String,
        existing: String,
        requested: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Pipeline setup errors (REG-020 to REG-029)
    // ─────────────────────────────────────────────────────────────
    #[error("[REG-020] Cyclic artifact dependency: {cycle}")]
    CyclicDependency { cycle: String },

    #[error("[REG-021] '{kind}' producer of '{key}' depends on '{depends_on}', which no entry provides")]
    DanglingDependency {
        key: EntryKey,
        kind: String,
        depends_on: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Pipeline run errors (REG-030 to REG-039)
    // ─────────────────────────────────────────────────────────────
    #[error("[REG-030] Output '{id}' was already emitted in this run")]
    DuplicateOutput { id: String },

    #[error("[REG-031] Producer '{kind}' failed for '{key}': {reason}")]
    ProducerFailed {
        key: EntryKey,
        kind: String,
        reason: String,
    },

    #[error("[REG-032] Run cancelled after {completed} of {total} kinds")]
    Cancelled { completed: usize, total: usize },

    #[error("[REG-033] Run finished with {count} failure(s)")]
    RunFailed { count: usize },

    // ─────────────────────────────────────────────────────────────
    // Config / IO errors (REG-040 to REG-049)
    // ─────────────────────────────────────────────────────────────
    #[error("[REG-040] Invalid config: {reason}")]
    Config { reason: String },

    #[error("[REG-041] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("[REG-042] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("[REG-043] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistrarError {
    /// Setup and identity errors are fatal to the call that raised them;
    /// run errors are collected per producer.
    pub fn is_run_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateOutput { .. } | Self::ProducerFailed { .. }
        )
    }
}

impl FixSuggestion for RegistrarError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::DuplicateKey { .. } => Some("Pick a unique name for each entry of a kind"),
            Self::UnknownKey { .. } => Some("Register the entry before resolving it"),
            Self::EntryTypeMismatch { .. } => {
                Some("Resolve the entry with the value type it was registered with")
            }
            Self::ConstructionFailed { .. } => Some("Check the entry factory and its parent entry"),
            Self::ConstructionPoisoned { .. } => {
                Some("Fix the first construction failure reported for this entry")
            }
            Self::AlreadyRegistered { .. } => Some("Create a new builder for each entry"),
            Self::InvalidName { .. } => Some("Use lowercase letters, digits, '_', '-', '.' or '/'"),
            Self::KindConflict { .. } => {
                Some("Reuse the existing kind or register the new one under another id")
            }
            Self::CyclicDependency { .. } => {
                Some("Remove one depends_on edge so artifact kinds form a DAG")
            }
            Self::DanglingDependency { .. } => {
                Some("Register a producer for the dependency kind, or drop depends_on")
            }
            Self::DuplicateOutput { .. } => Some("Give every emitted artifact a unique output id"),
            Self::ProducerFailed { .. } => Some("Inspect the producer callback for this entry"),
            Self::Cancelled { .. } => None,
            Self::RunFailed { .. } => Some("See the failures listed above"),
            Self::Config { .. } => Some("Check the generation config fields"),
            Self::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            Self::Json(_) => None,
            Self::Io(_) => Some("Check file path and permissions"),
        }
    }
}
