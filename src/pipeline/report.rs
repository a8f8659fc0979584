//! Aggregated result of one pipeline run

use std::time::Duration;

use crate::error::{RegistrarError, Result};
use crate::key::EntryKey;
use crate::kind::ArtifactKind;

/// One failed producer: (entry, kind, error)
#[derive(Debug)]
pub struct RunFailure {
    pub key: EntryKey,
    pub kind: ArtifactKind,
    pub error: RegistrarError,
}

/// Terminal signal of a run: everything emitted plus every failure
#[derive(Debug, Default)]
pub struct RunReport {
    /// Kinds in the order they ran
    pub order: Vec<ArtifactKind>,
    /// Output ids written to the sink
    pub emitted: Vec<String>,
    /// Producers that ran and emitted nothing
    pub skipped: usize,
    pub failures: Vec<RunFailure>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `RunFailed` when any producer failed
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(RegistrarError::RunFailed {
                count: self.failures.len(),
            })
        }
    }

    pub fn failures_for(&self, key: &EntryKey) -> impl Iterator<Item = &RunFailure> {
        let key = key.clone();
        self.failures.iter().filter(move |f| f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_success() {
        let report = RunReport::default();
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn failures_turn_into_run_failed() {
        let key = EntryKey::new("block", "stone");
        let report = RunReport {
            failures: vec![RunFailure {
                key: key.clone(),
                kind: ArtifactKind::LOOT,
                error: RegistrarError::DuplicateOutput { id: "x".into() },
            }],
            ..Default::default()
        };

        assert!(matches!(
            report.ensure_success(),
            Err(RegistrarError::RunFailed { count: 1 })
        ));
        assert_eq!(report.failures_for(&key).count(), 1);
    }
}
