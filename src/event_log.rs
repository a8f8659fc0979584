//! Event log for generation runs
//!
//! Full audit trail of one pipeline run:
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run level and producer level variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        order: Vec<String>,
        producers: usize,
    },
    RunCompleted {
        emitted: usize,
        failures: usize,
        total_duration_ms: u64,
    },
    RunCancelled {
        completed_kinds: usize,
    },

    // ═══════════════════════════════════════════
    // KIND / PRODUCER LEVEL
    // ═══════════════════════════════════════════
    KindScheduled {
        kind: String,
        entries: usize,
    },
    ProducerStarted {
        entry: String,
        kind: String,
        has_dependency: bool,
    },
    ProducerCompleted {
        entry: String,
        kind: String,
        outputs: Vec<String>,
        duration_ms: u64,
    },
    /// Producer ran and chose to emit nothing
    ProducerSkipped {
        entry: String,
        kind: String,
    },
    ProducerFailed {
        entry: String,
        kind: String,
        error: String,
    },
    DuplicateOutput {
        entry: String,
        kind: String,
        output: String,
    },
}

impl EventKind {
    /// Entry name if the event is producer-related
    pub fn entry(&self) -> Option<&str> {
        match self {
            Self::ProducerStarted { entry, .. }
            | Self::ProducerCompleted { entry, .. }
            | Self::ProducerSkipped { entry, .. }
            | Self::ProducerFailed { entry, .. }
            | Self::DuplicateOutput { entry, .. } => Some(entry),
            Self::RunStarted { .. }
            | Self::RunCompleted { .. }
            | Self::RunCancelled { .. }
            | Self::KindScheduled { .. } => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunCancelled { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        self.events.write().push(event);
        id
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Events for one entry (matched on its `kind/name` display form)
    pub fn filter_entry(&self, entry: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.entry() == Some(entry))
            .collect()
    }

    pub fn run_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.is_run_event())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(entry: &str) -> EventKind {
        EventKind::ProducerStarted {
            entry: entry.into(),
            kind: "loot".into(),
            has_dependency: false,
        }
    }

    #[test]
    fn emit_returns_monotonic_ids() {
        let log = EventLog::new();
        assert_eq!(log.emit(started("block/a")), 0);
        assert_eq!(log.emit(started("block/b")), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn filter_entry_returns_only_matching() {
        let log = EventLog::new();
        log.emit(EventKind::RunStarted {
            order: vec!["loot".into()],
            producers: 2,
        });
        log.emit(started("block/a"));
        log.emit(started("block/b"));
        log.emit(EventKind::ProducerSkipped {
            entry: "block/a".into(),
            kind: "loot".into(),
        });

        assert_eq!(log.filter_entry("block/a").len(), 2);
        assert_eq!(log.run_events().len(), 1);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(EventKind::DuplicateOutput {
            entry: "item/ruby".into(),
            kind: "recipe".into(),
            output: "data/demo/recipe/ruby.json".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "duplicate_output");
        assert_eq!(json["output"], "data/demo/recipe/ruby.json");
    }

    #[test]
    fn clones_share_storage() {
        let log = EventLog::new();
        let cloned = log.clone();
        log.emit(started("block/a"));
        assert_eq!(cloned.len(), 1);
        assert!(cloned.to_json().is_array());
    }
}
