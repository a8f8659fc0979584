//! Pipeline runner - dependency-ordered producer execution with tokio
//!
//! - Kinds run level by level; a level starts only after every producer of
//!   the previous level finished (join barrier)
//! - Producers of one level fan out on a JoinSet
//! - Failures are collected per producer, never short-circuiting siblings

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::artifact::{Artifact, ArtifactSpec};
use crate::error::{RegistrarError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::key::EntryKey;
use crate::kind::{ArtifactKind, KindFilter};
use crate::sink::OutputSink;

use super::graph::KindGraph;
use super::guard::DuplicateGuard;
use super::report::{RunFailure, RunReport};
use super::store::OutputStore;

/// What one producer task came back with
struct ProducerOutcome {
    key: EntryKey,
    kind: ArtifactKind,
    result: Result<Option<Vec<String>>>,
}

/// Shared per-run state handed to every producer task
#[derive(Clone)]
struct RunState {
    guard: Arc<DuplicateGuard>,
    store: OutputStore,
    sink: Arc<dyn OutputSink>,
    event_log: EventLog,
}

/// A validated, ordered set of producers ready to run
pub struct Pipeline {
    specs: FxHashMap<ArtifactKind, Vec<(EntryKey, ArtifactSpec)>>,
    levels: Vec<Vec<ArtifactKind>>,
    active: FxHashSet<ArtifactKind>,
    event_log: EventLog,
}

impl Pipeline {
    /// Group specs by kind, check declared dependencies and compute the
    /// level order over the kinds `filter` keeps active.
    ///
    /// Fails with `DanglingDependency` or `CyclicDependency` before any
    /// producer runs.
    pub fn new(specs: Vec<(EntryKey, ArtifactSpec)>, filter: &dyn KindFilter) -> Result<Self> {
        let mut grouped: FxHashMap<ArtifactKind, Vec<(EntryKey, ArtifactSpec)>> =
            FxHashMap::default();
        for (key, spec) in specs {
            grouped.entry(spec.kind()).or_default().push((key, spec));
        }

        for (kind, entries) in &grouped {
            for (key, spec) in entries {
                if let Some(dependency) = spec.dependency() {
                    if !grouped.contains_key(&dependency) {
                        return Err(RegistrarError::DanglingDependency {
                            key: key.clone(),
                            kind: kind.id().to_string(),
                            depends_on: dependency.id().to_string(),
                        });
                    }
                }
            }
        }

        let active: FxHashSet<ArtifactKind> = grouped
            .keys()
            .filter(|k| filter.is_active(k))
            .copied()
            .collect();

        // Only edges between active kinds constrain the order; an inactive
        // dependency just yields no dependency output.
        let edges = grouped.iter().flat_map(|(kind, entries)| {
            entries
                .iter()
                .filter_map(move |(_, spec)| spec.dependency().map(|dep| (dep, *kind)))
        });
        let graph = KindGraph::new(active.iter().copied(), edges);
        let levels = graph.levels()?;

        Ok(Self {
            specs: grouped,
            levels,
            active,
            event_log: EventLog::new(),
        })
    }

    /// Active kinds in execution order
    pub fn order(&self) -> Vec<ArtifactKind> {
        self.levels.iter().flatten().copied().collect()
    }

    pub fn levels(&self) -> &[Vec<ArtifactKind>] {
        &self.levels
    }

    pub fn is_active(&self, kind: &ArtifactKind) -> bool {
        self.active.contains(kind)
    }

    /// Number of producers a run will invoke
    pub fn producer_count(&self) -> usize {
        self.order()
            .iter()
            .map(|k| self.specs.get(k).map_or(0, Vec::len))
            .sum()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Run every active producer once, writing committed outputs to `sink`
    pub async fn run(&self, sink: Arc<dyn OutputSink>) -> Result<RunReport> {
        self.run_until_cancelled(sink, CancellationToken::new()).await
    }

    /// Like `run`, but stops at `cancel`: in-flight producers are aborted,
    /// no further level is scheduled and the run returns `Cancelled`.
    #[instrument(skip_all, fields(kinds = self.active.len()))]
    pub async fn run_until_cancelled(
        &self,
        sink: Arc<dyn OutputSink>,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_start = Instant::now();
        let order = self.order();
        let total = order.len();
        info!(producers = self.producer_count(), "Starting generation run");

        self.event_log.emit(EventKind::RunStarted {
            order: order.iter().map(|k| k.id().to_string()).collect(),
            producers: self.producer_count(),
        });

        // Fresh per run: duplicate tracking and committed outputs
        let state = RunState {
            guard: Arc::new(DuplicateGuard::new()),
            store: OutputStore::new(),
            sink,
            event_log: self.event_log.clone(),
        };

        let mut report = RunReport {
            order: order.clone(),
            ..Default::default()
        };
        let mut completed_kinds = 0;

        for level in &self.levels {
            if cancel.is_cancelled() {
                return Err(self.cancelled(completed_kinds, total));
            }

            let mut join_set = JoinSet::new();
            let mut tasks: FxHashMap<task::Id, (EntryKey, ArtifactKind)> = FxHashMap::default();

            for kind in level {
                let entries = self.specs.get(kind).map(Vec::as_slice).unwrap_or_default();
                self.event_log.emit(EventKind::KindScheduled {
                    kind: kind.id().to_string(),
                    entries: entries.len(),
                });
                debug!(kind = %kind, entries = entries.len(), "Kind scheduled");

                for (key, spec) in entries {
                    let dependency = self.dependency_output(key, spec, &state.store);
                    let handle = join_set.spawn(run_producer(
                        key.clone(),
                        spec.clone(),
                        dependency,
                        state.clone(),
                    ));
                    tasks.insert(handle.id(), (key.clone(), *kind));
                }
            }

            // Wait for the whole level before the next one starts
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        join_set.abort_all();
                        return Err(self.cancelled(completed_kinds, total));
                    }
                    next = join_set.join_next_with_id() => match next {
                        None => break,
                        Some(Ok((id, outcome))) => {
                            tasks.remove(&id);
                            record(&mut report, outcome);
                        }
                        Some(Err(e)) => record_lost(&mut report, &mut tasks, e, &self.event_log),
                    }
                }
            }

            completed_kinds += level.len();
        }

        report.emitted.sort();
        report.duration = run_start.elapsed();

        self.event_log.emit(EventKind::RunCompleted {
            emitted: report.emitted.len(),
            failures: report.failures.len(),
            total_duration_ms: report.duration.as_millis() as u64,
        });
        info!(
            emitted = report.emitted.len(),
            skipped = report.skipped,
            failures = report.failures.len(),
            "Generation run finished"
        );

        Ok(report)
    }

    /// Output of the declared dependency for the upstream entry, if that
    /// kind is active in this run and emitted something
    fn dependency_output(
        &self,
        key: &EntryKey,
        spec: &ArtifactSpec,
        store: &OutputStore,
    ) -> Option<Arc<[Artifact]>> {
        let dependency = spec.dependency()?;
        if !self.active.contains(&dependency) {
            return None;
        }
        let upstream = spec.upstream_key().unwrap_or(key);
        store.get(upstream, dependency)
    }

    fn cancelled(&self, completed: usize, total: usize) -> RegistrarError {
        self.event_log.emit(EventKind::RunCancelled {
            completed_kinds: completed,
        });
        warn!(completed, total, "Generation run cancelled");
        RegistrarError::Cancelled { completed, total }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("levels", &self.levels)
            .finish()
    }
}

fn record(report: &mut RunReport, outcome: ProducerOutcome) {
    match outcome.result {
        Ok(Some(ids)) => report.emitted.extend(ids),
        Ok(None) => report.skipped += 1,
        Err(error) => report.failures.push(RunFailure {
            key: outcome.key,
            kind: outcome.kind,
            error,
        }),
    }
}

/// A producer task that ended without an outcome still counts as a failure
fn record_lost(
    report: &mut RunReport,
    tasks: &mut FxHashMap<task::Id, (EntryKey, ArtifactKind)>,
    error: JoinError,
    event_log: &EventLog,
) {
    let Some((key, kind)) = tasks.remove(&error.id()) else {
        warn!(error = %error, "Unknown producer task did not finish");
        return;
    };
    warn!(entry = %key, kind = %kind, error = %error, "Producer task did not finish");
    event_log.emit(EventKind::ProducerFailed {
        entry: key.to_string(),
        kind: kind.id().to_string(),
        error: error.to_string(),
    });
    report.failures.push(RunFailure {
        error: RegistrarError::ProducerFailed {
            key: key.clone(),
            kind: kind.id().to_string(),
            reason: error.to_string(),
        },
        key,
        kind,
    });
}

/// One producer invocation; panics are reported as failures of that producer
async fn run_producer(
    key: EntryKey,
    spec: ArtifactSpec,
    dependency: Option<Arc<[Artifact]>>,
    state: RunState,
) -> ProducerOutcome {
    let kind = spec.kind();
    let result = AssertUnwindSafe(produce(&key, &spec, dependency, &state))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "producer panicked".to_string());
            Err(RegistrarError::ProducerFailed {
                key: key.clone(),
                kind: kind.id().to_string(),
                reason,
            })
        });

    if let Err(e) = &result {
        if !matches!(e, RegistrarError::DuplicateOutput { .. }) {
            state.event_log.emit(EventKind::ProducerFailed {
                entry: key.to_string(),
                kind: kind.id().to_string(),
                error: e.to_string(),
            });
        }
        warn!(entry = %key, kind = %kind, error = %e, "Producer failed");
    }

    ProducerOutcome { key, kind, result }
}

fn release(guard: &DuplicateGuard, ids: &[&str]) {
    for id in ids {
        guard.release(id);
    }
}

/// `Ok(None)` when the producer chose to emit nothing
async fn produce(
    key: &EntryKey,
    spec: &ArtifactSpec,
    dependency: Option<Arc<[Artifact]>>,
    state: &RunState,
) -> Result<Option<Vec<String>>> {
    let kind = spec.kind();
    let start = Instant::now();
    let failed = |reason: String| RegistrarError::ProducerFailed {
        key: key.clone(),
        kind: kind.id().to_string(),
        reason,
    };

    state.event_log.emit(EventKind::ProducerStarted {
        entry: key.to_string(),
        kind: kind.id().to_string(),
        has_dependency: dependency.is_some(),
    });

    let artifacts = spec
        .invoke(dependency)
        .await
        .map_err(|e| failed(format!("{e:#}")))?;

    if artifacts.is_empty() {
        state.event_log.emit(EventKind::ProducerSkipped {
            entry: key.to_string(),
            kind: kind.id().to_string(),
        });
        return Ok(None);
    }

    // Claim every id before anything is written; on failure give back what
    // this producer claimed
    let mut claimed: Vec<&str> = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        if !state.guard.claim(&artifact.id) {
            release(&state.guard, &claimed);
            state.event_log.emit(EventKind::DuplicateOutput {
                entry: key.to_string(),
                kind: kind.id().to_string(),
                output: artifact.id.clone(),
            });
            return Err(RegistrarError::DuplicateOutput {
                id: artifact.id.clone(),
            });
        }
        claimed.push(&artifact.id);
    }

    for artifact in &artifacts {
        if let Err(e) = state.sink.write(artifact).await {
            release(&state.guard, &claimed);
            return Err(failed(format!("writing '{}': {e:#}", artifact.id)));
        }
    }

    let ids: Vec<String> = artifacts.iter().map(|a| a.id.clone()).collect();
    state.store.insert(key.clone(), kind, artifacts.into());
    state.event_log.emit(EventKind::ProducerCompleted {
        entry: key.to_string(),
        kind: kind.id().to_string(),
        outputs: ids.clone(),
        duration_ms: start.elapsed().as_millis() as u64,
    });
    debug!(entry = %key, kind = %kind, outputs = ids.len(), "Producer completed");

    Ok(Some(ids))
}
