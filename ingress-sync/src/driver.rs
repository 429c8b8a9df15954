//! Sync cycle driver.
//!
//! ## One cycle
//!
//! 1. Fetch a change batch from the provider with the current cursor.
//!    Fetch or envelope failure → `Err`, cursor stays where it was.
//! 2. Drop records outside the stream's [`CategoryFilter`].
//! 3. Skip records whose freshness marker is not newer than the last write
//!    (for resolved records: the last resolution).
//! 4. Resolved records: no-op if never written, else status-only merge.
//!    Live records: map, then merge-or-create.
//! 5. Record the marker right after each successful write, so a duplicate
//!    later in the same batch is skipped.
//! 6. Return the provider's next cursor. Per-record failures are logged and
//!    counted; they never hold the cursor back.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use ingress_core::{ChangeCursor, ProviderRecord, RecordIdentity};

use crate::error::{ProviderError, SyncError};
use crate::filter::CategoryFilter;
use crate::mapper::RecordMapper;
use crate::reconciler::{EntityStore, ReconcileOutcome, Reconciler};
use crate::tracker::ChangeTracker;

/// Records changed since a cursor, plus the cursor to use next time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    pub records: Vec<ProviderRecord>,
    /// `None` or empty means "keep the current cursor".
    pub next_cursor: Option<ChangeCursor>,
}

/// Upstream data provider consumed by the driver.
pub trait ProviderClient: Send {
    /// Fetch changes after `cursor`. An empty batch is not an error.
    fn fetch_changes(&self, cursor: &ChangeCursor) -> Result<ChangeBatch, ProviderError>;
}

/// Per-cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub next_cursor: ChangeCursor,
    pub fetched: usize,
    pub filtered: usize,
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub resolved: usize,
    /// Resolutions with nothing to resolve.
    pub noop: usize,
    pub mapping_failed: usize,
    pub reconcile_failed: usize,
}

impl CycleReport {
    pub fn written(&self) -> usize {
        self.created + self.updated + self.resolved
    }

    pub fn failed(&self) -> usize {
        self.mapping_failed + self.reconcile_failed
    }
}

/// Generic driver for one data stream, parameterised by its provider,
/// store and mapper.
pub struct SyncDriver<P, S, M> {
    name: String,
    provider: P,
    reconciler: Reconciler<S>,
    mapper: M,
    filter: CategoryFilter,
    tracker: ChangeTracker,
    resolved: HashSet<RecordIdentity>,
}

impl<P, S, M> SyncDriver<P, S, M>
where
    P: ProviderClient,
    S: EntityStore,
    M: RecordMapper,
{
    pub fn new(
        name: impl Into<String>,
        provider: P,
        store: S,
        mapper: M,
        filter: CategoryFilter,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            reconciler: Reconciler::new(store),
            mapper,
            filter,
            tracker: ChangeTracker::new(),
            resolved: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Run one polling cycle starting at `cursor`.
    pub fn run_cycle(&mut self, cursor: &ChangeCursor) -> Result<CycleReport, SyncError> {
        let batch = self.provider.fetch_changes(cursor)?;

        let mut report = CycleReport {
            fetched: batch.records.len(),
            ..Default::default()
        };

        for record in &batch.records {
            self.process(record, &mut report);
        }

        report.next_cursor = match batch.next_cursor {
            Some(next) if !next.is_empty() => next,
            _ => cursor.clone(),
        };

        tracing::info!(
            stream = %self.name,
            cursor = %cursor,
            next_cursor = %report.next_cursor,
            fetched = report.fetched,
            written = report.written(),
            unchanged = report.unchanged,
            filtered = report.filtered,
            failed = report.failed(),
            "sync cycle completed",
        );
        Ok(report)
    }

    fn process(&mut self, record: &ProviderRecord, report: &mut CycleReport) {
        if !self.filter.accepts(record) {
            tracing::debug!(
                stream = %self.name,
                record = %record.id,
                kind = %record.kind,
                "record outside stream interest, ignoring",
            );
            report.filtered += 1;
            return;
        }

        let marker = record.marker();
        let unchanged = if record.deleted {
            // Resolution keeps the live record's marker, so only an earlier
            // resolution of the same identity makes it a repeat.
            self.resolved.contains(&record.id)
                && !self.tracker.should_publish(&record.id, marker.as_ref())
        } else {
            !self.tracker.should_publish(&record.id, marker.as_ref())
        };
        if unchanged {
            tracing::debug!(stream = %self.name, record = %record.id, "unchanged since last write");
            report.unchanged += 1;
            return;
        }

        let step = if record.deleted {
            self.resolve(record)
        } else {
            self.publish(record)
        };

        match step {
            Step::Written(outcome) => {
                match outcome {
                    ReconcileOutcome::Created => report.created += 1,
                    ReconcileOutcome::Updated => report.updated += 1,
                    ReconcileOutcome::Resolved => report.resolved += 1,
                    ReconcileOutcome::NothingToResolve => {}
                }
                if record.deleted {
                    self.resolved.insert(record.id.clone());
                } else {
                    self.resolved.remove(&record.id);
                }
                self.tracker.record(record.id.clone(), marker);
            }
            Step::Noop => report.noop += 1,
            Step::MappingFailed => report.mapping_failed += 1,
            Step::ReconcileFailed => report.reconcile_failed += 1,
        }
    }

    /// Map and upsert a live record.
    fn publish(&self, record: &ProviderRecord) -> Step {
        let entity = match self.mapper.map(record) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(
                    stream = %self.name,
                    record = %record.id,
                    field = err.field(),
                    error = %err,
                    "failed to map record, skipping",
                );
                return Step::MappingFailed;
            }
        };

        match self.reconciler.reconcile(&entity) {
            Ok(outcome) => {
                tracing::info!(
                    stream = %self.name,
                    entity = %entity.id,
                    outcome = ?outcome,
                    "entity reconciled",
                );
                Step::Written(outcome)
            }
            Err(err) => {
                tracing::error!(
                    stream = %self.name,
                    entity = %entity.id,
                    error = %err,
                    "failed to reconcile entity",
                );
                Step::ReconcileFailed
            }
        }
    }

    /// Status-only merge for a resolved record. Records this process never
    /// wrote are skipped without touching the store.
    fn resolve(&self, record: &ProviderRecord) -> Step {
        if !self.tracker.contains(&record.id) {
            tracing::debug!(
                stream = %self.name,
                record = %record.id,
                "resolved record was never written, nothing to do",
            );
            return Step::Noop;
        }

        let Some(fragment) = self.mapper.resolve(record, Utc::now()) else {
            tracing::debug!(
                stream = %self.name,
                record = %record.id,
                entity_type = %self.mapper.entity_type(),
                "entity type has no resolution, ignoring deletion",
            );
            return Step::Noop;
        };

        let id = self.mapper.entity_id(&record.id);
        match self.reconciler.resolve(&id, &fragment) {
            Ok(ReconcileOutcome::NothingToResolve) => {
                tracing::info!(stream = %self.name, entity = %id, "entity to resolve is gone");
                Step::Noop
            }
            Ok(outcome) => {
                tracing::info!(stream = %self.name, entity = %id, "entity resolved");
                Step::Written(outcome)
            }
            Err(err) => {
                tracing::error!(
                    stream = %self.name,
                    entity = %id,
                    error = %err,
                    "failed to resolve entity",
                );
                Step::ReconcileFailed
            }
        }
    }
}

enum Step {
    Written(ReconcileOutcome),
    Noop,
    MappingFailed,
    ReconcileFailed,
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A driver bound to its cursor. The cursor only moves when a cycle
/// completes.
pub struct SyncStream<P, S, M> {
    driver: SyncDriver<P, S, M>,
    cursor: ChangeCursor,
}

impl<P, S, M> SyncStream<P, S, M>
where
    P: ProviderClient,
    S: EntityStore,
    M: RecordMapper,
{
    pub fn new(driver: SyncDriver<P, S, M>) -> Self {
        Self::with_cursor(driver, ChangeCursor::initial())
    }

    pub fn with_cursor(driver: SyncDriver<P, S, M>, cursor: ChangeCursor) -> Self {
        Self { driver, cursor }
    }

    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn cursor(&self) -> &ChangeCursor {
        &self.cursor
    }

    pub fn driver(&self) -> &SyncDriver<P, S, M> {
        &self.driver
    }

    /// Run one cycle from the held cursor and adopt the next one on success.
    pub fn tick(&mut self) -> Result<CycleReport, SyncError> {
        match self.driver.run_cycle(&self.cursor) {
            Ok(report) => {
                self.cursor = report.next_cursor.clone();
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(
                    stream = %self.driver.name(),
                    cursor = %self.cursor,
                    error = %err,
                    "sync cycle failed, cursor kept",
                );
                Err(err)
            }
        }
    }
}

/// Object-safe view of a stream, for schedulers that own heterogeneous
/// streams.
pub trait SyncCycle: Send + 'static {
    fn name(&self) -> &str;
    fn cursor(&self) -> &ChangeCursor;
    fn tick(&mut self) -> Result<CycleReport, SyncError>;
}

impl<P, S, M> SyncCycle for SyncStream<P, S, M>
where
    P: ProviderClient + 'static,
    S: EntityStore + 'static,
    M: RecordMapper + 'static,
{
    fn name(&self) -> &str {
        SyncStream::name(self)
    }

    fn cursor(&self) -> &ChangeCursor {
        SyncStream::cursor(self)
    }

    fn tick(&mut self) -> Result<CycleReport, SyncError> {
        SyncStream::tick(self)
    }
}
