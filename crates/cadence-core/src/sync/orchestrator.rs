//! Sync orchestration: fetch remote, diff, await resolution, merge, persist.
//!
//! One attempt at a time per database. An attempt holds the store's sync
//! lease until it is finished or dropped; dropping or cancelling it writes
//! nothing. Local writes made while an attempt is open are never overwritten:
//! the commit fails with [`Error::LocalChanged`] instead.

use std::fmt;

use chrono::{DateTime, Utc};

use super::diff::{diff, MergeReport};
use super::merge::{merge, UserResolution};
use crate::error::{Error, Result};
use crate::models::Snapshot;
use crate::remote::{RemoteSnapshot, RemoteSnapshotSource};
use crate::storage::{SnapshotSlot, SnapshotStore, SyncLease};

/// Phase of one sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Diffed,
    AwaitingResolution,
    Resolved,
    Merging,
    Persisted,
    Failed,
}

impl SyncPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Diffed => "diffed",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Resolved => "resolved",
            Self::Merging => "merging",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal step
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Diffed)
                | (Self::Diffed, Self::AwaitingResolution | Self::Merging)
                | (Self::AwaitingResolution, Self::Resolved | Self::Idle)
                | (Self::Resolved, Self::Merging)
                | (Self::Merging, Self::Persisted)
                | (
                    Self::Idle
                        | Self::Fetching
                        | Self::Diffed
                        | Self::AwaitingResolution
                        | Self::Resolved
                        | Self::Merging,
                    Self::Failed
                )
        )
    }

    fn advance(&mut self, next: Self) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        tracing::info!("Sync phase {} -> {}", self.as_str(), next.as_str());
        *self = next;
        Ok(())
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the attempt compares the two sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Use the stored baseline; a stale one is an error
    Baseline,
    /// Ignore the baseline and treat every difference as a conflict
    Full,
}

/// One in-flight sync attempt
pub struct SyncAttempt {
    phase: SyncPhase,
    local: Option<Snapshot>,
    remote: RemoteSnapshot,
    report: MergeReport,
    resolutions: Vec<UserResolution>,
    _lease: SyncLease,
}

impl fmt::Debug for SyncAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAttempt")
            .field("phase", &self.phase)
            .field("remote_modified_at", &self.remote.modified_at)
            .field("conflicts", &self.report.conflicts.len())
            .finish_non_exhaustive()
    }
}

impl SyncAttempt {
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub const fn report(&self) -> &MergeReport {
        &self.report
    }

    /// The fetched remote snapshot, held unchanged for the whole attempt
    pub const fn remote(&self) -> &RemoteSnapshot {
        &self.remote
    }

    pub const fn needs_resolution(&self) -> bool {
        matches!(self.phase, SyncPhase::AwaitingResolution)
    }

    /// Record the user's choices for the pending conflicts
    pub fn resolve(&mut self, resolutions: Vec<UserResolution>) -> Result<()> {
        if let Some(missing) = self.report.conflicts.iter().find(|conflict| {
            !resolutions
                .iter()
                .any(|resolution| resolution.id == conflict.id())
        }) {
            return Err(Error::ConflictUnresolved(missing.id().to_string()));
        }
        self.phase.advance(SyncPhase::Resolved)?;
        self.resolutions = resolutions;
        Ok(())
    }

    /// Abandon the attempt; local state and baseline stay untouched
    pub fn cancel(mut self) -> Result<SyncPhase> {
        self.phase.advance(SyncPhase::Idle)?;
        tracing::info!("Sync cancelled; discarded remote snapshot");
        Ok(self.phase)
    }
}

/// Result of a completed sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub merged: Snapshot,
    pub changes_applied: usize,
    pub conflicts_resolved: usize,
    pub phase: SyncPhase,
}

/// Sequences sync attempts against one store and one remote
pub struct SyncOrchestrator<S, R> {
    store: S,
    remote: R,
}

impl<S: SnapshotStore, R: RemoteSnapshotSource> SyncOrchestrator<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        Self { store, remote }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Fetch the remote and diff it against the local snapshot.
    ///
    /// Fails with [`Error::SyncInProgress`] while another attempt on the same
    /// database is alive, in this process or another.
    pub async fn begin(&self, mode: ComparisonMode) -> Result<SyncAttempt> {
        let lease = self.store.try_acquire_sync_lease()?;

        let mut phase = SyncPhase::Idle;
        match self.prepare(&mut phase, mode).await {
            Ok((local, remote, report)) => {
                let mut attempt = SyncAttempt {
                    phase,
                    local,
                    remote,
                    report,
                    resolutions: Vec::new(),
                    _lease: lease,
                };
                if attempt.report.has_conflicts() {
                    attempt.phase.advance(SyncPhase::AwaitingResolution)?;
                }
                Ok(attempt)
            }
            Err(error) => {
                fail(&mut phase, &error);
                Err(error)
            }
        }
    }

    /// Merge, publish to the remote, then commit locally as current and baseline.
    pub async fn finish(&self, mut attempt: SyncAttempt, now: DateTime<Utc>) -> Result<SyncOutcome> {
        attempt.phase.advance(SyncPhase::Merging)?;
        match self.persist(&attempt, now).await {
            Ok(merged) => {
                attempt.phase.advance(SyncPhase::Persisted)?;
                Ok(SyncOutcome {
                    merged,
                    changes_applied: attempt.report.changes.len(),
                    conflicts_resolved: attempt.report.conflicts.len(),
                    phase: attempt.phase,
                })
            }
            Err(error) => {
                fail(&mut attempt.phase, &error);
                Err(error)
            }
        }
    }

    async fn prepare(
        &self,
        phase: &mut SyncPhase,
        mode: ComparisonMode,
    ) -> Result<(Option<Snapshot>, RemoteSnapshot, MergeReport)> {
        phase.advance(SyncPhase::Fetching)?;
        let stored = self.store.load_optional(SnapshotSlot::Current).await?;
        let local = stored
            .clone()
            .unwrap_or_else(|| Snapshot::empty(DateTime::<Utc>::UNIX_EPOCH));
        let baseline = match mode {
            ComparisonMode::Baseline => self.store.load_optional(SnapshotSlot::Baseline).await?,
            ComparisonMode::Full => None,
        };

        let remote = match self.remote.fetch_remote().await {
            Ok(remote) => remote,
            Err(Error::NotFound(_)) => {
                tracing::info!(
                    "Nothing published at {} yet; syncing against an empty collection",
                    self.remote.describe()
                );
                RemoteSnapshot {
                    snapshot: Snapshot::empty(DateTime::<Utc>::UNIX_EPOCH),
                    modified_at: DateTime::<Utc>::UNIX_EPOCH,
                }
            }
            Err(error) => return Err(error),
        };

        let report = diff(&local, &remote.snapshot, baseline.as_ref())?;
        phase.advance(SyncPhase::Diffed)?;
        Ok((stored, remote, report))
    }

    async fn persist(&self, attempt: &SyncAttempt, now: DateTime<Utc>) -> Result<Snapshot> {
        let merged = merge(&attempt.report, &attempt.resolutions, now)?;
        // The commit re-checks this atomically; checking here keeps a stale
        // merge off the remote.
        let current = self.store.load_optional(SnapshotSlot::Current).await?;
        if current != attempt.local {
            return Err(Error::LocalChanged);
        }
        if merged != attempt.remote.snapshot {
            self.remote.publish(&merged).await?;
        }
        self.store.commit_sync(attempt.local.as_ref(), &merged).await?;
        Ok(merged)
    }
}

fn fail(phase: &mut SyncPhase, error: &Error) {
    if error.is_io_boundary() {
        tracing::warn!(
            "Sync failed during {}: {}; local collection unchanged, safe to retry",
            phase.as_str(),
            error
        );
    } else {
        tracing::warn!("Sync failed during {}: {}", phase.as_str(), error);
    }
    if phase.advance(SyncPhase::Failed).is_err() {
        *phase = SyncPhase::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::super::diff::tests::{at, base_snapshot};
    use super::super::merge::Resolution;
    use super::*;
    use crate::models::Deck;
    use crate::services::DatabaseService;
    use crate::storage::MemorySnapshotStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    /// Remote held in memory, with an optional injected failure
    #[derive(Clone, Default)]
    struct MemoryRemote {
        snapshot: Arc<Mutex<Option<Snapshot>>>,
        fail_publish: bool,
    }

    impl MemoryRemote {
        fn holding(snapshot: Snapshot) -> Self {
            Self {
                snapshot: Arc::new(Mutex::new(Some(snapshot))),
                fail_publish: false,
            }
        }

        async fn current(&self) -> Option<Snapshot> {
            self.snapshot.lock().await.clone()
        }
    }

    impl RemoteSnapshotSource for MemoryRemote {
        async fn fetch_remote(&self) -> Result<RemoteSnapshot> {
            self.snapshot
                .lock()
                .await
                .clone()
                .map(|snapshot| RemoteSnapshot {
                    modified_at: snapshot.last_modified,
                    snapshot,
                })
                .ok_or_else(|| Error::NotFound("remote".to_string()))
        }

        async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
            if self.fail_publish {
                return Err(Error::RemoteFetch("connection reset".to_string()));
            }
            *self.snapshot.lock().await = Some(snapshot.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    async fn diverged() -> (MemorySnapshotStore, MemoryRemote, Snapshot) {
        let base = base_snapshot();
        let mut local = base.clone();
        let mut remote = base.clone();
        local.decks[0].name = "Local".to_string();
        local.decks[0].updated_at = at(5);
        local.last_modified = at(5);
        remote.decks[0].name = "Remote".to_string();
        remote.decks[0].updated_at = at(6);
        remote.last_modified = at(6);

        let store = MemorySnapshotStore::with_current(local.clone());
        store.save(SnapshotSlot::Baseline, &base).await.unwrap();
        (store, MemoryRemote::holding(remote), local)
    }

    #[test]
    fn phase_transitions_follow_the_state_machine() {
        use SyncPhase::{AwaitingResolution, Diffed, Failed, Fetching, Idle, Merging, Persisted, Resolved};
        assert!(Idle.can_transition_to(Fetching));
        assert!(Diffed.can_transition_to(Merging));
        assert!(AwaitingResolution.can_transition_to(Idle));
        assert!(Merging.can_transition_to(Failed));
        assert!(!Fetching.can_transition_to(Merging));
        assert!(!Persisted.can_transition_to(Failed));
        assert!(!Resolved.can_transition_to(Idle));

        let mut phase = Idle;
        assert!(matches!(
            phase.advance(Persisted),
            Err(Error::InvalidTransition { .. })
        ));
        assert_eq!(phase, Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_sync_publishes_local_collection() {
        let local = base_snapshot();
        let store = MemorySnapshotStore::with_current(local.clone());
        let orchestrator = SyncOrchestrator::new(store, MemoryRemote::default());

        let attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        assert_eq!(attempt.phase(), SyncPhase::Diffed);
        let outcome = orchestrator.finish(attempt, at(10)).await.unwrap();

        assert_eq!(outcome.phase, SyncPhase::Persisted);
        assert_eq!(outcome.merged.decks, local.decks);
        assert_eq!(orchestrator.remote().current().await, Some(outcome.merged.clone()));
        assert_eq!(
            orchestrator.store().load(SnapshotSlot::Baseline).await.unwrap(),
            outcome.merged
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflicts_wait_for_resolution() {
        let (store, remote, _) = diverged().await;
        let orchestrator = SyncOrchestrator::new(store, remote);

        let mut attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        assert!(attempt.needs_resolution());
        assert!(matches!(
            attempt.resolve(Vec::new()),
            Err(Error::ConflictUnresolved(_))
        ));

        let choices = UserResolution::for_all(attempt.report(), Resolution::KeepLocal);
        attempt.resolve(choices).unwrap();
        assert_eq!(attempt.phase(), SyncPhase::Resolved);

        let outcome = orchestrator.finish(attempt, at(20)).await.unwrap();
        assert_eq!(outcome.merged.decks[0].name, "Local");
        assert_eq!(outcome.conflicts_resolved, 1);
        let published = orchestrator.remote().current().await.unwrap();
        assert_eq!(published.decks[0].name, "Local");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finishing_without_resolution_is_rejected() {
        let (store, remote, _) = diverged().await;
        let orchestrator = SyncOrchestrator::new(store, remote);
        let attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();

        let error = orchestrator.finish(attempt, at(20)).await.unwrap_err();
        assert!(matches!(error, Error::InvalidTransition { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_leaves_local_state_untouched() {
        let (store, remote, local) = diverged().await;
        let baseline = store.load(SnapshotSlot::Baseline).await.unwrap();
        let remote_before = remote.current().await;
        let orchestrator = SyncOrchestrator::new(store, remote);

        let attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        assert_eq!(attempt.cancel().unwrap(), SyncPhase::Idle);

        assert_eq!(orchestrator.store().load(SnapshotSlot::Current).await.unwrap(), local);
        assert_eq!(
            orchestrator.store().load(SnapshotSlot::Baseline).await.unwrap(),
            baseline
        );
        assert_eq!(orchestrator.remote().current().await, remote_before);

        // The guard is released, so a new attempt can start.
        assert!(orchestrator.begin(ComparisonMode::Baseline).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_attempt_is_rejected_while_one_is_in_flight() {
        let (store, remote, _) = diverged().await;
        let orchestrator = SyncOrchestrator::new(store, remote);

        let first = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        assert!(matches!(
            orchestrator.begin(ComparisonMode::Baseline).await,
            Err(Error::SyncInProgress)
        ));
        drop(first);
        assert!(orchestrator.begin(ComparisonMode::Baseline).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attempts_on_separate_handles_to_one_database_exclude_each_other() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("cadence.db");
        let remote = MemoryRemote::default();
        let first = SyncOrchestrator::new(
            DatabaseService::open_path(&db_path).await.unwrap(),
            remote.clone(),
        );
        let second =
            SyncOrchestrator::new(DatabaseService::open_path(&db_path).await.unwrap(), remote);

        let attempt = first.begin(ComparisonMode::Baseline).await.unwrap();
        assert!(matches!(
            second.begin(ComparisonMode::Baseline).await,
            Err(Error::SyncInProgress)
        ));

        first.finish(attempt, at(10)).await.unwrap();
        let attempt = second.begin(ComparisonMode::Baseline).await.unwrap();
        assert!(!attempt.needs_resolution());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_write_during_resolution_is_never_overwritten() {
        let (store, remote, local) = diverged().await;
        let baseline = store.load(SnapshotSlot::Baseline).await.unwrap();
        let remote_before = remote.current().await;
        let orchestrator = SyncOrchestrator::new(store, remote);

        let mut attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        let mut edited = local.clone();
        edited.decks.push(Deck::new("Made while prompt open", at(7)));
        edited.last_modified = at(7);
        orchestrator
            .store()
            .save(SnapshotSlot::Current, &edited)
            .await
            .unwrap();

        let choices = UserResolution::for_all(attempt.report(), Resolution::KeepLocal);
        attempt.resolve(choices).unwrap();
        let error = orchestrator.finish(attempt, at(20)).await.unwrap_err();
        assert!(matches!(error, Error::LocalChanged));
        assert_eq!(orchestrator.store().load(SnapshotSlot::Current).await.unwrap(), edited);
        assert_eq!(
            orchestrator.store().load(SnapshotSlot::Baseline).await.unwrap(),
            baseline
        );
        assert_eq!(orchestrator.remote().current().await, remote_before);

        // Running the sync again picks the new deck up.
        let mut attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        let choices = UserResolution::for_all(attempt.report(), Resolution::KeepLocal);
        attempt.resolve(choices).unwrap();
        let outcome = orchestrator.finish(attempt, at(21)).await.unwrap();
        assert_eq!(outcome.merged.decks.len(), edited.decks.len());
        assert!(outcome
            .merged
            .decks
            .iter()
            .any(|deck| deck.name == "Made while prompt open"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publish_failure_keeps_local_commit_untouched() {
        let (store, remote, local) = diverged().await;
        let remote = MemoryRemote {
            fail_publish: true,
            ..remote
        };
        let orchestrator = SyncOrchestrator::new(store, remote);

        let mut attempt = orchestrator.begin(ComparisonMode::Baseline).await.unwrap();
        let choices = UserResolution::for_all(attempt.report(), Resolution::KeepRemote);
        attempt.resolve(choices).unwrap();

        let error = orchestrator.finish(attempt, at(20)).await.unwrap_err();
        assert!(error.is_io_boundary());
        assert_eq!(orchestrator.store().load(SnapshotSlot::Current).await.unwrap(), local);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_baseline_fails_and_full_comparison_recovers() {
        let (store, remote, _) = diverged().await;
        let mut stale = base_snapshot();
        stale.decks.push(Deck::new("From the future", at(100)));
        stale.last_modified = at(100);
        store.save(SnapshotSlot::Baseline, &stale).await.unwrap();
        let orchestrator = SyncOrchestrator::new(store, remote);

        assert!(matches!(
            orchestrator.begin(ComparisonMode::Baseline).await,
            Err(Error::StaleBaseline(_))
        ));

        let attempt = orchestrator.begin(ComparisonMode::Full).await.unwrap();
        assert!(attempt.needs_resolution());
        assert_eq!(attempt.report().conflicts.len(), 1);
    }
}
