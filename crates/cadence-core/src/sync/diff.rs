//! Snapshot differ.
//!
//! Compares a local and a remote snapshot against the last shared baseline.
//! Decks and series are classified per id; review logs and series progress
//! are unioned and never conflict.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Deck, DeckId, DeckSeries, ReviewLog, SeriesId, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present on one side only
    Added,
    /// Tombstoned on one side since the baseline
    Removed,
    /// Edited on one side since the baseline
    Updated,
}

/// Identity of a diffed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityId {
    Deck(DeckId),
    Series(SeriesId),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deck(id) => write!(f, "deck {id}"),
            Self::Series(id) => write!(f, "series {id}"),
        }
    }
}

/// One version of a deck or series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Entity {
    Deck(Deck),
    Series(DeckSeries),
}

impl Entity {
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Deck(deck) => EntityId::Deck(deck.id),
            Self::Series(series) => EntityId::Series(series.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Deck(deck) => &deck.name,
            Self::Series(series) => &series.name,
        }
    }

    pub const fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Self::Deck(deck) => deck.updated_at,
            Self::Series(series) => series.updated_at,
        }
    }

    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Deck(deck) => deck.deleted_at,
            Self::Series(series) => series.deleted_at,
        }
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    /// Whether this version is a tombstone dated after `other` was last touched
    pub fn supersedes(&self, other: &Self) -> bool {
        !other.is_deleted()
            && self
                .deleted_at()
                .is_some_and(|deleted_at| deleted_at > other.updated_at())
    }
}

/// An entity changed on exactly one side, applied automatically by merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub side: Side,
    pub kind: ChangeKind,
    /// The version to apply
    pub entity: Entity,
    /// The other side's version, absent for additions
    pub counterpart: Option<Entity>,
}

impl Change {
    pub const fn id(&self) -> EntityId {
        self.entity.id()
    }
}

/// An entity changed on both sides since the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub local: Entity,
    pub remote: Entity,
}

impl Conflict {
    pub const fn id(&self) -> EntityId {
        self.local.id()
    }

    pub const fn version(&self, side: Side) -> &Entity {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }
}

/// Everything merge needs, produced fresh by every sync attempt
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub changes: Vec<Change>,
    pub conflicts: Vec<Conflict>,
    /// Entities identical on both sides
    pub unchanged: Vec<Entity>,
    /// Output order: local order, then remote-only ids
    pub deck_order: Vec<DeckId>,
    pub series_order: Vec<SeriesId>,
    /// Review log union by id
    pub reviews: Vec<ReviewLog>,
    /// Completed deck union per series
    pub series_progress: BTreeMap<SeriesId, Vec<DeckId>>,
    pub local_modified: DateTime<Utc>,
    pub remote_modified: DateTime<Utc>,
    /// Both sides already hold the same collection
    pub in_sync: bool,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn changes_from(&self, side: Side) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |change| change.side == side)
    }
}

/// Classify every deck and series of `local` and `remote`.
///
/// With a baseline, an entity that differs between the sides is a conflict
/// only when both sides changed it since the baseline. Without one (full
/// comparison), every differing entity is a conflict.
pub fn diff(local: &Snapshot, remote: &Snapshot, baseline: Option<&Snapshot>) -> Result<MergeReport> {
    local.validate()?;
    remote.validate()?;
    if let Some(baseline) = baseline {
        baseline.validate()?;
        check_baseline(local, remote, baseline)?;
    }

    let mut report = MergeReport {
        changes: Vec::new(),
        conflicts: Vec::new(),
        unchanged: Vec::new(),
        deck_order: ordered_ids(&local.decks, &remote.decks, |deck| deck.id),
        series_order: ordered_ids(&local.deck_series, &remote.deck_series, |series| series.id),
        reviews: union_reviews(&local.reviews, &remote.reviews),
        series_progress: union_progress(&local.series_progress, &remote.series_progress),
        local_modified: local.last_modified,
        remote_modified: remote.last_modified,
        in_sync: false,
    };

    classify(
        &mut report,
        &entities(&local.decks, &local.deck_series),
        &entities(&remote.decks, &remote.deck_series),
        baseline.map(|baseline| entities(&baseline.decks, &baseline.deck_series)),
    );

    report.in_sync = report.changes.is_empty()
        && report.conflicts.is_empty()
        && report.reviews.len() == local.reviews.len()
        && report.reviews.len() == remote.reviews.len()
        && report.series_progress == local.series_progress
        && report.series_progress == remote.series_progress;

    tracing::debug!(
        "Diff: {} changes, {} conflicts, {} unchanged, {} reviews",
        report.changes.len(),
        report.conflicts.len(),
        report.unchanged.len(),
        report.reviews.len()
    );
    Ok(report)
}

/// The baseline must be an ancestor of both sides.
fn check_baseline(local: &Snapshot, remote: &Snapshot, baseline: &Snapshot) -> Result<()> {
    for (side, snapshot) in [(Side::Local, local), (Side::Remote, remote)] {
        if baseline.last_modified > snapshot.last_modified {
            return Err(Error::StaleBaseline(format!(
                "baseline from {} is newer than the {} snapshot from {}",
                baseline.last_modified,
                side.as_str(),
                snapshot.last_modified
            )));
        }

        let review_ids: HashSet<_> = snapshot.reviews.iter().map(|log| log.id).collect();
        if let Some(missing) = baseline
            .reviews
            .iter()
            .find(|log| !review_ids.contains(&log.id))
        {
            return Err(Error::StaleBaseline(format!(
                "review {} from the baseline is missing on the {} side",
                missing.id,
                side.as_str()
            )));
        }
    }
    Ok(())
}

fn classify(
    report: &mut MergeReport,
    local: &HashMap<EntityId, Entity>,
    remote: &HashMap<EntityId, Entity>,
    baseline: Option<HashMap<EntityId, Entity>>,
) {
    let order = report
        .deck_order
        .iter()
        .map(|id| EntityId::Deck(*id))
        .chain(report.series_order.iter().map(|id| EntityId::Series(*id)))
        .collect::<Vec<_>>();

    for id in order {
        match (local.get(&id), remote.get(&id)) {
            (Some(entity), None) => report.changes.push(added(Side::Local, entity)),
            (None, Some(entity)) => report.changes.push(added(Side::Remote, entity)),
            (Some(ours), Some(theirs)) if ours == theirs => report.unchanged.push(ours.clone()),
            (Some(ours), Some(theirs)) => {
                let base = baseline.as_ref().and_then(|baseline| baseline.get(&id));
                let ours_changed = base != Some(ours);
                let theirs_changed = base != Some(theirs);

                match (ours_changed, theirs_changed) {
                    (true, false) => report.changes.push(updated(Side::Local, ours, theirs)),
                    (false, true) => report.changes.push(updated(Side::Remote, theirs, ours)),
                    _ => report.conflicts.push(Conflict {
                        local: ours.clone(),
                        remote: theirs.clone(),
                    }),
                }
            }
            (None, None) => {}
        }
    }
}

fn added(side: Side, entity: &Entity) -> Change {
    Change {
        side,
        kind: ChangeKind::Added,
        entity: entity.clone(),
        counterpart: None,
    }
}

fn updated(side: Side, entity: &Entity, counterpart: &Entity) -> Change {
    let kind = if entity.is_deleted() && !counterpart.is_deleted() {
        ChangeKind::Removed
    } else {
        ChangeKind::Updated
    };
    Change {
        side,
        kind,
        entity: entity.clone(),
        counterpart: Some(counterpart.clone()),
    }
}

fn entities(decks: &[Deck], series: &[DeckSeries]) -> HashMap<EntityId, Entity> {
    decks
        .iter()
        .cloned()
        .map(Entity::Deck)
        .chain(series.iter().cloned().map(Entity::Series))
        .map(|entity| (entity.id(), entity))
        .collect()
}

fn ordered_ids<T, I: Copy + Eq + std::hash::Hash>(
    local: &[T],
    remote: &[T],
    id: impl Fn(&T) -> I,
) -> Vec<I> {
    let mut seen = HashSet::new();
    local
        .iter()
        .chain(remote)
        .map(id)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn union_reviews(local: &[ReviewLog], remote: &[ReviewLog]) -> Vec<ReviewLog> {
    let mut seen = HashSet::new();
    local
        .iter()
        .chain(remote)
        .filter(|log| seen.insert(log.id))
        .cloned()
        .collect()
}

fn union_progress(
    local: &BTreeMap<SeriesId, Vec<DeckId>>,
    remote: &BTreeMap<SeriesId, Vec<DeckId>>,
) -> BTreeMap<SeriesId, Vec<DeckId>> {
    let mut merged = local.clone();
    for (series_id, completed) in remote {
        let decks = merged.entry(*series_id).or_default();
        for deck_id in completed {
            if !decks.contains(deck_id) {
                decks.push(*deck_id);
            }
        }
    }
    merged
}
