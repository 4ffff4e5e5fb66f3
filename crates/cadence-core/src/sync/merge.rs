//! Merge engine: folds a diff report and the user's resolutions into one
//! consolidated snapshot.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diff::{Entity, EntityId, MergeReport, Side};
use crate::error::{Error, Result};
use crate::models::{Snapshot, SNAPSHOT_SCHEMA_VERSION};

/// Which version of a conflicting entity survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepLocal,
    KeepRemote,
}

impl Resolution {
    pub const fn side(self) -> Side {
        match self {
            Self::KeepLocal => Side::Local,
            Self::KeepRemote => Side::Remote,
        }
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "keep-local" | "keep_local" | "l" => Ok(Self::KeepLocal),
            "remote" | "keep-remote" | "keep_remote" | "r" => Ok(Self::KeepRemote),
            other => Err(Error::Validation(format!(
                "unknown resolution '{other}' (expected local or remote)"
            ))),
        }
    }
}

/// The user's choice for one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResolution {
    pub id: EntityId,
    pub choice: Resolution,
}

impl UserResolution {
    pub const fn new(id: EntityId, choice: Resolution) -> Self {
        Self { id, choice }
    }

    /// The same explicit choice for every conflict in `report`
    pub fn for_all(report: &MergeReport, choice: Resolution) -> Vec<Self> {
        report
            .conflicts
            .iter()
            .map(|conflict| Self::new(conflict.id(), choice))
            .collect()
    }
}

/// Produce the consolidated snapshot.
///
/// Every conflict needs a resolution; a missing one is reported as
/// [`Error::ConflictUnresolved`] and nothing is merged. Unconflicted changes
/// apply in either direction, except that a tombstone dated after the other
/// side's last edit is never overwritten by that stale version.
pub fn merge(
    report: &MergeReport,
    resolutions: &[UserResolution],
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    let choices: HashMap<EntityId, Resolution> = resolutions
        .iter()
        .map(|resolution| (resolution.id, resolution.choice))
        .collect();

    for id in choices.keys() {
        if !report.conflicts.iter().any(|conflict| conflict.id() == *id) {
            tracing::warn!("Ignoring resolution for {id}, which is not in conflict");
        }
    }

    let mut folded: HashMap<EntityId, Entity> = HashMap::new();
    for conflict in &report.conflicts {
        let choice = choices
            .get(&conflict.id())
            .ok_or_else(|| Error::ConflictUnresolved(conflict.id().to_string()))?;
        let chosen = conflict.version(choice.side());
        let other = conflict.version(choice.side().opposite());
        let winner = if other.supersedes(chosen) {
            tracing::info!(
                "Keeping newer {} deletion of {} over the chosen version",
                choice.side().opposite().as_str(),
                conflict.id()
            );
            other
        } else {
            chosen
        };
        folded.insert(conflict.id(), winner.clone());
    }

    for change in &report.changes {
        let winner = match &change.counterpart {
            Some(counterpart) if counterpart.supersedes(&change.entity) => {
                tracing::debug!(
                    "Keeping tombstone for {} over stale {} version",
                    change.id(),
                    change.side.as_str()
                );
                counterpart
            }
            _ => &change.entity,
        };
        folded.insert(change.id(), winner.clone());
    }

    for entity in &report.unchanged {
        folded.insert(entity.id(), entity.clone());
    }

    let newest_side = report.local_modified.max(report.remote_modified);
    let mut merged = Snapshot::empty(if report.in_sync {
        newest_side
    } else {
        newest_side.max(now)
    });
    merged.version = SNAPSHOT_SCHEMA_VERSION;

    for id in &report.deck_order {
        if let Some(Entity::Deck(deck)) = folded.remove(&EntityId::Deck(*id)) {
            merged.decks.push(deck);
        }
    }
    for id in &report.series_order {
        if let Some(Entity::Series(series)) = folded.remove(&EntityId::Series(*id)) {
            merged.deck_series.push(series);
        }
    }
    merged.reviews.clone_from(&report.reviews);
    merged.series_progress.clone_from(&report.series_progress);

    if !report.in_sync {
        drop_deleted_deck_references(&mut merged);
    }
    merged.validate()?;

    tracing::debug!(
        "Merged {} decks, {} series, {} reviews ({} conflicts resolved)",
        merged.decks.len(),
        merged.deck_series.len(),
        merged.reviews.len(),
        report.conflicts.len()
    );
    Ok(merged)
}

/// Series levels must not keep pointing at decks tombstoned on the other side.
fn drop_deleted_deck_references(snapshot: &mut Snapshot) {
    let tombstones: Vec<_> = snapshot
        .decks
        .iter()
        .filter_map(|deck| deck.deleted_at.map(|deleted_at| (deck.id, deleted_at)))
        .collect();

    for series in &mut snapshot.deck_series {
        for (deck_id, deleted_at) in &tombstones {
            if series.remove_deck(deck_id) && *deleted_at > series.updated_at {
                series.updated_at = *deleted_at;
            }
        }
    }
}
