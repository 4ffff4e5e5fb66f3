//! Collection operations over snapshots.
//!
//! Every operation takes the current snapshot by reference and returns a new
//! one; nothing is mutated in place. Modification markers only move forward.

use chrono::{DateTime, Utc};

use crate::config::StudyConfig;
use crate::error::{Error, Result};
use crate::models::{
    Deck, DeckId, DeckSeries, ItemId, Rating, ReviewLog, Reviewable, SeriesId, SeriesLevel,
    Snapshot,
};
use crate::scheduling::{apply_leech_action, LeechOutcome, ReviewContext, Scheduler};
use crate::util::end_of_day;

/// An item due for review together with its owning deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueItem<'a> {
    pub deck: &'a Deck,
    pub item: &'a Reviewable,
}

/// Non-suspended items in live decks due on or before the end of `now`'s day.
///
/// Order is unspecified; callers sort or prioritize.
pub fn due_items(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<DueItem<'_>> {
    let cutoff = end_of_day(now);
    snapshot
        .decks
        .iter()
        .filter(|deck| deck.is_active())
        .flat_map(|deck| {
            deck.items
                .iter()
                .filter(move |item| !item.suspended && item.due_date <= cutoff)
                .map(move |item| DueItem { deck, item })
        })
        .collect()
}

/// Result of rating one item
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewReceipt {
    pub item: Reviewable,
    pub log: ReviewLog,
    /// Remediation applied when the item crossed the leech threshold
    pub leech: Option<LeechOutcome>,
}

/// Schedule `item_id` with `rating` (or suspend it) and append the review log.
pub fn record_review(
    snapshot: &Snapshot,
    item_id: &ItemId,
    rating: Option<Rating>,
    config: &StudyConfig,
    now: DateTime<Utc>,
) -> Result<(Snapshot, ReviewReceipt)> {
    let (deck, item) = snapshot
        .find_item(item_id)
        .ok_or_else(|| Error::NotFound(format!("item {item_id}")))?;
    if deck.is_deleted() {
        return Err(Error::NotFound(format!(
            "item {item_id} belongs to deleted deck {}",
            deck.id
        )));
    }

    let context = ReviewContext {
        deck_id: deck.id,
        series_id: snapshot.series_for_deck(&deck.id),
    };
    let scheduled = Scheduler::from_config(config).schedule(item, rating, context, now);

    let mut item = scheduled.item;
    let leech = if scheduled.is_leech && rating.is_some() {
        apply_leech_action(&mut item, &config.leech)
    } else {
        None
    };

    let mut next = snapshot.clone();
    let deck_id = context.deck_id;
    let deck = next
        .deck_mut(&deck_id)
        .ok_or_else(|| Error::NotFound(format!("deck {deck_id}")))?;
    if let Some(slot) = deck.item_mut(item_id) {
        *slot = item.clone();
    }
    touch(&mut deck.updated_at, now);
    next.reviews.push(scheduled.log.clone());
    touch(&mut next.last_modified, now);

    Ok((
        next,
        ReviewReceipt {
            item,
            log: scheduled.log,
            leech,
        },
    ))
}

/// Create a new, empty deck
pub fn add_deck(snapshot: &Snapshot, name: &str, now: DateTime<Utc>) -> Result<(Snapshot, DeckId)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("deck name cannot be empty".to_string()));
    }

    let deck = Deck::new(name, now);
    let deck_id = deck.id;
    let mut next = snapshot.clone();
    next.decks.push(deck);
    touch(&mut next.last_modified, now);
    Ok((next, deck_id))
}

/// Append an item to a live deck
pub fn add_item(
    snapshot: &Snapshot,
    deck_id: &DeckId,
    item: Reviewable,
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    if snapshot.find_item(&item.id).is_some() {
        return Err(Error::Validation(format!("item {} already exists", item.id)));
    }

    let mut next = snapshot.clone();
    let deck = live_deck_mut(&mut next, deck_id)?;
    deck.items.push(item);
    touch(&mut deck.updated_at, now);
    touch(&mut next.last_modified, now);
    Ok(next)
}

/// Explicit progress reset, the only operation that lowers `lapses`
pub fn reset_progress(snapshot: &Snapshot, item_id: &ItemId, now: DateTime<Utc>) -> Result<Snapshot> {
    let deck_id = snapshot
        .find_item(item_id)
        .map(|(deck, _)| deck.id)
        .ok_or_else(|| Error::NotFound(format!("item {item_id}")))?;

    let mut next = snapshot.clone();
    let deck = live_deck_mut(&mut next, &deck_id)?;
    if let Some(item) = deck.item_mut(item_id) {
        item.reset_progress(now);
    }
    touch(&mut deck.updated_at, now);
    touch(&mut next.last_modified, now);
    Ok(next)
}

/// Tombstone a deck and drop its id from every series level
pub fn delete_deck(snapshot: &Snapshot, deck_id: &DeckId, now: DateTime<Utc>) -> Result<Snapshot> {
    let mut next = snapshot.clone();
    let deck = live_deck_mut(&mut next, deck_id)?;
    deck.deleted_at = Some(now);
    touch(&mut deck.updated_at, now);

    for series in &mut next.deck_series {
        if series.remove_deck(deck_id) {
            touch(&mut series.updated_at, now);
        }
    }
    touch(&mut next.last_modified, now);
    Ok(next)
}

pub fn set_deck_archived(
    snapshot: &Snapshot,
    deck_id: &DeckId,
    archived: bool,
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    let mut next = snapshot.clone();
    let deck = live_deck_mut(&mut next, deck_id)?;
    if deck.archived != archived {
        deck.archived = archived;
        touch(&mut deck.updated_at, now);
        touch(&mut next.last_modified, now);
    }
    Ok(next)
}

/// Create a series whose levels reference existing live decks
pub fn add_series(
    snapshot: &Snapshot,
    name: &str,
    levels: Vec<SeriesLevel>,
    now: DateTime<Utc>,
) -> Result<(Snapshot, SeriesId)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("series name cannot be empty".to_string()));
    }
    for deck_id in levels.iter().flat_map(|level| level.deck_ids.iter()) {
        if !snapshot.deck(deck_id).is_some_and(|deck| !deck.is_deleted()) {
            return Err(Error::NotFound(format!("deck {deck_id}")));
        }
    }

    let series = DeckSeries::new(name, levels, now);
    let series_id = series.id;
    let mut next = snapshot.clone();
    next.deck_series.push(series);
    touch(&mut next.last_modified, now);
    Ok((next, series_id))
}

pub fn delete_series(
    snapshot: &Snapshot,
    series_id: &SeriesId,
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    let mut next = snapshot.clone();
    let series = next
        .series_mut(series_id)
        .filter(|series| !series.is_deleted())
        .ok_or_else(|| Error::NotFound(format!("series {series_id}")))?;
    series.deleted_at = Some(now);
    touch(&mut series.updated_at, now);
    touch(&mut next.last_modified, now);
    Ok(next)
}

/// Mark a deck complete within a series. Completion is never undone.
pub fn complete_series_deck(
    snapshot: &Snapshot,
    series_id: &SeriesId,
    deck_id: &DeckId,
    now: DateTime<Utc>,
) -> Result<Snapshot> {
    let series = snapshot
        .series(series_id)
        .filter(|series| !series.is_deleted())
        .ok_or_else(|| Error::NotFound(format!("series {series_id}")))?;
    if !series.contains_deck(deck_id) {
        return Err(Error::Validation(format!(
            "deck {deck_id} is not part of series {series_id}"
        )));
    }

    let mut next = snapshot.clone();
    let completed = next.series_progress.entry(*series_id).or_default();
    if !completed.contains(deck_id) {
        completed.push(*deck_id);
        touch(&mut next.last_modified, now);
    }
    Ok(next)
}

fn live_deck_mut<'a>(snapshot: &'a mut Snapshot, deck_id: &DeckId) -> Result<&'a mut Deck> {
    snapshot
        .deck_mut(deck_id)
        .filter(|deck| !deck.is_deleted())
        .ok_or_else(|| Error::NotFound(format!("deck {deck_id}")))
}

fn touch(marker: &mut DateTime<Utc>, now: DateTime<Utc>) {
    if now > *marker {
        *marker = now;
    }
}
