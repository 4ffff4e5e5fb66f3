use std::env;
use std::path::{Path, PathBuf};

use cadence_core::models::{DeckSeries, ItemKind, SeriesLevel};
use cadence_core::scheduling::format_interval;
use cadence_core::storage::{SnapshotSlot, SnapshotStore};
use cadence_core::{DatabaseService, Deck, DueItem, Scheduler, Snapshot, StudyConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

/// Trailing characters of an id shown in listings.
///
/// UUID v7 ids share their leading timestamp bits, so the random tail is
/// what tells two ids created close together apart.
pub const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Serialize)]
pub struct DueListItem {
    pub id: String,
    pub deck_id: String,
    pub deck: String,
    pub kind: ItemKind,
    pub front: String,
    pub back: String,
    pub due_date: DateTime<Utc>,
    pub interval: u32,
    pub ease_factor: f64,
    pub lapses: u32,
    pub mastery: Option<f64>,
    pub tags: Vec<String>,
    pub next_intervals: NextIntervals,
}

#[derive(Debug, Serialize)]
pub struct NextIntervals {
    pub fail: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

#[derive(Debug, Serialize)]
pub struct DeckListItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub items: usize,
    pub due: usize,
    pub archived: bool,
    pub series: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os("CADENCE_DB_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("cadence").join("cadence.db"))
        .ok_or_else(|| {
            CliError::Config("could not resolve a data directory; pass --db-path".to_string())
        })
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_config_path.or_else(|| env::var_os("CADENCE_CONFIG_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("cadence").join("config.json"))
        .ok_or_else(|| {
            CliError::Config("could not resolve a config directory; pass --config".to_string())
        })
}

pub fn load_config(path: &Path) -> Result<StudyConfig, CliError> {
    Ok(StudyConfig::load_from_path(path)?)
}

pub async fn open_store(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path).await?)
}

/// The current collection, or an empty one before the first save
pub async fn load_current(store: &DatabaseService) -> Result<Snapshot, CliError> {
    Ok(store
        .load_optional(SnapshotSlot::Current)
        .await?
        .unwrap_or_else(|| Snapshot::empty(DateTime::<Utc>::UNIX_EPOCH)))
}

pub async fn save_current(store: &DatabaseService, snapshot: &Snapshot) -> Result<(), CliError> {
    store.save(SnapshotSlot::Current, snapshot).await?;
    Ok(())
}

pub fn short_id(id: &impl ToString) -> String {
    let id = id.to_string();
    let skip = id.chars().count().saturating_sub(SHORT_ID_LEN);
    id.chars().skip(skip).collect()
}

fn id_matches(id: &str, query: &str) -> bool {
    id.starts_with(query) || id.ends_with(query)
}

/// Pick exactly one candidate by exact id, id prefix or suffix, then by name.
fn resolve_unique<T: Copy>(
    kind: &'static str,
    query: &str,
    candidates: &[T],
    id_of: impl Fn(T) -> String,
    name_of: impl Fn(T) -> String,
) -> Result<T, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::InvalidArgument(format!("{kind} cannot be empty")));
    }
    let lowered = query.to_ascii_lowercase();

    if let Some(exact) = candidates.iter().find(|candidate| id_of(**candidate) == lowered) {
        return Ok(*exact);
    }

    let by_id = candidates
        .iter()
        .copied()
        .filter(|candidate| id_matches(&id_of(*candidate), &lowered))
        .collect::<Vec<_>>();
    let matches = if by_id.is_empty() {
        candidates
            .iter()
            .copied()
            .filter(|candidate| name_of(*candidate).trim().eq_ignore_ascii_case(query))
            .collect::<Vec<_>>()
    } else {
        by_id
    };

    match matches.as_slice() {
        [] => Err(CliError::NotFound {
            kind,
            query: query.to_string(),
        }),
        [single] => Ok(*single),
        several => {
            let options = several
                .iter()
                .take(3)
                .map(|candidate| format!("{} ({})", short_id(&id_of(*candidate)), name_of(*candidate)))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::Ambiguous(format!(
                "{kind} '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_deck<'a>(snapshot: &'a Snapshot, query: &str) -> Result<&'a Deck, CliError> {
    let decks = snapshot
        .decks
        .iter()
        .filter(|deck| !deck.is_deleted())
        .collect::<Vec<_>>();
    resolve_unique(
        "deck",
        query,
        &decks,
        |deck| deck.id.to_string(),
        |deck| deck.name.clone(),
    )
}

pub fn resolve_series<'a>(snapshot: &'a Snapshot, query: &str) -> Result<&'a DeckSeries, CliError> {
    let series = snapshot
        .deck_series
        .iter()
        .filter(|series| !series.is_deleted())
        .collect::<Vec<_>>();
    resolve_unique(
        "series",
        query,
        &series,
        |series| series.id.to_string(),
        |series| series.name.clone(),
    )
}

pub fn resolve_item<'a>(snapshot: &'a Snapshot, query: &str) -> Result<DueItem<'a>, CliError> {
    let items = snapshot
        .decks
        .iter()
        .filter(|deck| !deck.is_deleted())
        .flat_map(|deck| deck.items.iter().map(move |item| DueItem { deck, item }))
        .collect::<Vec<_>>();
    resolve_unique(
        "item",
        query,
        &items,
        |entry| entry.item.id.to_string(),
        |entry| entry.item.front.clone(),
    )
}

/// Parse `TITLE=DECK[,DECK...]` into a series level of existing decks.
pub fn parse_level_spec(spec: &str, snapshot: &Snapshot) -> Result<SeriesLevel, CliError> {
    let (title, decks) = spec.split_once('=').ok_or_else(|| {
        CliError::InvalidArgument(format!("level '{spec}' must look like TITLE=DECK[,DECK...]"))
    })?;
    let title = title.trim();
    if title.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "level '{spec}' has an empty title"
        )));
    }

    let mut deck_ids = Vec::new();
    for query in decks.split(',').map(str::trim).filter(|query| !query.is_empty()) {
        let deck_id = resolve_deck(snapshot, query)?.id;
        if !deck_ids.contains(&deck_id) {
            deck_ids.push(deck_id);
        }
    }
    if deck_ids.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "level '{title}' lists no decks"
        )));
    }

    Ok(SeriesLevel {
        title: title.to_string(),
        deck_ids,
    })
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// How a due date relates to today: `today`, `3d overdue`, or `in 2w`.
pub fn format_due_label(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now.date_naive() - due.date_naive()).num_days();
    match days {
        0 => "today".to_string(),
        overdue if overdue > 0 => format!("{overdue}d overdue"),
        ahead => format!(
            "in {}",
            format_interval(u32::try_from(-ahead).unwrap_or(u32::MAX))
        ),
    }
}

pub fn preview_text(preview: [u32; 4]) -> String {
    let [fail, hard, good, easy] = preview.map(format_interval);
    format!("fail {fail} / hard {hard} / good {good} / easy {easy}")
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn due_to_list_item(entry: DueItem<'_>, scheduler: &Scheduler) -> DueListItem {
    let [fail, hard, good, easy] = scheduler.preview_intervals(entry.item);
    DueListItem {
        id: entry.item.id.to_string(),
        deck_id: entry.deck.id.to_string(),
        deck: entry.deck.name.clone(),
        kind: entry.item.kind,
        front: entry.item.front.clone(),
        back: entry.item.back.clone(),
        due_date: entry.item.due_date,
        interval: entry.item.interval,
        ease_factor: entry.item.ease_factor,
        lapses: entry.item.lapses,
        mastery: entry.item.mastery_level,
        tags: entry.item.tags.iter().cloned().collect(),
        next_intervals: NextIntervals {
            fail,
            hard,
            good,
            easy,
        },
    }
}

pub fn format_due_lines(items: &[DueItem<'_>], now: DateTime<Utc>) -> Vec<String> {
    items
        .iter()
        .map(|entry| {
            let deck = truncate(&entry.deck.name, 16);
            let front = truncate(&entry.item.front, 40);
            let label = format_due_label(entry.item.due_date, now);
            format!(
                "{}  {deck:<16}  {front:<40}  {label}",
                short_id(&entry.item.id)
            )
        })
        .collect()
}

pub fn deck_to_list_item(snapshot: &Snapshot, deck: &Deck, now: DateTime<Utc>) -> DeckListItem {
    let cutoff = cadence_core::util::end_of_day(now);
    DeckListItem {
        id: deck.id.to_string(),
        name: deck.name.clone(),
        description: deck.description.clone(),
        items: deck.items.len(),
        due: deck
            .items
            .iter()
            .filter(|item| !item.suspended && item.due_date <= cutoff)
            .count(),
        archived: deck.archived,
        series: snapshot
            .series_for_deck(&deck.id)
            .and_then(|series_id| snapshot.series(&series_id))
            .map(|series| series.name.clone()),
        updated_at: deck.updated_at,
    }
}

pub fn format_deck_lines(items: &[DeckListItem]) -> Vec<String> {
    items
        .iter()
        .map(|deck| {
            let name = truncate(&deck.name, 24);
            let mut line = format!(
                "{}  {name:<24}  {:>4} items  {:>4} due",
                short_id(&deck.id),
                deck.items,
                deck.due
            );
            if let Some(series) = &deck.series {
                line.push_str(&format!("  [{series}]"));
            }
            if deck.archived {
                line.push_str("  (archived)");
            }
            line
        })
        .collect()
}
