use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use cadence_core::remote::{Remote, RemoteSnapshotSource};
use cadence_core::sync::{
    ComparisonMode, Conflict, Entity, EntityId, MergeReport, Resolution, Side, SyncOrchestrator,
    SyncOutcome, UserResolution,
};
use chrono::Utc;

use crate::cli::ResolveSide;
use crate::commands::common::{format_timestamp, open_store, short_id};
use crate::error::CliError;

pub async fn run_sync(
    remote: &str,
    resolve_all: Option<ResolveSide>,
    token: Option<String>,
    full: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let remote = Remote::parse(remote)?.with_token(token);
    let orchestrator = SyncOrchestrator::new(store, remote);
    let location = orchestrator.remote().describe();

    let mode = if full {
        ComparisonMode::Full
    } else {
        ComparisonMode::Baseline
    };
    let mut attempt = match orchestrator.begin(mode).await {
        Ok(attempt) => attempt,
        Err(cadence_core::Error::StaleBaseline(reason)) if mode == ComparisonMode::Baseline => {
            eprintln!(
                "Last sync point no longer matches ({reason}); comparing in full, every difference needs a decision."
            );
            orchestrator.begin(ComparisonMode::Full).await?
        }
        Err(error) => return Err(error.into()),
    };

    if attempt.needs_resolution() {
        let report = attempt.report();
        let resolutions = if let Some(side) = resolve_all {
            Some(UserResolution::for_all(report, side.into()))
        } else if io::stdin().is_terminal() {
            let stdin = io::stdin();
            prompt_resolutions(report, &mut stdin.lock(), &mut io::stdout())?
        } else {
            for line in format_conflict_lines(report) {
                eprintln!("{line}");
            }
            let count = report.conflicts.len();
            attempt.cancel()?;
            return Err(CliError::UnresolvedConflicts(count));
        };

        match resolutions {
            Some(resolutions) => attempt.resolve(resolutions)?,
            None => {
                attempt.cancel()?;
                return Err(CliError::SyncCancelled);
            }
        }
    }

    let pulled = attempt.report().changes_from(Side::Remote).count();
    let pushed = attempt.report().changes_from(Side::Local).count();
    let outcome = orchestrator.finish(attempt, Utc::now()).await?;
    println!("{}", sync_summary(&outcome, &location));
    if pulled + pushed > 0 {
        println!("  {pulled} pulled, {pushed} pushed");
    }
    Ok(())
}

pub fn sync_summary(outcome: &SyncOutcome, location: &str) -> String {
    if outcome.changes_applied == 0 && outcome.conflicts_resolved == 0 {
        format!("Already in sync with {location}")
    } else {
        format!(
            "Synced with {location}: {} change(s) applied, {} conflict(s) resolved",
            outcome.changes_applied, outcome.conflicts_resolved
        )
    }
}

/// Ask for a side per conflict. `None` when the user quits or input ends.
pub fn prompt_resolutions<R: BufRead, W: Write>(
    report: &MergeReport,
    input: &mut R,
    output: &mut W,
) -> Result<Option<Vec<UserResolution>>, CliError> {
    let total = report.conflicts.len();
    let mut resolutions = Vec::with_capacity(total);

    for (index, conflict) in report.conflicts.iter().enumerate() {
        writeln!(output, "Conflict {}/{total}: {}", index + 1, conflict.id())?;
        for line in describe_conflict(conflict) {
            writeln!(output, "  {line}")?;
        }

        let choice = loop {
            write!(output, "Keep [l]ocal or [r]emote, or [q]uit? ")?;
            output.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                return Ok(None);
            }
            let answer = answer.trim();
            if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
                return Ok(None);
            }
            match answer.parse::<Resolution>() {
                Ok(choice) => break choice,
                Err(_) => writeln!(output, "Please answer l, r, or q.")?,
            }
        };
        resolutions.push(UserResolution::new(conflict.id(), choice));
    }

    Ok(Some(resolutions))
}

/// One line per side. A deletion newer than the other side's edit wins
/// whichever side is picked, and is marked so.
pub fn describe_conflict(conflict: &Conflict) -> Vec<String> {
    [Side::Local, Side::Remote]
        .into_iter()
        .map(|side| {
            let version = conflict.version(side);
            let mut line = format!("{:<6}  {}", side.as_str(), describe_entity(version));
            if version.supersedes(conflict.version(side.opposite())) {
                line.push_str("  (newer deletion, kept either way)");
            }
            line
        })
        .collect()
}

pub fn describe_entity(entity: &Entity) -> String {
    let contents = match entity {
        Entity::Deck(deck) => format!("{} items", deck.items.len()),
        Entity::Series(series) => format!("{} levels", series.levels.len()),
    };
    let mut line = format!(
        "{}  {contents}  updated {}",
        entity.name(),
        format_timestamp(entity.updated_at())
    );
    if let Some(deleted_at) = entity.deleted_at() {
        line.push_str(&format!("  deleted {}", format_timestamp(deleted_at)));
    }
    line
}

pub fn format_conflict_lines(report: &MergeReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} conflict(s) need a decision:",
        report.conflicts.len()
    )];
    for conflict in &report.conflicts {
        let (kind, id) = match conflict.id() {
            EntityId::Deck(id) => ("deck", short_id(&id)),
            EntityId::Series(id) => ("series", short_id(&id)),
        };
        lines.push(format!("{kind} {id}"));
        lines.extend(describe_conflict(conflict).into_iter().map(|line| format!("  {line}")));
    }
    lines
}
