//! Snapshot export and import shared by all front ends.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Snapshot, SNAPSHOT_SCHEMA_VERSION};

/// Render a snapshot as pretty-printed JSON with camelCase keys.
pub fn export_snapshot(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse and validate an exported snapshot.
///
/// The schema version is checked before the typed parse so an export from a
/// newer release fails with a clear message instead of a field error.
pub fn import_snapshot(raw: &str) -> Result<Snapshot> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|error| Error::Validation(format!("snapshot is not valid JSON: {error}")))?;

    match value.get("version").and_then(Value::as_u64) {
        Some(version) if version == u64::from(SNAPSHOT_SCHEMA_VERSION) => {}
        Some(version) => {
            return Err(Error::Validation(format!(
                "unsupported snapshot version {version} (expected {SNAPSHOT_SCHEMA_VERSION})"
            )));
        }
        None => {
            return Err(Error::Validation(
                "snapshot is missing its version".to_string(),
            ));
        }
    }

    let snapshot: Snapshot = serde_json::from_value(value)
        .map_err(|error| Error::Validation(format!("malformed snapshot: {error}")))?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(timestamp_ms: i64) -> String {
    format!("cadence-export-{timestamp_ms}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StudyConfig;
    use crate::models::{Deck, Rating, Reviewable};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn populated() -> Snapshot {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 18, 45, 12).unwrap()
            + Duration::milliseconds(321);
        let mut snapshot = Snapshot::empty(now);
        let mut deck = Deck::new("Physics", now);
        deck.description = Some("Mechanics".to_string());
        let mut item = Reviewable::new("F = ?", "m * a", now);
        item.extra
            .insert("source".to_string(), serde_json::json!({"page": 12}));
        item.tags.insert("formula".to_string());
        deck.items.push(item);
        let item_id = deck.items[0].id;
        snapshot.decks.push(deck);

        let (snapshot, _) = crate::collection::record_review(
            &snapshot,
            &item_id,
            Some(Rating::Hard),
            &StudyConfig::default(),
            now + Duration::minutes(3),
        )
        .unwrap();
        snapshot
    }

    #[test]
    fn export_import_roundtrip_is_identical() {
        let snapshot = populated();
        let exported = export_snapshot(&snapshot).unwrap();
        let imported = import_snapshot(&exported).unwrap();

        assert_eq!(imported, snapshot);
        assert_eq!(export_snapshot(&imported).unwrap(), exported);
    }

    #[test]
    fn export_uses_camel_case_schema() {
        let exported = export_snapshot(&populated()).unwrap();
        assert!(exported.contains("\"deckSeries\""));
        assert!(exported.contains("\"lastModified\""));
        assert!(exported.contains("\"easeFactor\""));
    }

    #[test]
    fn import_rejects_other_versions() {
        let error = import_snapshot(r#"{"version": 9, "lastModified": "2026-01-01T00:00:00Z"}"#)
            .unwrap_err();
        assert!(error.to_string().contains("unsupported snapshot version 9"));

        let error = import_snapshot(r#"{"decks": []}"#).unwrap_err();
        assert!(error.to_string().contains("missing its version"));
    }

    #[test]
    fn import_rejects_out_of_range_values() {
        let mut snapshot = populated();
        snapshot.decks[0].items[0].ease_factor = 0.9;
        let raw = serde_json::to_string(&snapshot).unwrap();
        assert!(matches!(import_snapshot(&raw), Err(Error::Validation(_))));
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(matches!(import_snapshot("not json"), Err(Error::Validation(_))));
    }

    #[test]
    fn suggested_export_file_name_is_stable() {
        assert_eq!(
            suggested_export_file_name(1_700_000_000_000),
            "cadence-export-1700000000000.json"
        );
    }
}
