//! Snapshot repository implementation

use chrono::Utc;
use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::Snapshot;
use crate::storage::SnapshotSlot;

/// Trait for snapshot slot storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SnapshotRepository {
    /// Read the snapshot stored in a slot
    async fn get(&self, slot: SnapshotSlot) -> Result<Option<Snapshot>>;

    /// Write one slot
    async fn put(&self, slot: SnapshotSlot, snapshot: &Snapshot) -> Result<()>;

    /// Write `snapshot` to every slot in one transaction, provided the
    /// current slot still equals `expected_current`
    async fn put_all_if_current(
        &self,
        expected_current: Option<&Snapshot>,
        slots: &[SnapshotSlot],
        snapshot: &Snapshot,
    ) -> Result<()>;
}

/// libSQL implementation of `SnapshotRepository`
pub struct LibSqlSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSnapshotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn upsert(&self, slot: SnapshotSlot, body: &str, snapshot: &Snapshot) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO snapshots
                    (slot, body, snapshot_version, last_modified, saved_at)
                 VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    slot.as_str(),
                    body,
                    i64::from(snapshot.version),
                    snapshot.last_modified.timestamp_millis(),
                    Utc::now().timestamp_millis()
                ],
            )
            .await?;
        Ok(())
    }
}

impl SnapshotRepository for LibSqlSnapshotRepository<'_> {
    async fn get(&self, slot: SnapshotSlot) -> Result<Option<Snapshot>> {
        let mut rows = self
            .conn
            .query("SELECT body FROM snapshots WHERE slot = ?", [slot.as_str()])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let body: String = row.get(0)?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|error| Error::Storage(format!("corrupt {slot} snapshot: {error}")))
    }

    async fn put(&self, slot: SnapshotSlot, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_string(snapshot)?;
        self.upsert(slot, &body, snapshot).await?;
        tracing::debug!("Saved {slot} snapshot ({} bytes)", body.len());
        Ok(())
    }

    async fn put_all_if_current(
        &self,
        expected_current: Option<&Snapshot>,
        slots: &[SnapshotSlot],
        snapshot: &Snapshot,
    ) -> Result<()> {
        let body = serde_json::to_string(snapshot)?;

        // IMMEDIATE holds the write lock across the read and the writes.
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        let current = match self.get(SnapshotSlot::Current).await {
            Ok(current) => current,
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        };
        if current.as_ref() != expected_current {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(Error::LocalChanged);
        }

        for slot in slots {
            if let Err(e) = self.upsert(*slot, &body, snapshot).await {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Deck, Reviewable};
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample() -> Snapshot {
        let now = Utc::now();
        let mut snapshot = Snapshot::empty(now);
        let mut deck = Deck::new("Rust", now);
        deck.items.push(Reviewable::new("borrow checker", "ownership rules", now));
        snapshot.decks.push(deck);
        snapshot
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_slot_returns_none() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        assert!(repo.get(SnapshotSlot::Current).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        let snapshot = sample();

        repo.put(SnapshotSlot::Current, &snapshot).await.unwrap();
        let loaded = repo.get(SnapshotSlot::Current).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(repo.get(SnapshotSlot::Baseline).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_replaces_slot() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        repo.put(SnapshotSlot::Current, &sample()).await.unwrap();

        let replacement = Snapshot::empty(Utc::now());
        repo.put(SnapshotSlot::Current, &replacement).await.unwrap();
        let loaded = repo.get(SnapshotSlot::Current).await.unwrap().unwrap();
        assert_eq!(loaded, replacement);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_all_writes_every_slot() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        let snapshot = sample();

        repo.put_all_if_current(
            None,
            &[SnapshotSlot::Current, SnapshotSlot::Baseline],
            &snapshot,
        )
        .await
        .unwrap();
        assert_eq!(
            repo.get(SnapshotSlot::Current).await.unwrap(),
            repo.get(SnapshotSlot::Baseline).await.unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_all_rejects_changed_current() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        let read_at_start = sample();
        repo.put(SnapshotSlot::Current, &read_at_start).await.unwrap();

        let mut edited = read_at_start.clone();
        edited.decks.push(Deck::new("Added meanwhile", Utc::now()));
        repo.put(SnapshotSlot::Current, &edited).await.unwrap();

        let merged = Snapshot::empty(Utc::now());
        let error = repo
            .put_all_if_current(
                Some(&read_at_start),
                &[SnapshotSlot::Current, SnapshotSlot::Baseline],
                &merged,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, Error::LocalChanged));
        assert_eq!(repo.get(SnapshotSlot::Current).await.unwrap(), Some(edited));
        assert!(repo.get(SnapshotSlot::Baseline).await.unwrap().is_none());

        // The transaction was rolled back, so the connection is usable again.
        repo.put(SnapshotSlot::Baseline, &merged).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_corrupt_body_is_storage_error() {
        let db = setup().await;
        db.connection()
            .execute(
                "INSERT INTO snapshots (slot, body, snapshot_version, last_modified, saved_at)
                 VALUES ('current', 'not json', 1, 0, 0)",
                (),
            )
            .await
            .unwrap();

        let repo = LibSqlSnapshotRepository::new(db.connection());
        let error = repo.get(SnapshotSlot::Current).await.unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
    }
}
