use rusqlite::OptionalExtension;
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;

/// Raw row of the `cache_slots` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRow {
    pub key: String,
    pub payload: String,
    /// Epoch milliseconds.
    pub written_at: i64,
}

/// Untyped key/value access to cache slots.
#[derive(Clone)]
pub struct SlotRepo {
    db: Database,
}

impl SlotRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> Result<Option<SlotRow>, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT key, payload, written_at FROM cache_slots WHERE key = ?1",
                [key],
                |row| {
                    Ok(SlotRow {
                        key: row.get(0)?,
                        payload: row.get(1)?,
                        written_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    #[instrument(skip(self, payload))]
    pub fn put(&self, key: &str, payload: &str, written_at: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cache_slots (key, payload, written_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, written_at = excluded.written_at",
                rusqlite::params![key, payload, written_at],
            )?;
            Ok(())
        })
    }

    /// Returns whether a row was removed.
    #[instrument(skip(self))]
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM cache_slots WHERE key = ?1", [key])?;
            Ok(n > 0)
        })
    }
}
