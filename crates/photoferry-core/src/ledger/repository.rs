//! Durable dedup ledger storage.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::model::{ContentFingerprint, LedgerEntry};
use crate::Result;

/// Durable record of previously uploaded content fingerprints.
///
/// Backed by sqlite so the at-most-once upload guarantee survives process
/// restarts and mid-run crashes. Entries are append-only: nothing in this
/// system deletes them.
pub struct DedupLedger {
    pool: SqlitePool,
}

impl DedupLedger {
    /// Opens (or creates) the ledger at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation
    /// fails. Callers treat this as fatal: without the ledger the run cannot
    /// guarantee at-most-once upload.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let ledger = Self { pool };
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Creates an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation
    /// fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let ledger = Self { pool };
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                fingerprint TEXT PRIMARY KEY,
                uploaded_at TEXT NOT NULL,
                remote_handle TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Checks whether a fingerprint has never been uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_new(&self, fingerprint: &ContentFingerprint) -> Result<bool> {
        let row = sqlx::query(r"SELECT COUNT(*) as count FROM ledger_entries WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(count == 0)
    }

    /// Records a confirmed upload.
    ///
    /// Called only after the remote service confirmed both upload and album
    /// association. A concurrent duplicate insert is a no-op: the first
    /// confirmation wins and the entry is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn record(
        &self,
        fingerprint: &ContentFingerprint,
        uploaded_at: DateTime<Utc>,
        remote_handle: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO ledger_entries (fingerprint, uploaded_at, remote_handle)
            VALUES (?, ?, ?)
            ON CONFLICT(fingerprint) DO NOTHING
            ",
        )
        .bind(fingerprint.as_str())
        .bind(uploaded_at.to_rfc3339())
        .bind(remote_handle)
        .execute(&self.pool)
        .await?;

        debug!(%fingerprint, remote_handle, "Recorded upload in ledger");
        Ok(())
    }

    /// Looks up the entry for a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn entry(&self, fingerprint: &ContentFingerprint) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            r"
            SELECT fingerprint, uploaded_at, remote_handle
            FROM ledger_entries
            WHERE fingerprint = ?
            ",
        )
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let entry = row.and_then(|row| {
            let uploaded_at_str: String = row.get("uploaded_at");
            let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at_str)
                .ok()?
                .with_timezone(&Utc);

            Some(LedgerEntry {
                fingerprint: ContentFingerprint::from_stored(row.get("fingerprint")),
                uploaded_at,
                remote_handle: row.get("remote_handle"),
            })
        });

        Ok(entry)
    }

    /// Number of recorded uploads.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn len(&self) -> Result<u64> {
        let row = sqlx::query(r"SELECT COUNT(*) as count FROM ledger_entries")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(count.unsigned_abs())
    }

    /// Whether the ledger has no recorded uploads.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
