use anyhow::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use super::models::LedgerRecord;
use super::sql::{SELECT_LEDGER_ENTRIES_SQL, UPSERT_LEDGER_ENTRY_SQL};

/// Database operations for ledger records
impl LedgerRecord {
    /// Insert or overwrite the record for this identity hash.
    pub async fn upsert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        debug!(
            "Upserting ledger record {}",
            self.identity_hash.get(0..12).unwrap_or(&self.identity_hash)
        );

        sqlx::query(UPSERT_LEDGER_ENTRY_SQL)
            .bind(&self.identity_hash)
            .bind(&self.candidate_id)
            .bind(&self.party)
            .bind(&self.cast_at)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// All records ordered by cast time, then identity hash.
    pub async fn get_all(pool: &SqlitePool) -> Result<Vec<LedgerRecord>, sqlx::Error> {
        let rows = sqlx::query(SELECT_LEDGER_ENTRIES_SQL)
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(pool)
            .await
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerRecord {
            identity_hash: row.try_get("identity_hash")?,
            candidate_id: row.try_get("candidate_id")?,
            party: row.try_get("party")?,
            cast_at: row.try_get("cast_at")?,
        })
    }
}

/// Whether a table exists in the connected database.
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}
