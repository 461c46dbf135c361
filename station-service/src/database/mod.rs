pub mod constants;
pub mod migrator;
pub mod models;
pub mod operations;
pub mod sql;

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::error::{StationError, StationResult, StoreError};
use crate::ledger::LedgerEntry;
use crate::store::path::{check_store_path, StoreKind};
use crate::store::DurableStore;

pub use migrator::run_migrations;
use models::LedgerRecord;

/// SQLite-backed durable ledger store
#[derive(Debug, Clone)]
pub struct SqliteDurableStore {
    pool: SqlitePool,
}

impl SqliteDurableStore {
    /// Open (creating if needed) the database and run migrations.
    pub async fn open(db_path: &str) -> StationResult<Self> {
        info!("Opening durable store at {:?}", db_path);

        check_store_path(Path::new(db_path), StoreKind::Durable)
            .map_err(|e| StationError::Initialization(e.to_string()))?;

        let pool = Self::connect(db_path)
            .await
            .map_err(|e| StationError::Initialization(e.to_string()))?;

        run_migrations(&pool)
            .await
            .map_err(|e| StationError::Initialization(e.to_string()))?;

        info!("Durable store initialized successfully");
        Ok(Self { pool })
    }

    async fn connect(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
        if db_path == ":memory:" {
            // Every in-memory connection is its own database, so keep exactly one alive.
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            return SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let count = LedgerRecord::count(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl DurableStore for SqliteDurableStore {
    async fn get_all(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let records = LedgerRecord::get_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let identity = record.identity_hash.clone();
            match LedgerEntry::try_from(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping durable record {} with unreadable timestamp: {}",
                    identity.get(0..12).unwrap_or(&identity),
                    e
                ),
            }
        }
        Ok(entries)
    }

    async fn put(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        LedgerRecord::from(entry).upsert(&self.pool).await?;
        Ok(())
    }
}
