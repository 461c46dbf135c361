//! Durable store schema constants

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Migration descriptions, indexed by version - 1
pub const MIGRATION_DESCRIPTIONS: &[&str] = &["Ledger entries keyed by identity hash"];

/// Default durable store file
pub const DEFAULT_DB_PATH: &str = "station.db";
