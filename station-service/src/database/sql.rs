//! SQL statement constants for the durable ledger store

pub const CREATE_MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT NOT NULL
)
"#;

pub const CREATE_LEDGER_ENTRIES_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    identity_hash TEXT PRIMARY KEY NOT NULL,
    candidate_id TEXT, -- null for legacy party-coded entries
    party TEXT,
    cast_at TEXT NOT NULL
)
"#;

pub const CREATE_DB_INDEXES: &[&str] =
    &["CREATE INDEX IF NOT EXISTS idx_ledger_cast_at ON ledger_entries(cast_at)"];

pub const UPSERT_LEDGER_ENTRY_SQL: &str = r#"
INSERT OR REPLACE INTO ledger_entries (identity_hash, candidate_id, party, cast_at)
VALUES (?, ?, ?, ?)
"#;

pub const SELECT_LEDGER_ENTRIES_SQL: &str =
    "SELECT identity_hash, candidate_id, party, cast_at FROM ledger_entries \
     ORDER BY cast_at, identity_hash";
