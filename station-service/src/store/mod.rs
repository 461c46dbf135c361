//! Persistence adapters.
//!
//! The station keeps the same ledger in two independent stores with no
//! shared transaction:
//!
//! - the fast store holds the whole ledger as one JSON blob plus the expected
//!   entry count, and is the primary read path;
//! - the durable store holds one record per identity hash and is a
//!   best-effort backup, repaired on the next reconciliation.

pub mod fast;
pub mod memory;
pub mod path;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ledger::LedgerEntry;

pub use fast::FileFastStore;
pub use memory::{MemoryDurableStore, MemoryFastStore};

/// Blob store holding the full ledger sequence and the expected count.
#[async_trait]
pub trait FastStore: Send + Sync {
    /// The stored ledger, in stored order. Empty when nothing was written yet.
    /// Entries that fail to decode are skipped; only an undecodable blob is an
    /// error.
    async fn load_ledger(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Replace the stored ledger with `entries`. A stored ledger that did not
    /// decode must be kept somewhere rather than overwritten.
    async fn save_ledger(&self, entries: &[LedgerEntry]) -> Result<(), StoreError>;

    /// Previously recorded ledger size, 0 when never written.
    async fn load_expected_count(&self) -> Result<usize, StoreError>;

    async fn save_expected_count(&self, count: usize) -> Result<(), StoreError>;
}

/// Record store keyed by identity hash.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Upsert by identity hash. Never fails on an existing key.
    async fn put(&self, entry: &LedgerEntry) -> Result<(), StoreError>;
}
