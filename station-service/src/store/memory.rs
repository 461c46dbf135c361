//! In-memory store adapters with injectable failures

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::identity::IdentityHash;
use crate::ledger::LedgerEntry;
use crate::store::{DurableStore, FastStore};

#[derive(Debug, Default)]
pub struct MemoryFastStore {
    ledger: Mutex<Vec<LedgerEntry>>,
    expected: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(entries: Vec<LedgerEntry>, expected: usize) -> Self {
        Self {
            ledger: Mutex::new(entries),
            expected: AtomicUsize::new(expected),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.ledger.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("fast store write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn load_ledger(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| StoreError::Unavailable("fast store lock poisoned".to_string()))?;
        Ok(ledger.clone())
    }

    async fn save_ledger(&self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| StoreError::Unavailable("fast store lock poisoned".to_string()))?;
        *ledger = entries.to_vec();
        Ok(())
    }

    async fn load_expected_count(&self) -> Result<usize, StoreError> {
        Ok(self.expected.load(Ordering::SeqCst))
    }

    async fn save_expected_count(&self, count: usize) -> Result<(), StoreError> {
        self.check_writable()?;
        self.expected.store(count, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    records: Mutex<BTreeMap<IdentityHash, LedgerEntry>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        let records = entries
            .into_iter()
            .map(|e| (e.identity_hash.clone(), e))
            .collect();
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, identity: &IdentityHash) -> Option<LedgerEntry> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(identity).cloned())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn get_all(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("durable store read rejected".to_string()));
        }
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("durable store lock poisoned".to_string()))?;
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("durable store write rejected".to_string()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("durable store lock poisoned".to_string()))?;
        records.insert(entry.identity_hash.clone(), entry.clone());
        Ok(())
    }
}
