//! Startup reconciliation of the fast and durable stores.
//!
//! The sequence is:
//! 1. Load the fast-store ledger as the baseline (it defines the ordering).
//! 2. Upsert every baseline entry into the durable store, repairing records
//!    the durable store lost.
//! 3. Read back the full durable store.
//! 4. Append each durable entry whose identity hash is not in the baseline.
//! 5. Write the merged ledger back to the fast store.
//!
//! Baseline entries always win on divergence. The merge is a union keyed by
//! identity hash, so running it again over the same stores is a no-op.
//!
//! Failures never abort startup: an unreadable baseline starts empty, an
//! unreachable durable store leaves the baseline as the ledger. Step 5 relies
//! on the fast store keeping any blob it could not decode before replacing it,
//! so starting empty never destroys the votes that failed to load.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::identity::IdentityHash;
use crate::ledger::{Ledger, LedgerEntry};
use crate::store::{DurableStore, FastStore};

/// Outcome of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub ledger: Ledger,
    /// Entries taken from the fast store.
    pub baseline_len: usize,
    /// Entries only the durable store knew about.
    pub recovered_from_durable: usize,
    /// Baseline entries the durable store failed to accept.
    pub durable_repair_failures: usize,
    pub durable_available: bool,
    /// The fast store could not be read at all and the baseline started empty.
    pub baseline_unreadable: bool,
    pub fast_write_failed: bool,
}

/// Union of `baseline` and `durable` keyed by identity hash, baseline first.
///
/// Duplicate hashes inside `baseline` keep their first occurrence; durable
/// entries are appended in the order given, skipping every hash already seen.
pub fn merge_ledgers(baseline: Vec<LedgerEntry>, durable: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    let mut seen: HashSet<IdentityHash> = HashSet::with_capacity(baseline.len() + durable.len());
    let mut merged = Vec::with_capacity(baseline.len() + durable.len());

    for entry in baseline.into_iter().chain(durable) {
        if seen.insert(entry.identity_hash.clone()) {
            merged.push(entry);
        }
    }

    merged
}

/// Run the five-step reconciliation against the two stores.
pub async fn reconcile(fast: &dyn FastStore, durable: Option<&dyn DurableStore>) -> ReconcileReport {
    // step 1: baseline
    let (baseline, baseline_unreadable) = match fast.load_ledger().await {
        Ok(entries) => (entries, false),
        Err(e) => {
            warn!("Fast store ledger unreadable, starting from an empty baseline: {e}");
            (Vec::new(), true)
        }
    };
    let baseline = Ledger::from_entries(baseline).entries().to_vec();
    let baseline_len = baseline.len();

    let mut durable_repair_failures = 0;
    let mut durable_available = false;
    let mut durable_entries = Vec::new();

    if let Some(durable) = durable {
        // step 2: repair durable from baseline
        for entry in &baseline {
            if let Err(e) = durable.put(entry).await {
                durable_repair_failures += 1;
                warn!(
                    identity = entry.identity_hash.short(),
                    "Durable store repair write failed: {e}"
                );
            }
        }

        // step 3: read back
        match durable.get_all().await {
            Ok(entries) => {
                durable_available = true;
                durable_entries = entries;
            }
            Err(e) => warn!("Durable store read failed, using fast store only: {e}"),
        }
    } else {
        info!("No durable store attached, reconciling from fast store only");
    }

    // step 4: merge
    let merged = merge_ledgers(baseline, durable_entries);
    let recovered_from_durable = merged.len() - baseline_len;

    // step 5: persist merged ledger back to the fast store
    let fast_write_failed = match fast.save_ledger(&merged).await {
        Ok(()) => false,
        Err(e) => {
            warn!("Failed to write merged ledger to fast store: {e}");
            true
        }
    };

    info!(
        baseline = baseline_len,
        recovered = recovered_from_durable,
        total = merged.len(),
        "Ledger reconciled"
    );

    ReconcileReport {
        ledger: Ledger::from_entries(merged),
        baseline_len,
        recovered_from_durable,
        durable_repair_failures,
        durable_available,
        baseline_unreadable,
        fast_write_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fast::{DAMAGED_LEDGER_PREFIX, LEDGER_KEY};
    use crate::store::{FileFastStore, MemoryDurableStore, MemoryFastStore};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn entry(hash: &str, candidate: &str) -> LedgerEntry {
        LedgerEntry::new(IdentityHash::new(hash), candidate)
    }

    fn hashes(entries: &[LedgerEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.identity_hash.as_str()).collect()
    }

    #[test]
    fn test_merge_union_baseline_wins() {
        let a = entry("A", "1");
        let b_fast = entry("B", "2");
        let b_durable = entry("B", "3");
        let c = entry("C", "4");

        let merged = merge_ledgers(vec![a.clone(), b_fast.clone()], vec![b_durable, c.clone()]);
        assert_eq!(merged, vec![a, b_fast, c]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fast = vec![entry("A", "1"), entry("B", "2")];
        let durable = vec![entry("B", "3"), entry("C", "4")];

        let once = merge_ledgers(fast.clone(), durable.clone());
        let twice = merge_ledgers(once.clone(), durable);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_drops_duplicates_within_baseline() {
        let merged = merge_ledgers(vec![entry("A", "1"), entry("A", "2")], vec![]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].candidate_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_merge_empty_inputs() {
        assert!(merge_ledgers(vec![], vec![]).is_empty());
        assert_eq!(hashes(&merge_ledgers(vec![], vec![entry("X", "1")])), vec!["X"]);
    }

    #[tokio::test]
    async fn test_reconcile_union_law() {
        let b_fast = entry("B", "2");
        let fast = MemoryFastStore::with_state(vec![entry("A", "1"), b_fast.clone()], 2);
        let durable = MemoryDurableStore::with_entries(vec![entry("B", "5"), entry("C", "3")]);

        let report = reconcile(&fast, Some(&durable)).await;
        assert_eq!(hashes(report.ledger.entries()), vec!["A", "B", "C"]);
        assert_eq!(report.ledger.entries()[1], b_fast);
        assert_eq!(report.baseline_len, 2);
        assert_eq!(report.recovered_from_durable, 1);
        assert!(report.durable_available);

        // Both stores now hold the union; durable B was repaired to the fast version
        assert_eq!(hashes(&fast.entries()), vec!["A", "B", "C"]);
        assert_eq!(durable.len(), 3);
        assert_eq!(
            durable.get(&IdentityHash::new("B")).unwrap().candidate_id.as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_stable() {
        let fast = MemoryFastStore::with_state(vec![entry("A", "1"), entry("B", "2")], 2);
        let durable = MemoryDurableStore::with_entries(vec![entry("B", "3"), entry("C", "4")]);

        let first = reconcile(&fast, Some(&durable)).await;
        let second = reconcile(&fast, Some(&durable)).await;
        assert_eq!(first.ledger, second.ledger);
        assert_eq!(second.recovered_from_durable, 0);
    }

    #[tokio::test]
    async fn test_reconcile_without_durable_store() {
        let fast = MemoryFastStore::with_state(vec![entry("A", "1")], 1);
        let report = reconcile(&fast, None).await;
        assert_eq!(report.ledger.len(), 1);
        assert!(!report.durable_available);
    }

    #[tokio::test]
    async fn test_reconcile_survives_durable_failures() {
        let fast = MemoryFastStore::with_state(vec![entry("A", "1")], 1);
        let durable = MemoryDurableStore::new();
        durable.set_fail_writes(true);
        durable.set_fail_reads(true);

        let report = reconcile(&fast, Some(&durable)).await;
        assert_eq!(hashes(report.ledger.entries()), vec!["A"]);
        assert_eq!(report.durable_repair_failures, 1);
        assert!(!report.durable_available);
    }

    #[tokio::test]
    async fn test_reconcile_restores_lost_fast_store() {
        let fast = MemoryFastStore::new();
        let durable = MemoryDurableStore::with_entries(vec![entry("A", "1"), entry("B", "2")]);

        let report = reconcile(&fast, Some(&durable)).await;
        assert_eq!(report.ledger.len(), 2);
        assert_eq!(report.recovered_from_durable, 2);
        assert_eq!(fast.entries().len(), 2);
    }

    fn write_fast_file(path: &Path, ledger_blob: &str) {
        let file = BTreeMap::from([(LEDGER_KEY, ledger_blob)]);
        std::fs::write(path, serde_json::to_string(&file).unwrap()).unwrap();
    }

    fn damaged_blobs(path: &Path) -> Vec<String> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        raw.into_iter()
            .filter(|(k, _)| k.starts_with(DAMAGED_LEDGER_PREFIX))
            .map(|(_, v)| v)
            .collect()
    }

    #[tokio::test]
    async fn test_reconcile_keeps_readable_entries_of_damaged_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        let blob = r#"[{"identityHash":"aaa","candidateId":"1","castAt":"2024-05-01T10:00:00Z"},{"identityHash":"bbb","candidateId":"2"}]"#;
        write_fast_file(&path, blob);

        let fast = FileFastStore::open(&path).await.unwrap();
        let durable = MemoryDurableStore::with_entries(vec![entry("ccc", "3")]);
        let report = reconcile(&fast, Some(&durable)).await;

        assert!(!report.baseline_unreadable);
        assert_eq!(hashes(report.ledger.entries()), vec!["aaa", "ccc"]);
        assert_eq!(hashes(&fast.load_ledger().await.unwrap()), vec!["aaa", "ccc"]);
        assert!(durable.get(&IdentityHash::new("aaa")).is_some());
        // The entry that could not be decoded is still on disk
        assert_eq!(damaged_blobs(&path), vec![blob.to_string()]);
    }

    #[tokio::test]
    async fn test_reconcile_never_discards_unreadable_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.json");
        write_fast_file(&path, r#"{"identityHash":"aaa"#);

        let fast = FileFastStore::open(&path).await.unwrap();
        let durable = MemoryDurableStore::with_entries(vec![entry("bbb", "2")]);
        let report = reconcile(&fast, Some(&durable)).await;

        assert!(report.baseline_unreadable);
        assert!(!report.fast_write_failed);
        assert_eq!(hashes(report.ledger.entries()), vec!["bbb"]);
        assert_eq!(damaged_blobs(&path), vec![r#"{"identityHash":"aaa"#.to_string()]);

        // A second run finds a clean blob and sets nothing else aside
        let again = reconcile(&fast, Some(&durable)).await;
        assert!(!again.baseline_unreadable);
        assert_eq!(damaged_blobs(&path).len(), 1);
    }
}
