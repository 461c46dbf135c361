//! Ledger size integrity check

use serde::Serialize;
use tracing::warn;

/// Result of comparing the reconciled ledger with the last recorded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Startup check has not run yet.
    Unchecked,
    Clean { observed: usize, expected: usize },
    /// Entries counted in an earlier session are missing. Advisory only.
    Mismatch { observed: usize, expected: usize },
}

impl IntegrityStatus {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, IntegrityStatus::Mismatch { .. })
    }

    /// Banner text for the operator screen, if any.
    pub fn banner(&self) -> Option<String> {
        match self {
            IntegrityStatus::Mismatch { observed, expected } => Some(format!(
                "Integrity mismatch: register holds {} entries but {} were recorded earlier",
                observed, expected
            )),
            _ => None,
        }
    }
}

/// Flag a mismatch when the ledger is smaller than `expected`. Never repairs.
pub fn check(ledger_len: usize, expected: usize) -> IntegrityStatus {
    if ledger_len < expected {
        warn!(
            observed = ledger_len,
            expected, "Ledger is smaller than previously recorded, possible data loss"
        );
        IntegrityStatus::Mismatch {
            observed: ledger_len,
            expected,
        }
    } else {
        IntegrityStatus::Clean {
            observed: ledger_len,
            expected,
        }
    }
}
