use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityHash;
use crate::ledger::LedgerEntry;

/// Ledger entry row in the durable store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub identity_hash: String,
    pub candidate_id: Option<String>,
    pub party: Option<String>,
    pub cast_at: String, // RFC 3339 UTC timestamp
}

impl From<&LedgerEntry> for LedgerRecord {
    fn from(entry: &LedgerEntry) -> Self {
        LedgerRecord {
            identity_hash: entry.identity_hash.as_str().to_string(),
            candidate_id: entry.candidate_id.clone(),
            party: entry.party.clone(),
            cast_at: entry.cast_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }
}

impl TryFrom<LedgerRecord> for LedgerEntry {
    type Error = chrono::ParseError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        let cast_at = DateTime::parse_from_rfc3339(&record.cast_at)?.with_timezone(&Utc);
        Ok(LedgerEntry {
            identity_hash: IdentityHash::new(record.identity_hash),
            candidate_id: record.candidate_id,
            party: record.party,
            cast_at,
        })
    }
}
