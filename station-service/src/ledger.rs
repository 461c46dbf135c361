//! Ledger entries and the in-memory ledger

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidates::CandidateRoster;
use crate::identity::IdentityHash;

/// One recorded vote. Created once at cast time, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(alias = "hash")]
    pub identity_hash: IdentityHash,
    /// Absent only in legacy entries that recorded the party code instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(alias = "ts")]
    pub cast_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(identity_hash: IdentityHash, candidate_id: impl Into<String>) -> Self {
        Self {
            identity_hash,
            candidate_id: Some(candidate_id.into()),
            party: None,
            cast_at: Utc::now(),
        }
    }

    /// Candidate id this entry counts towards. Legacy entries are folded onto
    /// the candidate carrying their party code.
    pub fn resolve_candidate<'a>(&'a self, roster: &'a CandidateRoster) -> Option<&'a str> {
        if let Some(id) = self.candidate_id.as_deref() {
            return Some(id);
        }
        self.party
            .as_deref()
            .and_then(|party| roster.by_party(party))
            .map(|c| c.id.as_str())
    }
}

/// Insertion-ordered ledger with at most one entry per identity hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    index: HashSet<IdentityHash>,
}

/// Returned when appending an identity that already voted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdentity(pub IdentityHash);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an already-merged sequence. Later duplicates are dropped.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let mut ledger = Self::new();
        for entry in entries {
            let _ = ledger.append(entry);
        }
        ledger
    }

    pub fn contains(&self, identity: &IdentityHash) -> bool {
        self.index.contains(identity)
    }

    pub fn append(&mut self, entry: LedgerEntry) -> Result<(), DuplicateIdentity> {
        if !self.index.insert(entry.identity_hash.clone()) {
            return Err(DuplicateIdentity(entry.identity_hash));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
