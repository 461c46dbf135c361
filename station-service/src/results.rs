//! Per-candidate vote counts

use serde::Serialize;

use crate::candidates::CandidateRoster;
use crate::ledger::LedgerEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTally {
    pub candidate_id: String,
    pub serial: String,
    pub name: String,
    pub party: String,
    pub color: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsSummary {
    pub total_votes: u64,
    /// In roster order.
    pub tallies: Vec<CandidateTally>,
    /// Entries whose choice matches no candidate on the roster.
    pub unattributed: u64,
}

impl ResultsSummary {
    pub fn votes_for(&self, candidate_id: &str) -> Option<u64> {
        self.tallies
            .iter()
            .find(|t| t.candidate_id == candidate_id)
            .map(|t| t.votes)
    }
}

/// Count ledger entries per candidate. Pure; legacy party-coded entries are
/// folded onto the candidate with that party code.
pub fn aggregate(entries: &[LedgerEntry], roster: &CandidateRoster) -> ResultsSummary {
    let mut tallies: Vec<CandidateTally> = roster
        .candidates()
        .iter()
        .enumerate()
        .map(|(idx, c)| CandidateTally {
            candidate_id: c.id.clone(),
            serial: format!("{:02}", idx + 1),
            name: c.name.clone(),
            party: c.party.clone(),
            color: c.color.clone(),
            votes: 0,
        })
        .collect();

    let mut unattributed = 0;
    for entry in entries {
        let slot = entry
            .resolve_candidate(roster)
            .and_then(|id| tallies.iter_mut().find(|t| t.candidate_id == id));
        match slot {
            Some(tally) => tally.votes += 1,
            None => unattributed += 1,
        }
    }

    ResultsSummary {
        total_votes: entries.len() as u64,
        tallies,
        unattributed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityHash;

    fn vote(hash: &str, candidate: &str) -> LedgerEntry {
        LedgerEntry::new(IdentityHash::new(hash), candidate)
    }

    fn legacy(hash: &str, party: &str) -> LedgerEntry {
        let mut entry = LedgerEntry::new(IdentityHash::new(hash), "");
        entry.candidate_id = None;
        entry.party = Some(party.to_string());
        entry
    }

    #[test]
    fn test_empty_ledger_all_zero() {
        let roster = CandidateRoster::default();
        let summary = aggregate(&[], &roster);
        assert_eq!(summary.total_votes, 0);
        assert_eq!(summary.tallies.len(), 5);
        assert!(summary.tallies.iter().all(|t| t.votes == 0));
    }

    #[test]
    fn test_counts_per_candidate() {
        let roster = CandidateRoster::default();
        let ledger = vec![vote("a", "2"), vote("b", "2"), vote("c", "5")];
        let summary = aggregate(&ledger, &roster);

        assert_eq!(summary.total_votes, 3);
        assert_eq!(summary.votes_for("2"), Some(2));
        assert_eq!(summary.votes_for("5"), Some(1));
        assert_eq!(summary.votes_for("1"), Some(0));
        assert_eq!(summary.tallies[1].serial, "02");
        assert_eq!(summary.unattributed, 0);
    }

    #[test]
    fn test_legacy_entries_fold_by_party() {
        let roster = CandidateRoster::default();
        let ledger = vec![vote("a", "1"), legacy("b", "INC"), legacy("c", "???")];
        let summary = aggregate(&ledger, &roster);

        assert_eq!(summary.votes_for("1"), Some(2));
        assert_eq!(summary.unattributed, 1);
        assert_eq!(summary.total_votes, 3);
    }

    #[test]
    fn test_unknown_candidate_is_unattributed() {
        let roster = CandidateRoster::default();
        let summary = aggregate(&[vote("a", "99")], &roster);
        assert_eq!(summary.unattributed, 1);
        assert!(summary.tallies.iter().all(|t| t.votes == 0));
    }
}
