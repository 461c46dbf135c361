//! Candidate roster configuration

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StationError, StationResult};

/// One entry on the ballot. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    /// Party code, also used to attribute legacy ledger entries.
    pub party: String,
    pub logo: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Candidate as it appears on the ballot, with its serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotRow {
    pub serial: String,
    #[serde(flatten)]
    pub candidate: Candidate,
}

/// Ordered, validated list of candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRoster {
    candidates: Vec<Candidate>,
}

impl CandidateRoster {
    pub fn new(candidates: Vec<Candidate>) -> StationResult<Self> {
        if candidates.is_empty() {
            return Err(StationError::Config(
                "candidate roster is empty".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut parties = HashSet::new();
        for c in &candidates {
            if c.id.trim().is_empty() {
                return Err(StationError::Config(format!(
                    "candidate '{}' has an empty id",
                    c.name
                )));
            }
            if !ids.insert(c.id.as_str()) {
                return Err(StationError::Config(format!(
                    "duplicate candidate id '{}'",
                    c.id
                )));
            }
            if !parties.insert(c.party.as_str()) {
                return Err(StationError::Config(format!(
                    "duplicate party code '{}'",
                    c.party
                )));
            }
        }

        Ok(Self { candidates })
    }

    /// Load a roster from a JSON array file.
    pub fn load(path: &Path) -> StationResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            StationError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let candidates: Vec<Candidate> = serde_json::from_str(&data).map_err(|e| {
            StationError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        info!(
            "Loaded {} candidates from {}",
            candidates.len(),
            path.display()
        );
        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn by_party(&self, party: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.party == party)
    }

    /// Two-digit ballot serial (position + 1).
    pub fn serial(&self, id: &str) -> Option<String> {
        self.candidates
            .iter()
            .position(|c| c.id == id)
            .map(|idx| format!("{:02}", idx + 1))
    }

    pub fn ballot(&self) -> Vec<BallotRow> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| BallotRow {
                serial: format!("{:02}", idx + 1),
                candidate: c.clone(),
            })
            .collect()
    }
}

impl Default for CandidateRoster {
    fn default() -> Self {
        let entry = |id: &str, name: &str, party: &str, color: &str| Candidate {
            id: id.to_string(),
            name: name.to_string(),
            party: party.to_string(),
            logo: format!("assets/img/party_{}.png", party.to_lowercase()),
            color: color.to_string(),
            style: None,
        };

        Self {
            candidates: vec![
                entry("1", "Indian National Congress", "INC", "#19AAED"),
                entry("2", "Bharatiya Janata Party", "BJP", "#FF9933"),
                entry("3", "Aam Aadmi Party", "AAP", "#0066A4"),
                entry("4", "Independent Alliance", "IND", "#666666"),
                entry("5", "None of the Above (NOTA)", "NOTA", "#333333"),
            ],
        }
    }
}
