//! Events published by the station for observers (UI feedback, tests).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StationEvent {
    /// Paper-trail slip shown for the chosen candidate.
    FeedbackStarted {
        serial: String,
        candidate_id: String,
        name: String,
        party: String,
        logo: String,
    },
    /// Slip dropped, settle phase running.
    FeedbackSettling,
    VoteRecorded {
        ledger_len: usize,
    },
    FastWriteFailed {
        reason: String,
    },
    DurableWriteFailed {
        identity_prefix: String,
        reason: String,
    },
    IntegrityMismatch {
        observed: usize,
        expected: usize,
    },
}
