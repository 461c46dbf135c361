//! Vote session state machine.
//!
//! Pure transition table, no I/O. The [`crate::station::Station`] drives it
//! around the suspending steps (hashing, feedback delays, store writes).
//!
//! ```text
//! LoggedOut -> Authenticating -> AlreadyVoted
//!                             -> BallotOpen <-> Confirming -> Casting -> Recording -> Recorded
//! LoggedOut -> ShowingResults           Recorded -> ShowingResults
//! ```
//!
//! `Casting` and `Recording` form the cast guard: while in either, every
//! ballot action is rejected with [`TransitionError::CastInProgress`] and
//! reset is refused.

use serde::Serialize;

use crate::error::TransitionError;
use crate::identity::IdentityHash;
use crate::ledger::LedgerEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteState {
    LoggedOut,
    Authenticating,
    AlreadyVoted {
        identity: IdentityHash,
    },
    BallotOpen {
        identity: IdentityHash,
    },
    Confirming {
        identity: IdentityHash,
        candidate_id: String,
    },
    Casting {
        identity: IdentityHash,
        candidate_id: String,
    },
    Recording {
        identity: IdentityHash,
        candidate_id: String,
    },
    Recorded {
        entry: LedgerEntry,
    },
    ShowingResults {
        identity: Option<IdentityHash>,
    },
}

impl VoteState {
    pub fn name(&self) -> &'static str {
        match self {
            VoteState::LoggedOut => "logged_out",
            VoteState::Authenticating => "authenticating",
            VoteState::AlreadyVoted { .. } => "already_voted",
            VoteState::BallotOpen { .. } => "ballot_open",
            VoteState::Confirming { .. } => "confirming",
            VoteState::Casting { .. } => "casting",
            VoteState::Recording { .. } => "recording",
            VoteState::Recorded { .. } => "recorded",
            VoteState::ShowingResults { .. } => "showing_results",
        }
    }

    pub fn identity(&self) -> Option<&IdentityHash> {
        match self {
            VoteState::LoggedOut | VoteState::Authenticating => None,
            VoteState::AlreadyVoted { identity }
            | VoteState::BallotOpen { identity }
            | VoteState::Confirming { identity, .. }
            | VoteState::Casting { identity, .. }
            | VoteState::Recording { identity, .. } => Some(identity),
            VoteState::Recorded { entry } => Some(&entry.identity_hash),
            VoteState::ShowingResults { identity } => identity.as_ref(),
        }
    }

    pub fn is_cast_in_progress(&self) -> bool {
        matches!(self, VoteState::Casting { .. } | VoteState::Recording { .. })
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteEvent {
    LoginStarted,
    Authenticated {
        identity: IdentityHash,
        already_voted: bool,
    },
    AuthenticationFailed,
    CandidateSelected {
        candidate_id: String,
    },
    CastCancelled,
    CastConfirmed,
    FeedbackFinished,
    VoteRecorded {
        entry: LedgerEntry,
    },
    /// The cast could not be committed. Leaves the cast guard without a
    /// recorded entry.
    CastAborted {
        already_voted: bool,
    },
    ResultsShown,
    Reset,
}

impl VoteEvent {
    fn action(&self) -> &'static str {
        match self {
            VoteEvent::LoginStarted => "log in",
            VoteEvent::Authenticated { .. } => "authenticate",
            VoteEvent::AuthenticationFailed => "fail authentication",
            VoteEvent::CandidateSelected { .. } => "select a candidate",
            VoteEvent::CastCancelled => "cancel the cast",
            VoteEvent::CastConfirmed => "confirm the cast",
            VoteEvent::FeedbackFinished => "finish feedback",
            VoteEvent::VoteRecorded { .. } => "record the vote",
            VoteEvent::CastAborted { .. } => "abort the cast",
            VoteEvent::ResultsShown => "show results",
            VoteEvent::Reset => "reset",
        }
    }

    fn is_ballot_action(&self) -> bool {
        matches!(
            self,
            VoteEvent::CandidateSelected { .. }
                | VoteEvent::CastConfirmed
                | VoteEvent::CastCancelled
                | VoteEvent::LoginStarted
                | VoteEvent::Reset
                | VoteEvent::ResultsShown
        )
    }
}

/// Serializable view of the current state for the UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    pub cast_in_progress: bool,
    pub ballot_enabled: bool,
}

impl From<&VoteState> for StateView {
    fn from(state: &VoteState) -> Self {
        let candidate_id = match state {
            VoteState::Confirming { candidate_id, .. }
            | VoteState::Casting { candidate_id, .. }
            | VoteState::Recording { candidate_id, .. } => Some(candidate_id.clone()),
            VoteState::Recorded { entry } => entry.candidate_id.clone(),
            _ => None,
        };
        StateView {
            state: state.name(),
            identity_prefix: state.identity().map(|i| i.short().to_string()),
            candidate_id,
            cast_in_progress: state.is_cast_in_progress(),
            ballot_enabled: matches!(state, VoteState::BallotOpen { .. }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteMachine {
    state: VoteState,
}

impl Default for VoteMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteMachine {
    pub fn new() -> Self {
        Self {
            state: VoteState::LoggedOut,
        }
    }

    pub fn state(&self) -> &VoteState {
        &self.state
    }

    pub fn view(&self) -> StateView {
        StateView::from(&self.state)
    }

    /// Apply `event`. On error the state is left untouched.
    pub fn apply(&mut self, event: VoteEvent) -> Result<&VoteState, TransitionError> {
        use VoteEvent as E;
        use VoteState as S;

        if self.state.is_cast_in_progress() && event.is_ballot_action() {
            return Err(TransitionError::CastInProgress);
        }

        let next = match (&self.state, event) {
            (S::LoggedOut, E::LoginStarted) => S::Authenticating,
            (S::LoggedOut, E::ResultsShown) => S::ShowingResults { identity: None },

            (S::Authenticating, E::AuthenticationFailed) => S::LoggedOut,
            (
                S::Authenticating,
                E::Authenticated {
                    identity,
                    already_voted,
                },
            ) => {
                if already_voted {
                    S::AlreadyVoted { identity }
                } else {
                    S::BallotOpen { identity }
                }
            }

            (S::BallotOpen { identity }, E::CandidateSelected { candidate_id }) => S::Confirming {
                identity: identity.clone(),
                candidate_id,
            },

            (S::Confirming { identity, .. }, E::CastCancelled) => S::BallotOpen {
                identity: identity.clone(),
            },
            (
                S::Confirming {
                    identity,
                    candidate_id,
                },
                E::CastConfirmed,
            ) => S::Casting {
                identity: identity.clone(),
                candidate_id: candidate_id.clone(),
            },

            (
                S::Casting {
                    identity,
                    candidate_id,
                },
                E::FeedbackFinished,
            ) => S::Recording {
                identity: identity.clone(),
                candidate_id: candidate_id.clone(),
            },
            (S::Recording { identity, .. }, E::VoteRecorded { entry })
                if entry.identity_hash == *identity =>
            {
                S::Recorded { entry }
            }
            (
                S::Casting { identity, .. } | S::Recording { identity, .. },
                E::CastAborted { already_voted },
            ) => {
                if already_voted {
                    S::AlreadyVoted {
                        identity: identity.clone(),
                    }
                } else {
                    S::BallotOpen {
                        identity: identity.clone(),
                    }
                }
            }

            (S::Recorded { entry }, E::ResultsShown) => S::ShowingResults {
                identity: Some(entry.identity_hash.clone()),
            },
            (S::AlreadyVoted { identity }, E::ResultsShown) => S::ShowingResults {
                identity: Some(identity.clone()),
            },

            // Reset is accepted everywhere outside the cast guard, except
            // mid-authentication where the login call still owns the state.
            (S::Authenticating, E::Reset) => {
                return Err(self.invalid(&E::Reset));
            }
            (_, E::Reset) => S::LoggedOut,

            (_, event) => return Err(self.invalid(&event)),
        };

        self.state = next;
        Ok(&self.state)
    }

    fn invalid(&self, event: &VoteEvent) -> TransitionError {
        TransitionError::InvalidTransition {
            state: self.state.name(),
            action: event.action(),
        }
    }
}
