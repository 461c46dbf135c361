//! Error taxonomy for the voting station core

use thiserror::Error;

/// Rejected voter or operator input. Recoverable: the caller retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("voter id must be at least {min} characters")]
    TooShort { min: usize },
    #[error("voter id must contain only letters and digits")]
    NotAlphanumeric,
    #[error("unknown candidate '{0}'")]
    UnknownCandidate(String),
}

/// An action that the vote state machine does not accept in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a cast is already in progress")]
    CastInProgress,
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
}

/// Failure of a single persistence adapter operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StationError {
    /// The durable store could not be opened. The station keeps running on
    /// the fast store alone.
    #[error("durable store initialization failed: {0}")]
    Initialization(String),
    /// Fatal to the current login attempt only.
    #[error("identity hash failed: {0}")]
    HashFailure(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Durable store only. Logged and swallowed on the cast path.
    #[error("durable store write failed: {0}")]
    PersistenceWrite(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("fast store error: {0}")]
    FastStore(#[from] StoreError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("station has not finished startup reconciliation")]
    NotInitialized,
    #[error("station is already initialized")]
    AlreadyInitialized,
    /// The identity was already in the ledger when its cast was committed.
    #[error("identity {0} already has a vote in the ledger")]
    DuplicateVote(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StationResult<T> = Result<T, StationError>;
