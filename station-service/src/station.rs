//! Station coordinator.
//!
//! Owns the vote machine, the in-memory ledger, the persistence handles and
//! the session code. Every UI trigger goes through a [`Station`] method. The
//! session lock is never held across an await; the machine state itself is
//! the cast guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::candidates::{BallotRow, CandidateRoster};
use crate::config::{StationConfig, TimingConfig};
use crate::database::SqliteDurableStore;
use crate::error::{StationError, StationResult, TransitionError, ValidationError};
use crate::events::StationEvent;
use crate::identity::{validate_voter_id, IdentityHash, IdentityHasher};
use crate::integrity::{self, IntegrityStatus};
use crate::ledger::{DuplicateIdentity, Ledger, LedgerEntry};
use crate::machine::{StateView, VoteEvent, VoteMachine, VoteState};
use crate::metrics::{self, LoginOutcome};
use crate::reconcile::reconcile;
use crate::replication::Replicator;
use crate::results::{aggregate, ResultsSummary};
use crate::store::{DurableStore, FastStore, FileFastStore};

pub const SESSION_CODE_LEN: usize = 6;
const SESSION_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const EVENT_CHANNEL_CAPACITY: usize = 64;

struct Session {
    machine: VoteMachine,
    ledger: Ledger,
    code: String,
    integrity: IntegrityStatus,
}

pub struct Station {
    roster: CandidateRoster,
    hasher: IdentityHasher,
    fast: Arc<dyn FastStore>,
    durable: Option<Arc<dyn DurableStore>>,
    replicator: Option<Replicator>,
    timing: TimingConfig,
    events: broadcast::Sender<StationEvent>,
    ready: watch::Sender<bool>,
    init_started: AtomicBool,
    session: Mutex<Session>,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("hasher", &self.hasher)
            .field("degraded", &self.is_degraded())
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn abort_cast(machine: &mut VoteMachine, already_voted: bool) {
    if let Err(e) = machine.apply(VoteEvent::CastAborted { already_voted }) {
        warn!("Cast abort not applied: {e}");
    }
}

pub fn generate_session_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_CODE_LEN)
        .map(|_| SESSION_CODE_CHARSET[rng.gen_range(0..SESSION_CODE_CHARSET.len())] as char)
        .collect()
}

impl Station {
    /// Build a station over already-open stores. `durable: None` is degraded
    /// mode. Must be called inside a tokio runtime (spawns the replication
    /// worker).
    pub fn new(
        roster: CandidateRoster,
        hasher: IdentityHasher,
        fast: Arc<dyn FastStore>,
        durable: Option<Arc<dyn DurableStore>>,
        timing: TimingConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (ready, _) = watch::channel(false);
        let replicator = durable
            .as_ref()
            .map(|store| Replicator::spawn(Arc::clone(store), events.clone()));

        Arc::new(Self {
            roster,
            hasher,
            fast,
            durable,
            replicator,
            timing,
            events,
            ready,
            init_started: AtomicBool::new(false),
            session: Mutex::new(Session {
                machine: VoteMachine::new(),
                ledger: Ledger::new(),
                code: generate_session_code(),
                integrity: IntegrityStatus::Unchecked,
            }),
        })
    }

    /// Open both stores from configuration. A durable store that fails to
    /// open leaves the station in degraded mode; a bad fast store path or
    /// roster is fatal.
    pub async fn open(config: &StationConfig) -> StationResult<Arc<Self>> {
        let roster = match &config.candidates_path {
            Some(path) => CandidateRoster::load(path)?,
            None => CandidateRoster::default(),
        };

        let fast = FileFastStore::open(&config.fast_store_path).await?;

        let durable: Option<Arc<dyn DurableStore>> =
            match SqliteDurableStore::open(&config.db_path).await {
                Ok(store) => Some(Arc::new(store) as Arc<dyn DurableStore>),
                Err(e) => {
                    warn!("Continuing without a durable store (degraded mode): {e}");
                    None
                }
            };

        info!(
            digest = config.digest.strategy().name(),
            candidates = roster.len(),
            "Station stores opened"
        );

        Ok(Self::new(
            roster,
            IdentityHasher::from_kind(config.digest),
            Arc::new(fast),
            durable,
            config.timing,
        ))
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, event: VoteEvent) -> StationResult<StateView> {
        let mut session = self.session();
        session.machine.apply(event)?;
        Ok(session.machine.view())
    }

    fn emit(&self, event: StationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Reconcile the two stores, run the integrity check and open the station
    /// for logins. Runs once.
    pub async fn initialize(&self) -> StationResult<IntegrityStatus> {
        if self.init_started.swap(true, Ordering::SeqCst) {
            return Err(StationError::AlreadyInitialized);
        }

        let report = reconcile(self.fast.as_ref(), self.durable.as_deref()).await;
        let expected = match self.fast.load_expected_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Expected count unreadable, treating as 0: {e}");
                0
            }
        };
        let status = integrity::check(report.ledger.len(), expected);

        info!(
            ledger = report.ledger.len(),
            baseline = report.baseline_len,
            recovered = report.recovered_from_durable,
            durable_available = report.durable_available,
            "Station initialized"
        );

        {
            let mut session = self.session();
            session.ledger = report.ledger;
            session.integrity = status;
        }

        if let IntegrityStatus::Mismatch { observed, expected } = status {
            self.emit(StationEvent::IntegrityMismatch { observed, expected });
        }

        self.ready.send_replace(true);
        Ok(status)
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this only returns once ready.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn ensure_ready(&self) -> StationResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StationError::NotInitialized)
        }
    }

    /// Authenticate a voter. Suspends until [`Station::initialize`] has
    /// finished.
    pub async fn login(&self, raw_id: &str) -> StationResult<StateView> {
        self.wait_ready().await;
        self.apply(VoteEvent::LoginStarted)?;

        let raw_id = raw_id.trim();
        if let Err(e) = validate_voter_id(raw_id) {
            info!("Login rejected: {e}");
            metrics::record_login_outcome(LoginOutcome::Invalid);
            self.apply(VoteEvent::AuthenticationFailed)?;
            return Err(e.into());
        }

        let identity = match self.hasher.hash(raw_id).await {
            Ok(identity) => identity,
            Err(e) => {
                error!("Identity hash failed: {e}");
                metrics::record_login_outcome(LoginOutcome::HashFailure);
                self.apply(VoteEvent::AuthenticationFailed)?;
                return Err(e);
            }
        };

        let (view, already_voted) = {
            let mut session = self.session();
            let already_voted = session.ledger.contains(&identity);
            session.machine.apply(VoteEvent::Authenticated {
                identity: identity.clone(),
                already_voted,
            })?;
            (session.machine.view(), already_voted)
        };

        if already_voted {
            info!(identity = identity.short(), "Voter has already voted");
            metrics::record_login_outcome(LoginOutcome::AlreadyVoted);
        } else {
            info!(identity = identity.short(), "Ballot opened");
            metrics::record_login_outcome(LoginOutcome::Ballot);
        }
        Ok(view)
    }

    pub fn select_candidate(&self, candidate_id: &str) -> StationResult<StateView> {
        let mut session = self.session();
        if session.machine.state().is_cast_in_progress() {
            return Err(TransitionError::CastInProgress.into());
        }
        if self.roster.get(candidate_id).is_none() {
            return Err(ValidationError::UnknownCandidate(candidate_id.to_string()).into());
        }
        session.machine.apply(VoteEvent::CandidateSelected {
            candidate_id: candidate_id.to_string(),
        })?;
        debug!(candidate = candidate_id, "Candidate selected");
        Ok(session.machine.view())
    }

    pub fn cancel_cast(&self) -> StationResult<StateView> {
        self.apply(VoteEvent::CastCancelled)
    }

    /// Confirm the selected candidate and run the cast to completion.
    ///
    /// The transition to `Casting` happens before the first await. The rest of
    /// the sequence runs on its own task, so dropping the returned future does
    /// not abandon a cast halfway.
    pub async fn confirm_cast(self: &Arc<Self>) -> StationResult<LedgerEntry> {
        let (identity, candidate_id) = {
            let mut session = self.session();
            match session.machine.apply(VoteEvent::CastConfirmed)? {
                VoteState::Casting {
                    identity,
                    candidate_id,
                } => (identity.clone(), candidate_id.clone()),
                other => {
                    return Err(TransitionError::InvalidTransition {
                        state: other.name(),
                        action: "confirm the cast",
                    }
                    .into())
                }
            }
        };
        info!(identity = identity.short(), candidate = %candidate_id, "Cast started");

        let station = Arc::clone(self);
        tokio::spawn(async move { station.run_cast(identity, candidate_id).await })
            .await
            .map_err(|e| StationError::Internal(format!("cast task failed: {e}")))?
    }

    async fn run_cast(
        self: Arc<Self>,
        identity: IdentityHash,
        candidate_id: String,
    ) -> StationResult<LedgerEntry> {
        if let Some(candidate) = self.roster.get(&candidate_id) {
            self.emit(StationEvent::FeedbackStarted {
                serial: self.roster.serial(&candidate_id).unwrap_or_default(),
                candidate_id: candidate_id.clone(),
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                logo: candidate.logo.clone(),
            });
        }
        tokio::time::sleep(self.timing.feedback_display).await;
        self.emit(StationEvent::FeedbackSettling);
        tokio::time::sleep(self.timing.feedback_settle).await;

        let entry = LedgerEntry::new(identity.clone(), candidate_id);
        let snapshot = {
            let mut guard = self.session();
            let session = &mut *guard;
            let finished = session.machine.apply(VoteEvent::FeedbackFinished).map(|_| ());
            if let Err(e) = finished {
                abort_cast(&mut session.machine, false);
                return Err(e.into());
            }
            if let Err(DuplicateIdentity(dup)) = session.ledger.append(entry.clone()) {
                error!(identity = dup.short(), "Identity already in ledger, cast aborted");
                abort_cast(&mut session.machine, true);
                return Err(StationError::DuplicateVote(dup.short().to_string()));
            }
            session.ledger.entries().to_vec()
        };

        self.persist_fast(&snapshot).await;
        if let Some(replicator) = &self.replicator {
            replicator.replicate(entry.clone());
        }

        let ledger_len = {
            let mut session = self.session();
            let recorded = session
                .machine
                .apply(VoteEvent::VoteRecorded {
                    entry: entry.clone(),
                })
                .map(|_| ());
            if let Err(e) = recorded {
                // The entry is already committed, so the voter has voted.
                abort_cast(&mut session.machine, true);
                return Err(e.into());
            }
            session.ledger.len()
        };
        metrics::record_vote_recorded();
        info!(identity = identity.short(), ledger_len, "Vote recorded");
        self.emit(StationEvent::VoteRecorded { ledger_len });

        let delay = self.timing.results_delay;
        let station = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            station.advance_to_results(&identity);
        });

        Ok(entry)
    }

    async fn persist_fast(&self, snapshot: &[LedgerEntry]) {
        let result = match self.fast.save_ledger(snapshot).await {
            Ok(()) => self.fast.save_expected_count(snapshot.len()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Fast store write failed, vote kept in memory: {e}");
            metrics::record_fast_write_failure();
            self.emit(StationEvent::FastWriteFailed {
                reason: e.to_string(),
            });
        }
    }

    fn advance_to_results(&self, identity: &IdentityHash) {
        let mut session = self.session();
        let still_recorded = matches!(
            session.machine.state(),
            VoteState::Recorded { entry } if entry.identity_hash == *identity
        );
        if still_recorded {
            let _ = session.machine.apply(VoteEvent::ResultsShown);
        }
    }

    pub fn show_results(&self) -> StationResult<StateView> {
        self.ensure_ready()?;
        self.apply(VoteEvent::ResultsShown)
    }

    /// Back to `LoggedOut` with a fresh session code. Refused mid-cast.
    pub fn reset(&self) -> StationResult<StateView> {
        let mut session = self.session();
        session.machine.apply(VoteEvent::Reset)?;
        session.code = generate_session_code();
        debug!(code = %session.code, "Session reset");
        Ok(session.machine.view())
    }

    pub fn ledger_snapshot(&self) -> StationResult<Vec<LedgerEntry>> {
        self.ensure_ready()?;
        Ok(self.session().ledger.entries().to_vec())
    }

    pub fn results(&self) -> StationResult<ResultsSummary> {
        self.ensure_ready()?;
        Ok(aggregate(self.session().ledger.entries(), &self.roster))
    }

    pub fn integrity_status(&self) -> IntegrityStatus {
        self.session().integrity
    }

    pub fn state_view(&self) -> StateView {
        self.session().machine.view()
    }

    pub fn ballot(&self) -> Vec<BallotRow> {
        self.roster.ballot()
    }

    pub fn roster(&self) -> &CandidateRoster {
        &self.roster
    }

    pub fn session_code(&self) -> String {
        self.session().code.clone()
    }

    pub fn digest_algorithm(&self) -> &'static str {
        self.hasher.algorithm()
    }

    pub fn is_degraded(&self) -> bool {
        self.durable.is_none()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.events.subscribe()
    }

    /// Wait for every durable write queued so far.
    pub async fn flush_replication(&self) {
        if let Some(replicator) = &self.replicator {
            replicator.flush().await;
        }
    }
}
