//! Best-effort replication of recorded votes into the durable store.
//!
//! The cast path hands each entry to a single worker task over an unbounded
//! channel and never waits for the write. Failures are logged, counted, and
//! published on the station event channel; the next startup reconciliation
//! repairs whatever the durable store missed.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::events::StationEvent;
use crate::ledger::LedgerEntry;
use crate::metrics;
use crate::store::DurableStore;

enum ReplicationCommand {
    Put(LedgerEntry),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the replication worker.
#[derive(Debug, Clone)]
pub struct Replicator {
    tx: mpsc::UnboundedSender<ReplicationCommand>,
}

impl std::fmt::Debug for ReplicationCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationCommand::Put(entry) => f
                .debug_tuple("Put")
                .field(&entry.identity_hash.short())
                .finish(),
            ReplicationCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl Replicator {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(durable: Arc<dyn DurableStore>, events: broadcast::Sender<StationEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(durable, events, rx));
        Self { tx }
    }

    /// Queue an upsert. Returns immediately.
    pub fn replicate(&self, entry: LedgerEntry) {
        if self.tx.send(ReplicationCommand::Put(entry)).is_err() {
            warn!("Replication worker stopped, durable write dropped");
            metrics::record_durable_write_failure();
        }
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(ReplicationCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(
    durable: Arc<dyn DurableStore>,
    events: broadcast::Sender<StationEvent>,
    mut rx: mpsc::UnboundedReceiver<ReplicationCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            ReplicationCommand::Put(entry) => match durable.put(&entry).await {
                Ok(()) => debug!(identity = entry.identity_hash.short(), "Vote replicated"),
                Err(e) => {
                    warn!(
                        identity = entry.identity_hash.short(),
                        "Durable store write failed: {e}"
                    );
                    metrics::record_durable_write_failure();
                    let _ = events.send(StationEvent::DurableWriteFailed {
                        identity_prefix: entry.identity_hash.short().to_string(),
                        reason: e.to_string(),
                    });
                }
            },
            ReplicationCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Replication worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityHash;
    use crate::store::MemoryDurableStore;

    #[tokio::test]
    async fn test_replicates_and_flushes() {
        let durable = Arc::new(MemoryDurableStore::new());
        let (events, _) = broadcast::channel(16);
        let replicator = Replicator::spawn(durable.clone(), events);

        replicator.replicate(LedgerEntry::new(IdentityHash::new("a"), "1"));
        replicator.replicate(LedgerEntry::new(IdentityHash::new("b"), "2"));
        replicator.flush().await;

        assert_eq!(durable.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_published() {
        let durable = Arc::new(MemoryDurableStore::new());
        durable.set_fail_writes(true);
        let (events, mut rx) = broadcast::channel(16);
        let replicator = Replicator::spawn(durable.clone(), events);

        replicator.replicate(LedgerEntry::new(IdentityHash::new("abcdef0123456789"), "1"));
        replicator.flush().await;

        match rx.recv().await.unwrap() {
            StationEvent::DurableWriteFailed { identity_prefix, .. } => {
                assert_eq!(identity_prefix, "abcdef012345");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(durable.is_empty());
    }
}
