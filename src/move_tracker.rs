//! C5 — move tracker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::ReplicationManager;
use crate::types::{ContainerId, MoveOutcome, MoveSelection, NodeId};

type SharedOutcome = Shared<BoxFuture<'static, MoveOutcome>>;

/// Identifies one in-flight move for idempotence purposes.
type MoveKey = (ContainerId, NodeId, NodeId);

/// Submits move requests to the external replication engine and collects
/// their outcomes under a deadline.
pub struct MoveTracker {
    replication: Arc<dyn ReplicationManager>,
    inflight: DashMap<MoveKey, (SharedOutcome, CancellationToken)>,
}

impl MoveTracker {
    /// Build a tracker over the given replication-manager collaborator.
    pub fn new(replication: Arc<dyn ReplicationManager>) -> Self {
        Self {
            replication,
            inflight: DashMap::new(),
        }
    }

    /// Submit a move, or return the existing future if one is already
    /// in flight for this exact `(container, source, target)` triple.
    pub fn submit(&self, container: ContainerId, source: NodeId, target: NodeId) -> SharedOutcome {
        let key: MoveKey = (container.clone(), source.clone(), target.clone());
        if let Some(existing) = self.inflight.get(&key) {
            return existing.0.clone();
        }

        let cancel = CancellationToken::new();
        let replication = Arc::clone(&self.replication);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                outcome = replication.move_container(container, source, target) => outcome,
                _ = task_cancel.cancelled() => MoveOutcome::Cancelled,
            }
        });

        let shared: SharedOutcome = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(_) => MoveOutcome::Failed("move task panicked".to_string()),
            }
        }
        .boxed()
        .shared();

        self.inflight.insert(key, (shared.clone(), cancel));
        shared
    }

    /// Await every currently in-flight move, up to `deadline`. Moves still
    /// unresolved when the deadline elapses are cancelled and counted as
    /// [`MoveOutcome::TimedOut`].
    pub async fn await_all(&self, deadline: Duration) -> HashMap<MoveSelection, MoveOutcome> {
        let entries: Vec<(MoveKey, SharedOutcome, CancellationToken)> = self
            .inflight
            .iter()
            .map(|entry| {
                let (fut, cancel) = entry.value().clone();
                (entry.key().clone(), fut, cancel)
            })
            .collect();
        self.inflight.clear();

        let mut outcomes = HashMap::with_capacity(entries.len());
        let deadline_fut = tokio::time::sleep(deadline);
        tokio::pin!(deadline_fut);

        let mut pending: futures::stream::FuturesUnordered<_> = entries
            .iter()
            .map(|(key, fut, _)| {
                let fut = fut.clone();
                let key = key.clone();
                async move { (key, fut.await) }
            })
            .collect();

        use futures::StreamExt;
        loop {
            if pending.is_empty() {
                break;
            }
            tokio::select! {
                next = pending.next() => {
                    if let Some((key, outcome)) = next {
                        let selection = MoveSelection { container_id: key.0.clone(), target: key.2.clone() };
                        outcomes.insert(selection, outcome);
                    }
                }
                _ = &mut deadline_fut => {
                    for (key, _, cancel) in &entries {
                        let selection = MoveSelection { container_id: key.0.clone(), target: key.2.clone() };
                        if !outcomes.contains_key(&selection) {
                            cancel.cancel();
                            debug!(container = %key.0, target = %key.2, "move timed out; cancelling");
                            outcomes.insert(selection, MoveOutcome::TimedOut);
                        }
                    }
                    break;
                }
            }
        }

        outcomes
    }
}
