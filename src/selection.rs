//! C2 — selection criteria.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::collaborators::{ContainerManager, ReplicationManager};
use crate::types::{ContainerId, ContainerInfo, NodeId};

/// Yields the ordered set of containers on a node eligible to move.
pub struct ContainerSelector {
    containers: Arc<dyn ContainerManager>,
    replication: Arc<dyn ReplicationManager>,
}

impl ContainerSelector {
    /// Build a selector backed by the given collaborators.
    pub fn new(
        containers: Arc<dyn ContainerManager>,
        replication: Arc<dyn ReplicationManager>,
    ) -> Self {
        Self {
            containers,
            replication,
        }
    }

    /// Candidate containers on `node`, ordered by descending `used_bytes`
    /// (tie-broken by id), excluding any already in `selected`.
    ///
    /// A container qualifies iff it is movable, not already selected this
    /// iteration, has no in-flight replication operation, and its replica
    /// count matches its configured replication factor.
    pub async fn candidate_containers(
        &self,
        node: &NodeId,
        selected: &HashSet<ContainerId>,
    ) -> Vec<ContainerInfo> {
        let ids = self.containers.containers_on_node(node).await;
        let mut candidates = Vec::with_capacity(ids.len());

        for id in ids {
            if selected.contains(&id) {
                continue;
            }
            let Some(info) = self.containers.get_container(&id).await else {
                warn!(container = %id, node = %node, "container not found during selection; skipping");
                continue;
            };
            if !info.is_replication_healthy() {
                continue;
            }
            if self.replication.has_in_flight_operation(&id).await {
                continue;
            }
            candidates.push(info);
        }

        candidates.sort_by(|a, b| b.used_bytes.cmp(&a.used_bytes).then_with(|| a.id.cmp(&b.id)));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerState, MoveOutcome};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    struct FakeContainers {
        containers: Vec<ContainerInfo>,
    }

    #[async_trait]
    impl ContainerManager for FakeContainers {
        async fn get_container(&self, id: &ContainerId) -> Option<ContainerInfo> {
            self.containers.iter().find(|c| &c.id == id).cloned()
        }

        async fn containers_on_node(&self, node: &NodeId) -> Vec<ContainerId> {
            self.containers
                .iter()
                .filter(|c| c.replica_set.contains(node))
                .map(|c| c.id.clone())
                .collect()
        }
    }

    struct FakeReplication {
        in_flight: Mutex<HashSet<ContainerId>>,
    }

    #[async_trait]
    impl ReplicationManager for FakeReplication {
        async fn move_container(
            &self,
            _container: ContainerId,
            _source: NodeId,
            _target: NodeId,
        ) -> MoveOutcome {
            MoveOutcome::Completed
        }

        async fn has_in_flight_operation(&self, container: &ContainerId) -> bool {
            self.in_flight.lock().unwrap().contains(container)
        }
    }

    fn container(id: &str, bytes: u64, replicas: &[&str], state: ContainerState) -> ContainerInfo {
        ContainerInfo {
            id: id.into(),
            used_bytes: bytes,
            replica_set: replicas.iter().map(|r| NodeId::from(*r)).collect::<BTreeSet<_>>(),
            state,
            expected_replication: replicas.len(),
        }
    }

    #[tokio::test]
    async fn orders_by_descending_size_and_skips_ineligible() {
        let mut under_replicated = container("under-replicated", 999, &["a"], ContainerState::Closed);
        under_replicated.expected_replication = 2;

        let containers = Arc::new(FakeContainers {
            containers: vec![
                container("small", 10, &["a"], ContainerState::Closed),
                container("big", 100, &["a"], ContainerState::Closed),
                container("open", 999, &["a"], ContainerState::Open),
                under_replicated,
            ],
        });
        let replication = Arc::new(FakeReplication {
            in_flight: Mutex::new(HashSet::new()),
        });

        let selector = ContainerSelector::new(containers, replication);
        let selected = HashSet::new();
        let candidates = selector
            .candidate_containers(&NodeId::from("a"), &selected)
            .await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id.as_str(), "big");
        assert_eq!(candidates[1].id.as_str(), "small");
    }

    #[tokio::test]
    async fn excludes_already_selected_and_in_flight() {
        let containers = Arc::new(FakeContainers {
            containers: vec![
                container("a1", 10, &["a"], ContainerState::Closed),
                container("a2", 20, &["a"], ContainerState::Closed),
            ],
        });
        let mut in_flight = HashSet::new();
        in_flight.insert(ContainerId::from("a2"));
        let replication = Arc::new(FakeReplication {
            in_flight: Mutex::new(in_flight),
        });

        let selector = ContainerSelector::new(containers, replication);
        let mut selected = HashSet::new();
        selected.insert(ContainerId::from("a1"));

        let candidates = selector
            .candidate_containers(&NodeId::from("a"), &selected)
            .await;
        assert!(candidates.is_empty());
    }

}
