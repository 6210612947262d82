//! Collaborator interfaces the balancer consumes but does not own.
//!
//! Everything here is implemented by the surrounding system (node manager,
//! replication engine, placement policy, ...). The balancer is constructed
//! against trait objects so a host process can wire up its real
//! cluster-facing implementations without the core depending on them
//! directly.

use async_trait::async_trait;

use crate::types::{ContainerId, ContainerInfo, MoveOutcome, NodeId, NodeUsage};

/// Reports node capacity/used/remaining and triggers disk-usage refresh.
#[async_trait]
pub trait NodeManager: Send + Sync {
    /// All in-service, healthy nodes, ranked most-used first.
    async fn most_used_first(&self) -> Vec<NodeUsage>;

    /// Ask every node to recompute its disk usage. Does not wait for the
    /// recomputation to land; the caller is responsible for waiting out
    /// the reporting interval.
    async fn refresh_all_healthy_node_usage(&self);

    /// Whether `node` is currently known to the node manager.
    async fn exists(&self, node: &NodeId) -> bool;
}

/// Reports container metadata and which containers live on which node.
#[async_trait]
pub trait ContainerManager: Send + Sync {
    /// Look up a container's current metadata, if known.
    async fn get_container(&self, id: &ContainerId) -> Option<ContainerInfo>;

    /// All containers currently replicated on `node`.
    async fn containers_on_node(&self, node: &NodeId) -> Vec<ContainerId>;
}

/// Performs the actual replica transfer and reports in-flight operations.
#[async_trait]
pub trait ReplicationManager: Send + Sync {
    /// Move one replica of `container` from `source` to `target`.
    ///
    /// Must not block past synchronous rejection (container/node not
    /// found): those cases resolve immediately as
    /// [`MoveOutcome::Failed`]. Longer-running moves resolve once the
    /// transfer finishes; the balancer itself applies the timeout.
    async fn move_container(
        &self,
        container: ContainerId,
        source: NodeId,
        target: NodeId,
    ) -> MoveOutcome;

    /// Whether `container` already has a replication operation in flight.
    async fn has_in_flight_operation(&self, container: &ContainerId) -> bool;
}

/// Validates a candidate replica set against cluster placement rules.
///
/// Synchronous: placement policies are expected to be pure functions of
/// cluster topology metadata already held in memory.
pub trait PlacementPolicy: Send + Sync {
    /// Whether `replica_set` would be an acceptable placement.
    fn validate(&self, replica_set: &std::collections::BTreeSet<NodeId>) -> bool;
}

/// Rack-awareness queries used by the topology-aware FindTarget variant.
pub trait NetworkTopology: Send + Sync {
    /// Whether `a` and `b` are in the same rack.
    fn same_rack(&self, a: &NodeId, b: &NodeId) -> bool;

    /// Topological distance between the racks containing `a` and `b`.
    fn rack_distance(&self, a: &NodeId, b: &NodeId) -> u32;
}

/// Leadership and safe-mode status, pulled from the surrounding cluster
/// manager context.
pub trait ScmContext: Send + Sync {
    /// Whether this instance currently holds leadership.
    fn is_leader(&self) -> bool;

    /// Whether leadership has settled (as opposed to being contested).
    fn is_leader_ready(&self) -> bool;

    /// Whether the cluster is currently in safe mode.
    fn is_in_safe_mode(&self) -> bool;
}
