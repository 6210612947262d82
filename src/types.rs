//! Core data model: nodes, containers, usage snapshots, and move records.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque stable identifier for a data node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Arc<str>);

impl NodeId {
    /// Build a `NodeId` from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque stable identifier for a container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub Arc<str>);

impl ContainerId {
    /// Build a `ContainerId` from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContainerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A point-in-time capacity/used/remaining reading for one node.
///
/// `capacity ≥ used ≥ 0`, `capacity ≥ remaining ≥ 0`, and
/// `capacity ≥ used + remaining` — the excess is reserved or otherwise
/// unaccounted space, not an error. Constructed only via [`NodeUsage::new`],
/// which enforces these invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    /// The node this reading describes.
    pub node_id: NodeId,
    /// Hostname used for include/exclude filtering.
    pub hostname: String,
    /// IP address used for include/exclude filtering.
    pub address: IpAddr,
    /// Total node capacity, in bytes.
    pub capacity: u64,
    /// Bytes currently used on the node.
    pub used: u64,
    /// Bytes remaining (free) on the node.
    pub remaining: u64,
}

impl NodeUsage {
    /// Construct a `NodeUsage`, returning `None` if the invariants don't hold.
    pub fn new(
        node_id: NodeId,
        hostname: impl Into<String>,
        address: IpAddr,
        capacity: u64,
        used: u64,
        remaining: u64,
    ) -> Option<Self> {
        if used > capacity || remaining > capacity || used.saturating_add(remaining) > capacity {
            return None;
        }
        Some(Self {
            node_id,
            hostname: hostname.into(),
            address,
            capacity,
            used,
            remaining,
        })
    }

    /// Fraction of capacity in use, in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.capacity - self.remaining) as f64 / self.capacity as f64
    }

    /// The usage this node would report after `bytes` leave it.
    pub fn utilization_after_leaving(&self, bytes: u64) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        let projected_remaining = self.remaining.saturating_add(bytes).min(self.capacity);
        (self.capacity - projected_remaining) as f64 / self.capacity as f64
    }

    /// The usage this node would report after `bytes` enter it.
    pub fn utilization_after_entering(&self, bytes: u64) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        let projected_remaining = self.remaining.saturating_sub(bytes);
        (self.capacity - projected_remaining) as f64 / self.capacity as f64
    }
}

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    /// Still accepting writes; not eligible for balancing.
    Open,
    /// Sealed; eligible for balancing.
    Closed,
    /// Under-/over-replicated and being reconciled; not eligible.
    QuasiClosed,
    /// Marked for removal; not eligible.
    Deleting,
}

impl ContainerState {
    /// Whether a container in this state may be moved by the balancer.
    pub fn is_movable(self) -> bool {
        matches!(self, ContainerState::Closed)
    }
}

/// A container's balancer-relevant metadata, as of the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// The container's identifier.
    pub id: ContainerId,
    /// Bytes used by this container; treated as immutable for one iteration.
    pub used_bytes: u64,
    /// Nodes currently holding a replica of this container.
    pub replica_set: BTreeSet<NodeId>,
    /// The container's lifecycle state.
    pub state: ContainerState,
    /// The configured replication factor for this container.
    pub expected_replication: usize,
}

impl ContainerInfo {
    /// Whether this container is eligible for balancing irrespective of
    /// node-specific selection criteria (state and replication health only).
    pub fn is_replication_healthy(&self) -> bool {
        self.state.is_movable() && self.replica_set.len() == self.expected_replication
    }
}

/// A chosen (container, target) pair, produced by the FindTarget strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveSelection {
    /// The container to move.
    pub container_id: ContainerId,
    /// The node it should move to.
    pub target: NodeId,
}

/// The result of one asynchronous move request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The move finished successfully.
    Completed,
    /// The move failed for the given reason.
    Failed(String),
    /// The move did not resolve before its deadline.
    TimedOut,
    /// The move was cancelled before it resolved.
    Cancelled,
    /// The container was no longer where the balancer thought it was.
    Replaced,
    /// The placement policy rejected the move's resulting replica set.
    PlacementInvalid,
}

/// Outcome of a full balancer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationResult {
    /// The iteration ran to completion (whether or not it scheduled moves).
    Completed,
    /// No unbalanced nodes, or no valid (container, target) pair existed.
    CannotBalance,
    /// The worker was asked to stop mid-iteration.
    Interrupted,
    /// A precondition (leadership, safe mode) failed before the iteration began.
    PreconditionFailed,
}
