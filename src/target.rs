//! C4 — FindTarget strategy.
//!
//! Two interchangeable variants share one seam ([`TargetSelector`]) so the
//! iteration engine is agnostic to which is installed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::{NetworkTopology, PlacementPolicy};
use crate::types::{ContainerInfo, MoveSelection, NodeId, NodeUsage};

/// Picks a (container, target) pair for one source, given its candidates.
pub trait TargetSelector: Send + Sync {
    /// Try each candidate container against the target pool in this
    /// selector's preferred order; return the first pair that satisfies
    /// every placement and capacity constraint, or `None`.
    fn find_target_for_container_move(
        &mut self,
        source: &NodeId,
        candidates: &[ContainerInfo],
        placement_policy: &dyn PlacementPolicy,
    ) -> Option<MoveSelection>;
}

fn constraints_hold(
    source: &NodeId,
    container: &ContainerInfo,
    target: &NodeUsage,
    bytes_entering_so_far: u64,
    upper_limit: f64,
    max_size_entering_target: u64,
    placement_policy: &dyn PlacementPolicy,
) -> bool {
    if &target.node_id == source {
        return false;
    }
    if container.replica_set.contains(&target.node_id) {
        return false;
    }
    if target.utilization_after_entering(container.used_bytes) > upper_limit {
        return false;
    }
    if bytes_entering_so_far + container.used_bytes > max_size_entering_target {
        return false;
    }
    let mut projected = container.replica_set.clone();
    projected.remove(source);
    projected.insert(target.node_id.clone());
    placement_policy.validate(&projected)
}

/// Prefers the least-used eligible target for each candidate container.
pub struct UsageTargetSelector {
    targets: Vec<NodeUsage>,
    bytes_entering: HashMap<NodeId, u64>,
    upper_limit: f64,
    max_size_entering_target: u64,
}

impl UsageTargetSelector {
    /// Build a selector over `under_utilized`, sorted least-used first
    /// (ties broken by id).
    pub fn new(mut under_utilized: Vec<NodeUsage>, upper_limit: f64, max_size_entering_target: u64) -> Self {
        under_utilized.sort_by(|a, b| {
            a.utilization()
                .partial_cmp(&b.utilization())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Self {
            targets: under_utilized,
            bytes_entering: HashMap::new(),
            upper_limit,
            max_size_entering_target,
        }
    }

    /// Cumulative bytes scheduled to enter `node` so far.
    pub fn bytes_entering(&self, node: &NodeId) -> u64 {
        *self.bytes_entering.get(node).unwrap_or(&0)
    }
}

impl TargetSelector for UsageTargetSelector {
    fn find_target_for_container_move(
        &mut self,
        source: &NodeId,
        candidates: &[ContainerInfo],
        placement_policy: &dyn PlacementPolicy,
    ) -> Option<MoveSelection> {
        for container in candidates {
            for target in &self.targets {
                let so_far = *self.bytes_entering.get(&target.node_id).unwrap_or(&0);
                if constraints_hold(
                    source,
                    container,
                    target,
                    so_far,
                    self.upper_limit,
                    self.max_size_entering_target,
                    placement_policy,
                ) {
                    *self.bytes_entering.entry(target.node_id.clone()).or_insert(0) +=
                        container.used_bytes;
                    return Some(MoveSelection {
                        container_id: container.id.clone(),
                        target: target.node_id.clone(),
                    });
                }
            }
        }
        None
    }
}

/// Prefers targets that keep an existing replica's rack locality, falling
/// back to the closest rack to the source.
pub struct TopologyTargetSelector {
    targets: Vec<NodeUsage>,
    bytes_entering: HashMap<NodeId, u64>,
    upper_limit: f64,
    max_size_entering_target: u64,
    topology: Arc<dyn NetworkTopology>,
}

impl TopologyTargetSelector {
    /// Build a selector over `under_utilized`, ordered per candidate by
    /// topology preference rather than a single fixed order.
    pub fn new(
        under_utilized: Vec<NodeUsage>,
        upper_limit: f64,
        max_size_entering_target: u64,
        topology: Arc<dyn NetworkTopology>,
    ) -> Self {
        Self {
            targets: under_utilized,
            bytes_entering: HashMap::new(),
            upper_limit,
            max_size_entering_target,
            topology,
        }
    }

    fn ordered_targets(&self, source: &NodeId, container: &ContainerInfo) -> Vec<&NodeUsage> {
        let source_shares_rack_with_replica = container
            .replica_set
            .iter()
            .any(|replica| self.topology.same_rack(source, replica));

        let mut ordered: Vec<&NodeUsage> = self.targets.iter().collect();
        if source_shares_rack_with_replica {
            ordered.sort_by_key(|target| {
                let same_rack_as_some_replica = container
                    .replica_set
                    .iter()
                    .any(|replica| self.topology.same_rack(&target.node_id, replica));
                (!same_rack_as_some_replica, target.node_id.clone())
            });
        } else {
            ordered.sort_by_key(|target| {
                let min_distance = container
                    .replica_set
                    .iter()
                    .map(|replica| self.topology.rack_distance(&target.node_id, replica))
                    .min()
                    .unwrap_or(u32::MAX);
                (min_distance, target.node_id.clone())
            });
        }
        ordered
    }
}

impl TargetSelector for TopologyTargetSelector {
    fn find_target_for_container_move(
        &mut self,
        source: &NodeId,
        candidates: &[ContainerInfo],
        placement_policy: &dyn PlacementPolicy,
    ) -> Option<MoveSelection> {
        for container in candidates {
            let ordered = self.ordered_targets(source, container);
            for target in ordered {
                let so_far = *self.bytes_entering.get(&target.node_id).unwrap_or(&0);
                if constraints_hold(
                    source,
                    container,
                    target,
                    so_far,
                    self.upper_limit,
                    self.max_size_entering_target,
                    placement_policy,
                ) {
                    *self.bytes_entering.entry(target.node_id.clone()).or_insert(0) +=
                        container.used_bytes;
                    return Some(MoveSelection {
                        container_id: container.id.clone(),
                        target: target.node_id.clone(),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerState;
    use std::collections::BTreeSet;
    use std::net::{IpAddr, Ipv4Addr};

    struct AllowAll;
    impl PlacementPolicy for AllowAll {
        fn validate(&self, _replica_set: &BTreeSet<NodeId>) -> bool {
            true
        }
    }

    struct DenyAll;
    impl PlacementPolicy for DenyAll {
        fn validate(&self, _replica_set: &BTreeSet<NodeId>) -> bool {
            false
        }
    }

    fn usage(id: &str, capacity: u64, remaining: u64) -> NodeUsage {
        NodeUsage::new(
            id.into(),
            id,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            capacity,
            capacity - remaining,
            remaining,
        )
        .unwrap()
    }

    fn container(id: &str, bytes: u64, replicas: &[&str]) -> ContainerInfo {
        ContainerInfo {
            id: id.into(),
            used_bytes: bytes,
            replica_set: replicas.iter().map(|r| NodeId::from(*r)).collect(),
            state: ContainerState::Closed,
            expected_replication: replicas.len(),
        }
    }

    #[test]
    fn picks_least_used_eligible_target() {
        let mut selector = UsageTargetSelector::new(
            vec![usage("b", 1000, 900), usage("c", 1000, 500)],
            0.6,
            1_000_000,
        );
        let candidates = vec![container("x", 100, &["a"])];
        let selection = selector
            .find_target_for_container_move(&NodeId::from("a"), &candidates, &AllowAll)
            .unwrap();
        assert_eq!(selection.target.as_str(), "c");
    }

    #[test]
    fn rejects_when_placement_policy_denies() {
        let mut selector =
            UsageTargetSelector::new(vec![usage("b", 1000, 900)], 0.9, 1_000_000);
        let candidates = vec![container("x", 10, &["a"])];
        let selection =
            selector.find_target_for_container_move(&NodeId::from("a"), &candidates, &DenyAll);
        assert!(selection.is_none());
    }

    #[test]
    fn respects_entering_cap_across_calls() {
        let mut selector = UsageTargetSelector::new(vec![usage("b", 1000, 900)], 0.95, 50);
        let first = vec![container("x", 40, &["a"])];
        assert!(selector
            .find_target_for_container_move(&NodeId::from("a"), &first, &AllowAll)
            .is_some());
        let second = vec![container("y", 20, &["a"])];
        assert!(selector
            .find_target_for_container_move(&NodeId::from("a"), &second, &AllowAll)
            .is_none());
    }
}
