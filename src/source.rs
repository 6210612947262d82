//! C3 — FindSource strategy.

use std::collections::{HashMap, HashSet};

use crate::types::{NodeId, NodeUsage};

/// Greedy iterator over over-utilized source nodes, most-used first.
///
/// Tracks cumulative bytes scheduled to leave each source and retires a
/// source once it hits its leaving cap or would no longer be over-utilized.
pub struct SourceSelector {
    order: Vec<NodeUsage>,
    cursor: usize,
    exhausted: HashSet<NodeId>,
    bytes_leaving: HashMap<NodeId, u64>,
    max_size_leaving_source: u64,
    upper_limit: f64,
}

impl SourceSelector {
    /// Build a selector over `over_utilized`, sorted most-used first
    /// (ties broken by id).
    pub fn new(mut over_utilized: Vec<NodeUsage>, upper_limit: f64, max_size_leaving_source: u64) -> Self {
        over_utilized.sort_by(|a, b| {
            b.utilization()
                .partial_cmp(&a.utilization())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Self {
            order: over_utilized,
            cursor: 0,
            exhausted: HashSet::new(),
            bytes_leaving: HashMap::new(),
            max_size_leaving_source,
            upper_limit,
        }
    }

    /// The next source not yet exhausted, or `None` if all are spent.
    pub fn next_candidate(&mut self) -> Option<&NodeUsage> {
        while self.cursor < self.order.len() {
            if self.exhausted.contains(&self.order[self.cursor].node_id) {
                self.cursor += 1;
                continue;
            }
            return Some(&self.order[self.cursor]);
        }
        None
    }

    /// Retire a source for the rest of the iteration.
    pub fn remove_candidate(&mut self, node: &NodeId) {
        self.exhausted.insert(node.clone());
    }

    /// Record that `bytes` were just scheduled to leave `node`. Retires the
    /// source if it has now exceeded its leaving cap, or would no longer be
    /// over-utilized once those bytes actually leave.
    pub fn increase_leaving(&mut self, node: &NodeUsage, bytes: u64) {
        let total = self.bytes_leaving.entry(node.node_id.clone()).or_insert(0);
        *total += bytes;
        let exhausted_by_cap = *total > self.max_size_leaving_source;
        let exhausted_by_threshold = node.utilization_after_leaving(*total) < self.upper_limit;
        if exhausted_by_cap || exhausted_by_threshold {
            self.remove_candidate(&node.node_id);
        }
    }

    /// Cumulative bytes scheduled to leave `node` so far.
    pub fn bytes_leaving(&self, node: &NodeId) -> u64 {
        *self.bytes_leaving.get(node).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

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

    #[test]
    fn iterates_most_used_first() {
        let mut selector = SourceSelector::new(
            vec![usage("a", 100, 20), usage("b", 100, 5)],
            0.5,
            1_000_000,
        );
        assert_eq!(selector.next_candidate().unwrap().node_id.as_str(), "b");
        selector.remove_candidate(&NodeId::from("b"));
        assert_eq!(selector.next_candidate().unwrap().node_id.as_str(), "a");
    }

    #[test]
    fn exhausts_once_leaving_cap_exceeded() {
        let node = usage("a", 1000, 100);
        let mut selector = SourceSelector::new(vec![node.clone()], 0.5, 150);
        selector.increase_leaving(&node, 200);
        assert!(selector.next_candidate().is_none());
    }

    #[test]
    fn exhausts_once_no_longer_over_utilized() {
        let node = usage("a", 1000, 100); // util = 0.9
        let mut selector = SourceSelector::new(vec![node.clone()], 0.5, 1_000_000);
        // Moving 500 bytes out brings remaining to 600, util = 0.4 < 0.5.
        selector.increase_leaving(&node, 500);
        assert!(selector.next_candidate().is_none());
    }
}
