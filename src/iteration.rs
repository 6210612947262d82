//! C6 — iteration engine: the control algorithm in full.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::collaborators::{ContainerManager, NetworkTopology, NodeManager, PlacementPolicy, ReplicationManager};
use crate::config::BalancerConfig;
use crate::math::bytes_over_upper_limit;
use crate::metrics::BalancerMetrics;
use crate::move_tracker::MoveTracker;
use crate::selection::ContainerSelector;
use crate::snapshot::UsageSnapshotProvider;
use crate::source::SourceSelector;
use crate::target::{TargetSelector, TopologyTargetSelector, UsageTargetSelector};
use crate::types::IterationResult;

/// Orchestrates one full pass of the control loop: snapshot, classify,
/// match sources to targets until a cap trips, await outcomes, record
/// metrics.
pub struct IterationEngine {
    snapshot_provider: UsageSnapshotProvider,
    container_selector: ContainerSelector,
    move_tracker: MoveTracker,
    placement_policy: Arc<dyn PlacementPolicy>,
    topology: Arc<dyn NetworkTopology>,
    metrics: Arc<BalancerMetrics>,
}

impl IterationEngine {
    /// Build an engine over the given collaborators and node filters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_manager: Arc<dyn NodeManager>,
        container_manager: Arc<dyn ContainerManager>,
        replication_manager: Arc<dyn ReplicationManager>,
        placement_policy: Arc<dyn PlacementPolicy>,
        topology: Arc<dyn NetworkTopology>,
        metrics: Arc<BalancerMetrics>,
        include_nodes: HashSet<String>,
        exclude_nodes: HashSet<String>,
    ) -> Self {
        Self {
            snapshot_provider: UsageSnapshotProvider::new(node_manager, include_nodes, exclude_nodes),
            container_selector: ContainerSelector::new(container_manager, Arc::clone(&replication_manager)),
            move_tracker: MoveTracker::new(replication_manager),
            placement_policy,
            topology,
            metrics,
        }
    }

    /// Run one iteration to completion (or until interrupted/capped).
    #[instrument(skip(self, config, running, cancel))]
    pub async fn run_iteration(
        &self,
        config: &BalancerConfig,
        running: &AtomicBool,
        cancel: &CancellationToken,
    ) -> IterationResult {
        self.metrics.begin_iteration();

        let snapshot = self
            .snapshot_provider
            .snapshot(config.trigger_du_enable, config.node_report_interval, cancel)
            .await;
        if snapshot.is_empty() {
            debug!("empty usage snapshot; cannot balance this iteration");
            return IterationResult::CannotBalance;
        }

        let total_capacity: u128 = snapshot.iter().map(|u| u.capacity as u128).sum();
        let total_remaining: u128 = snapshot.iter().map(|u| u.remaining as u128).sum();
        let cluster_avg = if total_capacity == 0 {
            0.0
        } else {
            (total_capacity - total_remaining) as f64 / total_capacity as f64
        };
        let upper_limit = cluster_avg + config.threshold;
        let lower_limit = cluster_avg - config.threshold;

        let mut over = Vec::new();
        let mut under = Vec::new();
        for usage in &snapshot {
            let util = usage.utilization();
            if util > upper_limit {
                over.push(usage.clone());
            } else if util < lower_limit {
                under.push(usage.clone());
            }
        }
        // `snapshot` is already ranked most-used-first; `under` therefore
        // collects in descending order among itself. Reverse so FindTarget
        // sees least-used first.
        under.reverse();

        let bytes_over: u64 = over
            .iter()
            .map(|u| bytes_over_upper_limit(u.capacity, u.utilization(), upper_limit))
            .sum();
        self.metrics
            .record_unbalanced((over.len() + under.len()) as u64, bytes_over);

        if over.is_empty() && under.is_empty() {
            info!("cluster within threshold; nothing to balance");
            return IterationResult::CannotBalance;
        }

        let total_nodes = snapshot.len();
        let max_datanodes = (config.max_datanodes_ratio_to_involve_per_iteration * total_nodes as f64)
            .floor() as usize;

        let mut source_selector = SourceSelector::new(over, upper_limit, config.max_size_leaving_source);
        let mut target_selector: Box<dyn TargetSelector> = if config.network_topology_enable {
            Box::new(TopologyTargetSelector::new(
                under,
                upper_limit,
                config.max_size_entering_target,
                Arc::clone(&self.topology),
            ))
        } else {
            Box::new(UsageTargetSelector::new(under, upper_limit, config.max_size_entering_target))
        };

        let mut selected_containers = HashSet::new();
        let mut involved_nodes = HashSet::new();
        let mut size_moved: u64 = 0;
        let mut submitted = 0usize;

        loop {
            if !running.load(Ordering::SeqCst) {
                return IterationResult::Interrupted;
            }
            if involved_nodes.len() + 2 > max_datanodes {
                break;
            }
            if size_moved.saturating_add(config.container_size_bytes) > config.max_size_to_move_per_iteration {
                break;
            }

            let Some(source) = source_selector.next_candidate().cloned() else {
                break;
            };

            let candidates = self
                .container_selector
                .candidate_containers(&source.node_id, &selected_containers)
                .await;
            if candidates.is_empty() {
                source_selector.remove_candidate(&source.node_id);
                continue;
            }

            let Some(selection) = target_selector.find_target_for_container_move(
                &source.node_id,
                &candidates,
                self.placement_policy.as_ref(),
            ) else {
                source_selector.remove_candidate(&source.node_id);
                continue;
            };

            let container = candidates
                .iter()
                .find(|c| c.id == selection.container_id)
                .expect("FindTarget only returns containers from the candidate list");

            selected_containers.insert(selection.container_id.clone());
            involved_nodes.insert(source.node_id.clone());
            involved_nodes.insert(selection.target.clone());
            source_selector.increase_leaving(&source, container.used_bytes);
            size_moved += container.used_bytes;
            self.metrics
                .record_scheduled(involved_nodes.len() as u64, size_moved);

            self.move_tracker
                .submit(selection.container_id.clone(), source.node_id.clone(), selection.target.clone());
            submitted += 1;
        }

        if submitted == 0 {
            return IterationResult::CannotBalance;
        }

        let outcomes = self.move_tracker.await_all(config.move_timeout).await;
        for outcome in outcomes.values() {
            self.metrics.record_outcome(outcome);
        }
        info!(submitted, size_moved, "iteration completed");

        IterationResult::Completed
    }
}
