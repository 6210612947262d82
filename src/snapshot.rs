//! C1 — usage snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::NodeManager;
use crate::concurrency::cancellable_sleep;
use crate::types::NodeUsage;

/// Produces a ranked, filtered view of node usage for one iteration.
pub struct UsageSnapshotProvider {
    node_manager: Arc<dyn NodeManager>,
    include_nodes: std::collections::HashSet<String>,
    exclude_nodes: std::collections::HashSet<String>,
}

impl UsageSnapshotProvider {
    /// Build a provider backed by `node_manager`, applying the configured
    /// include/exclude hostname-or-IP filters.
    pub fn new(
        node_manager: Arc<dyn NodeManager>,
        include_nodes: std::collections::HashSet<String>,
        exclude_nodes: std::collections::HashSet<String>,
    ) -> Self {
        Self {
            node_manager,
            include_nodes,
            exclude_nodes,
        }
    }

    /// Take a fresh, filtered, most-used-first snapshot.
    ///
    /// If `trigger_refresh` is set, asks every node to recompute usage and
    /// waits `3 * node_report_interval` (cancellably) before reading it
    /// back — one interval to dispatch, one to run, one to report.
    /// Returns an empty list if the node manager yields nothing.
    pub async fn snapshot(
        &self,
        trigger_refresh: bool,
        node_report_interval: Duration,
        cancel: &CancellationToken,
    ) -> Vec<NodeUsage> {
        if trigger_refresh {
            self.node_manager.refresh_all_healthy_node_usage().await;
            let completed = cancellable_sleep(node_report_interval * 3, cancel).await;
            if !completed {
                debug!("disk-usage refresh wait cancelled; snapshotting with whatever is available");
            }
        }

        let mut usages = self.node_manager.most_used_first().await;
        usages.retain(|usage| self.is_eligible(usage));
        usages.sort_by(|a, b| {
            b.utilization()
                .partial_cmp(&a.utilization())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        usages
    }

    fn is_eligible(&self, usage: &NodeUsage) -> bool {
        let matches = |set: &std::collections::HashSet<String>| {
            set.contains(&usage.hostname) || set.contains(&usage.address.to_string())
        };
        if matches(&self.exclude_nodes) {
            return false;
        }
        if !self.include_nodes.is_empty() && !matches(&self.include_nodes) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeNodeManager {
        usages: Vec<NodeUsage>,
        refresh_calls: AtomicUsize,
    }

    #[async_trait]
    impl NodeManager for FakeNodeManager {
        async fn most_used_first(&self) -> Vec<NodeUsage> {
            self.usages.clone()
        }

        async fn refresh_all_healthy_node_usage(&self) {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        }

        async fn exists(&self, node: &crate::types::NodeId) -> bool {
            self.usages.iter().any(|u| &u.node_id == node)
        }
    }

    fn usage(id: &str, hostname: &str, capacity: u64, remaining: u64) -> NodeUsage {
        NodeUsage::new(
            id.into(),
            hostname,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            capacity,
            capacity - remaining,
            remaining,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn filters_excluded_nodes_and_ranks_most_used_first() {
        let manager = Arc::new(FakeNodeManager {
            usages: vec![
                usage("a", "host-a", 100, 80),
                usage("b", "host-b", 100, 10),
                usage("c", "host-c", 100, 50),
            ],
            refresh_calls: AtomicUsize::new(0),
        });
        let mut exclude = std::collections::HashSet::new();
        exclude.insert("host-a".to_string());

        let provider = UsageSnapshotProvider::new(manager, std::collections::HashSet::new(), exclude);
        let cancel = CancellationToken::new();
        let snap = provider.snapshot(false, Duration::from_secs(1), &cancel).await;

        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].node_id.as_str(), "b");
        assert_eq!(snap[1].node_id.as_str(), "c");
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_refresh_calls_refresh_and_waits() {
        let manager = Arc::new(FakeNodeManager {
            usages: vec![usage("a", "host-a", 100, 50)],
            refresh_calls: AtomicUsize::new(0),
        });
        let provider = UsageSnapshotProvider::new(
            manager.clone(),
            std::collections::HashSet::new(),
            std::collections::HashSet::new(),
        );
        let cancel = CancellationToken::new();
        let snap = provider
            .snapshot(true, Duration::from_millis(10), &cancel)
            .await;

        assert_eq!(manager.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(snap.len(), 1);
    }
}
