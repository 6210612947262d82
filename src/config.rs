//! Balancer configuration.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BalancerError, Result};

/// Full configuration for one [`crate::ContainerBalancer`] instance.
///
/// Call [`BalancerConfig::validate`] before use — `start_balancer` does
/// this automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Half-width of the balanced band around cluster average utilization.
    pub threshold: f64,
    /// Maximum iterations to run; `-1` for unbounded.
    pub iterations: i64,
    /// Caps `datanodesInvolved` to this fraction of total nodes.
    pub max_datanodes_ratio_to_involve_per_iteration: f64,
    /// Caps total bytes scheduled per iteration.
    pub max_size_to_move_per_iteration: u64,
    /// Per-target cap on bytes entering per iteration.
    pub max_size_entering_target: u64,
    /// Per-source cap on bytes leaving per iteration.
    pub max_size_leaving_source: u64,
    /// Sleep between iterations.
    pub balancing_interval: Duration,
    /// Deadline for `awaitAll` at the end of an iteration.
    pub move_timeout: Duration,
    /// If set, force disk-usage recomputation before each iteration.
    pub trigger_du_enable: bool,
    /// Selects the topology-aware FindTarget variant when set.
    pub network_topology_enable: bool,
    /// Hostname/IP allowlist; empty means "no restriction".
    pub include_nodes: HashSet<String>,
    /// Hostname/IP denylist.
    pub exclude_nodes: HashSet<String>,
    /// Period nodes use to report usage; feeds the disk-refresh wait.
    pub node_report_interval: Duration,
    /// Fixed maximum size of one container.
    pub container_size_bytes: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            iterations: -1,
            max_datanodes_ratio_to_involve_per_iteration: 0.2,
            max_size_to_move_per_iteration: 500 * 1024 * 1024 * 1024, // 500 GB
            max_size_entering_target: 50 * 1024 * 1024 * 1024,       // 50 GB
            max_size_leaving_source: 50 * 1024 * 1024 * 1024,        // 50 GB
            balancing_interval: Duration::from_secs(10 * 60),
            move_timeout: Duration::from_secs(65 * 60),
            trigger_du_enable: false,
            network_topology_enable: false,
            include_nodes: HashSet::new(),
            exclude_nodes: HashSet::new(),
            node_report_interval: Duration::from_secs(60),
            container_size_bytes: 5 * 1024 * 1024 * 1024, // 5 GB
        }
    }
}

impl BalancerConfig {
    /// Validate this configuration.
    ///
    /// Hard constraints return `Err`; the `balancing_interval` vs.
    /// disk-refresh-period relationship is a soft constraint and only logs a
    /// warning.
    pub fn validate(&self) -> Result<()> {
        if self.threshold < 0.0 {
            return Err(BalancerError::invalid_config("threshold must be >= 0"));
        }
        if self.max_size_entering_target <= self.container_size_bytes {
            return Err(BalancerError::invalid_config(
                "maxSizeEnteringTarget must exceed containerSizeBytes",
            ));
        }
        if self.max_size_leaving_source <= self.container_size_bytes {
            return Err(BalancerError::invalid_config(
                "maxSizeLeavingSource must exceed containerSizeBytes",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_datanodes_ratio_to_involve_per_iteration) {
            return Err(BalancerError::invalid_config(
                "maxDatanodesRatioToInvolvePerIteration must be within [0, 1]",
            ));
        }
        if self.iterations < -1 {
            return Err(BalancerError::invalid_config(
                "iterations must be -1 (unbounded) or >= 0",
            ));
        }

        let disk_refresh_period = self.node_report_interval * 3;
        if self.trigger_du_enable && self.balancing_interval <= disk_refresh_period {
            warn!(
                balancing_interval = ?self.balancing_interval,
                disk_refresh_period = ?disk_refresh_period,
                "balancingInterval does not exceed the disk-usage refresh period; \
                 iterations may overlap with a stale-usage wait",
            );
        }

        Ok(())
    }
}
