//! Balancer metrics: counters and per-iteration gauges.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and gauges surfaced by the balancer.
///
/// Counters accumulate across the service's lifetime. Fields suffixed
/// `_latest` and the two gauges are reset at the start of every iteration
/// by [`BalancerMetrics::begin_iteration`]. Byte-denominated values are
/// stored as raw bytes internally and converted to GB on read, so the
/// counters themselves stay exact integers.
#[derive(Debug, Default)]
pub struct BalancerMetrics {
    num_iterations: AtomicU64,
    num_container_moves_completed: AtomicU64,
    num_container_moves_timeout: AtomicU64,
    num_container_moves_completed_latest: AtomicU64,
    num_container_moves_timeout_latest: AtomicU64,
    num_datanodes_involved_latest: AtomicU64,
    data_size_moved_bytes: AtomicU64,
    data_size_moved_bytes_latest: AtomicU64,
    num_datanodes_unbalanced: AtomicU64,
    data_size_unbalanced_bytes: AtomicU64,
}

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

impl BalancerMetrics {
    /// Construct a fresh, zeroed metrics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-iteration counters and gauges. Call at iteration entry.
    pub fn begin_iteration(&self) {
        self.num_container_moves_completed_latest
            .store(0, Ordering::Relaxed);
        self.num_container_moves_timeout_latest
            .store(0, Ordering::Relaxed);
        self.num_datanodes_involved_latest
            .store(0, Ordering::Relaxed);
        self.data_size_moved_bytes_latest.store(0, Ordering::Relaxed);
        self.num_datanodes_unbalanced.store(0, Ordering::Relaxed);
        self.data_size_unbalanced_bytes.store(0, Ordering::Relaxed);
        self.num_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the classification gauges for the current iteration.
    pub fn record_unbalanced(&self, num_datanodes: u64, bytes_over_limit: u64) {
        self.num_datanodes_unbalanced
            .store(num_datanodes, Ordering::Relaxed);
        self.data_size_unbalanced_bytes
            .store(bytes_over_limit, Ordering::Relaxed);
    }

    /// Record the cumulative `datanodesInvolved`/`sizeMoved` counters for the
    /// iteration in progress. `size_moved_so_far` is the iteration's running
    /// total, not a delta; the lifetime counter is advanced by the
    /// difference from the previous call.
    pub fn record_scheduled(&self, datanodes_involved: u64, size_moved_so_far: u64) {
        self.num_datanodes_involved_latest
            .store(datanodes_involved, Ordering::Relaxed);
        let previous = self
            .data_size_moved_bytes_latest
            .swap(size_moved_so_far, Ordering::Relaxed);
        let delta = size_moved_so_far.saturating_sub(previous);
        self.data_size_moved_bytes.fetch_add(delta, Ordering::Relaxed);
    }

    /// Record the outcome of one resolved move.
    pub fn record_outcome(&self, outcome: &crate::types::MoveOutcome) {
        use crate::types::MoveOutcome::*;
        match outcome {
            Completed => {
                self.num_container_moves_completed
                    .fetch_add(1, Ordering::Relaxed);
                self.num_container_moves_completed_latest
                    .fetch_add(1, Ordering::Relaxed);
            }
            TimedOut => {
                self.num_container_moves_timeout
                    .fetch_add(1, Ordering::Relaxed);
                self.num_container_moves_timeout_latest
                    .fetch_add(1, Ordering::Relaxed);
            }
            Failed(_) | Cancelled | Replaced | PlacementInvalid => {}
        }
    }

    /// Total iterations run.
    pub fn num_iterations(&self) -> u64 {
        self.num_iterations.load(Ordering::Relaxed)
    }

    /// Total completed moves across the service's lifetime.
    pub fn num_container_moves_completed(&self) -> u64 {
        self.num_container_moves_completed.load(Ordering::Relaxed)
    }

    /// Total timed-out moves across the service's lifetime.
    pub fn num_container_moves_timeout(&self) -> u64 {
        self.num_container_moves_timeout.load(Ordering::Relaxed)
    }

    /// Completed moves in the most recent iteration.
    pub fn num_container_moves_completed_latest(&self) -> u64 {
        self.num_container_moves_completed_latest
            .load(Ordering::Relaxed)
    }

    /// Timed-out moves in the most recent iteration.
    pub fn num_container_moves_timeout_latest(&self) -> u64 {
        self.num_container_moves_timeout_latest
            .load(Ordering::Relaxed)
    }

    /// Distinct nodes involved in the most recent iteration.
    pub fn num_datanodes_involved_latest(&self) -> u64 {
        self.num_datanodes_involved_latest.load(Ordering::Relaxed)
    }

    /// Total bytes moved across the service's lifetime, in GB.
    pub fn data_size_moved_gb(&self) -> f64 {
        self.data_size_moved_bytes.load(Ordering::Relaxed) as f64 / BYTES_PER_GB
    }

    /// Bytes moved in the most recent iteration, in GB.
    pub fn data_size_moved_gb_latest(&self) -> f64 {
        self.data_size_moved_bytes_latest.load(Ordering::Relaxed) as f64 / BYTES_PER_GB
    }

    /// Nodes currently classified as unbalanced (gauge, most recent iteration).
    pub fn num_datanodes_unbalanced(&self) -> u64 {
        self.num_datanodes_unbalanced.load(Ordering::Relaxed)
    }

    /// Bytes over the balanced band, summed across unbalanced nodes, in GB
    /// (gauge, most recent iteration).
    pub fn data_size_unbalanced_gb(&self) -> f64 {
        self.data_size_unbalanced_bytes.load(Ordering::Relaxed) as f64 / BYTES_PER_GB
    }
}
