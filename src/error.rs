//! Error types for the container balancer.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BalancerError>;

/// Errors the balancer surfaces to its caller.
///
/// Conditions that the control loop merely logs and works around (a missing
/// container, a single failed move) are not represented here. This enum is
/// reserved for conditions that stop the service or reject a lifecycle call
/// outright.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// `startBalancer` was called while the balancer was already running.
    #[error("balancer is already running")]
    AlreadyRunning,

    /// The surrounding cluster-manager context reports this instance is not
    /// the leader, or leadership is not yet settled.
    #[error("not leader or leader status not yet ready")]
    NotLeader,

    /// The cluster is in safe mode; writes (including balancing) are forbidden.
    #[error("cluster is in safe mode")]
    SafeMode,

    /// Configuration failed validation; `constraint` names what was violated.
    #[error("invalid configuration: {constraint}")]
    InvalidConfig {
        /// Human-readable description of the violated constraint.
        constraint: String,
    },
}

impl BalancerError {
    /// Build an [`BalancerError::InvalidConfig`] from a constraint description.
    pub fn invalid_config(constraint: impl Into<String>) -> Self {
        Self::InvalidConfig {
            constraint: constraint.into(),
        }
    }
}
