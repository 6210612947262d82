//! Container balancer: a control loop that moves storage containers from
//! over-utilized data nodes to under-utilized ones until the cluster sits
//! within a configured utilization band.
//!
//! The crate is organized around the seven pieces of the control loop: a
//! usage snapshot ([`snapshot`]), container selection criteria
//! ([`selection`]), a source-picking strategy ([`source`]), a
//! target-picking strategy ([`target`]), an asynchronous move tracker
//! ([`move_tracker`]), the iteration engine that ties them together
//! ([`iteration`]), and the service lifecycle that drives iterations on a
//! schedule ([`service`]). [`collaborators`] defines the seams the host
//! process implements; everything else here owns its own logic.

mod collaborators;
mod concurrency;
mod config;
mod error;
mod iteration;
mod math;
mod metrics;
mod move_tracker;
mod selection;
mod service;
mod snapshot;
mod source;
mod target;
mod types;

pub use collaborators::{ContainerManager, NetworkTopology, NodeManager, PlacementPolicy, ReplicationManager, ScmContext};
pub use config::BalancerConfig;
pub use error::{BalancerError, Result};
pub use iteration::IterationEngine;
pub use metrics::BalancerMetrics;
pub use service::ContainerBalancer;
pub use source::SourceSelector;
pub use target::{TargetSelector, TopologyTargetSelector, UsageTargetSelector};
pub use types::{
    ContainerId, ContainerInfo, ContainerState, IterationResult, MoveOutcome, MoveSelection,
    NodeId, NodeUsage,
};
