//! C7 — service lifecycle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::collaborators::{ContainerManager, NetworkTopology, NodeManager, PlacementPolicy, ReplicationManager, ScmContext};
use crate::concurrency::cancellable_sleep;
use crate::config::BalancerConfig;
use crate::error::{BalancerError, Result};
use crate::iteration::IterationEngine;
use crate::metrics::BalancerMetrics;
use crate::types::IterationResult;

tokio::task_local! {
    /// Set for the lifetime of the worker task so `stop_balancer` can tell
    /// whether it is being called from inside the worker itself.
    static IS_WORKER: bool;
}

enum ServiceState {
    Stopped,
    Running {
        cancel: CancellationToken,
        running: Arc<AtomicBool>,
        worker: JoinHandle<()>,
    },
}

/// The state and collaborators shared between `ContainerBalancer`'s public
/// handle and its own worker task, so the worker can transition the
/// lifecycle state machine back to `Stopped` itself when it exits on its
/// own — finished its iteration budget, or failed its own leader/safe-mode
/// precondition check — rather than only ever being stopped from outside.
struct Inner {
    config: ArcSwap<BalancerConfig>,
    engine: Arc<IterationEngine>,
    scm_context: Arc<dyn ScmContext>,
    metrics: Arc<BalancerMetrics>,
    state: Mutex<ServiceState>,
}

impl Inner {
    /// Stop the balancer, as seen from inside the worker task itself: marks
    /// the lifecycle `Stopped` without aborting or joining the handle (the
    /// worker cannot join itself). A no-op if the state has already been
    /// moved to `Stopped` by a concurrent external `stop_balancer` call.
    fn mark_stopped_from_worker(&self) {
        let mut state = self.state.lock();
        if matches!(*state, ServiceState::Running { .. }) {
            *state = ServiceState::Stopped;
        }
    }
}

/// The balancer service: owns the lifecycle state machine and drives the
/// iteration engine from a dedicated worker task.
pub struct ContainerBalancer {
    inner: Arc<Inner>,
}

impl ContainerBalancer {
    /// Build a balancer wired up to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BalancerConfig,
        node_manager: Arc<dyn NodeManager>,
        container_manager: Arc<dyn ContainerManager>,
        replication_manager: Arc<dyn ReplicationManager>,
        placement_policy: Arc<dyn PlacementPolicy>,
        topology: Arc<dyn NetworkTopology>,
        scm_context: Arc<dyn ScmContext>,
    ) -> Self {
        let metrics = Arc::new(BalancerMetrics::new());
        let include_nodes: HashSet<String> = config.include_nodes.iter().cloned().collect();
        let exclude_nodes: HashSet<String> = config.exclude_nodes.iter().cloned().collect();
        let engine = Arc::new(IterationEngine::new(
            node_manager,
            container_manager,
            replication_manager,
            placement_policy,
            topology,
            Arc::clone(&metrics),
            include_nodes,
            exclude_nodes,
        ));
        Self {
            inner: Arc::new(Inner {
                config: ArcSwap::from_pointee(config),
                engine,
                scm_context,
                metrics,
                state: Mutex::new(ServiceState::Stopped),
            }),
        }
    }

    /// The upstream entry point invoked automatically by the surrounding
    /// service manager. Gated on [`Self::should_run`], which currently
    /// always returns `false` — this path is preserved for parity but
    /// never actually starts the worker; operators must call
    /// [`Self::start_balancer`] explicitly. See `DESIGN.md` for the
    /// reasoning behind keeping both paths.
    pub async fn start(&self) -> Result<()> {
        if self.should_run() {
            self.start_balancer().await
        } else {
            Ok(())
        }
    }

    fn should_run(&self) -> bool {
        false
    }

    /// Start the worker, bypassing [`Self::should_run`].
    ///
    /// Fails if already running, if this instance is not leader-ready, if
    /// the cluster is in safe mode, or if the current configuration does
    /// not validate.
    #[instrument(skip(self))]
    pub async fn start_balancer(&self) -> Result<()> {
        let config = self.inner.config.load_full();
        config.validate()?;

        if !self.inner.scm_context.is_leader_ready() {
            return Err(BalancerError::NotLeader);
        }
        if self.inner.scm_context.is_in_safe_mode() {
            return Err(BalancerError::SafeMode);
        }

        let mut state = self.inner.state.lock();
        if matches!(*state, ServiceState::Running { .. }) {
            return Err(BalancerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let worker = tokio::spawn(IS_WORKER.scope(
            true,
            Self::worker_loop(Arc::clone(&self.inner), Arc::clone(&running), cancel.clone()),
        ));

        *state = ServiceState::Running {
            cancel,
            running,
            worker,
        };
        info!("container balancer started");
        Ok(())
    }

    async fn worker_loop(inner: Arc<Inner>, running: Arc<AtomicBool>, cancel: CancellationToken) {
        let mut iterations_run: i64 = 0;
        let exit_result = loop {
            if !running.load(Ordering::SeqCst) {
                break IterationResult::Interrupted;
            }

            let leader_ok = inner.scm_context.is_leader() && inner.scm_context.is_leader_ready();
            if !leader_ok || inner.scm_context.is_in_safe_mode() {
                break IterationResult::PreconditionFailed;
            }

            let current_config = inner.config.load_full();
            let result = inner
                .engine
                .run_iteration(&current_config, &running, &cancel)
                .await;
            if matches!(result, IterationResult::Interrupted) {
                break result;
            }

            iterations_run += 1;
            if current_config.iterations >= 0 && iterations_run >= current_config.iterations {
                break IterationResult::Completed;
            }

            if !cancellable_sleep(current_config.balancing_interval, &cancel).await {
                break IterationResult::Interrupted;
            }
        };

        running.store(false, Ordering::SeqCst);
        info!(result = ?exit_result, "balancer worker exiting");
        // The worker may be exiting for a reason external to `stop_balancer`
        // (iteration budget exhausted, or its own leader/safe-mode check
        // failing) — in that case nothing else will ever move the lifecycle
        // state back to `Stopped`, so the worker does it itself here.
        inner.mark_stopped_from_worker();
    }

    /// Stop the balancer. Idempotent: a second call observes no effect
    /// beyond the first. If called from within the worker task itself,
    /// does not join the worker (that would deadlock).
    #[instrument(skip(self))]
    pub async fn stop_balancer(&self) {
        let (cancel, running, worker) = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, ServiceState::Stopped) {
                ServiceState::Stopped => return,
                ServiceState::Running {
                    cancel,
                    running,
                    worker,
                } => (cancel, running, worker),
            }
        };
        running.store(false, Ordering::SeqCst);
        cancel.cancel();

        let called_from_worker = IS_WORKER.try_with(|flag| *flag).unwrap_or(false);
        if called_from_worker {
            worker.abort();
        } else if let Err(err) = worker.await {
            if !err.is_cancelled() {
                warn!(%err, "balancer worker task panicked");
            }
        }
        info!("container balancer stopped");
    }

    /// Invoked by the surrounding service manager on leadership or
    /// safe-mode transitions. Stops the balancer if it is running and the
    /// transition makes it ineligible to continue.
    pub async fn notify_status_changed(&self) {
        let should_stop = {
            let state = self.inner.state.lock();
            matches!(*state, ServiceState::Running { .. })
                && (!self.inner.scm_context.is_leader() || self.inner.scm_context.is_in_safe_mode())
        };
        if should_stop {
            self.stop_balancer().await;
        }
    }

    /// Replace the active configuration. Takes effect at the start of the
    /// next iteration or worker-loop sleep.
    pub fn update_config(&self, config: BalancerConfig) {
        self.inner.config.store(Arc::new(config));
    }

    /// Whether the worker is currently running.
    pub fn is_running(&self) -> bool {
        matches!(*self.inner.state.lock(), ServiceState::Running { .. })
    }

    /// Access the balancer's metrics.
    pub fn metrics(&self) -> &BalancerMetrics {
        &self.inner.metrics
    }
}
