//! Process orchestrator
//!
//! Starts one supervisor per aggregate kind, drains and logs their streams,
//! and decides when a supervisor's termination ends the whole process.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use oracle_aggregator::{AggregationWorker, PriceAggregator};
use oracle_core::{AggregateKind, AggregationError, OracleConfig};
use oracle_daemon::{CancelToken, RecoveryBudget, Supervisor, SupervisorExit, SupervisorHandle};
use oracle_store::PriceStore;

/// How the orchestrator stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// Stopped on request
    Cancelled,
    /// A supervisor gave up on its worker
    BudgetExhausted { worker: String },
    /// A supervisor task panicked
    Crashed { worker: String },
}

impl Shutdown {
    /// Whether the process should exit with a failure status
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Shutdown::Cancelled)
    }
}

/// Runs the token and fiat supervisors against one store
pub struct Orchestrator {
    config: OracleConfig,
    store: Arc<dyn PriceStore>,
}

impl Orchestrator {
    pub fn new(config: OracleConfig, store: Arc<dyn PriceStore>) -> Self {
        Self { config, store }
    }

    fn spawn_supervisor(&self, kind: AggregateKind, done: &CancelToken) -> SupervisorHandle<AggregationError> {
        let settings = self.config.aggregator(kind);
        let aggregator = PriceAggregator::new(kind, settings, Arc::clone(&self.store));
        let worker = AggregationWorker::new(kind.name(), settings.fetch_interval.clone(), Arc::new(aggregator));

        let sup = &self.config.supervisor;
        Supervisor::new(kind.name(), worker)
            .pulse_interval(sup.pulse_interval())
            .timeout(sup.timeout())
            .recovery_budget(RecoveryBudget::new(sup.recovery_budget))
            .spawn(done.child())
    }

    /// Run until `done` is cancelled or a supervisor terminates on its own.
    /// Either way every supervisor is stopped before this returns.
    pub async fn run(&self, done: CancelToken) -> Shutdown {
        let scope = done.child();
        let mut watchers: FuturesUnordered<_> = [AggregateKind::Token, AggregateKind::Fiat]
            .into_iter()
            .map(|kind| watch(kind.name(), self.spawn_supervisor(kind, &scope)))
            .collect();

        info!("Orchestrator started {} supervisors", watchers.len());

        let mut shutdown = Shutdown::Cancelled;
        while let Some((worker, exit)) = watchers.next().await {
            let stopped = match exit {
                Some(SupervisorExit::Cancelled) => continue,
                Some(SupervisorExit::BudgetExhausted) => {
                    error!("Supervisor {} exhausted its recovery budget", worker);
                    Shutdown::BudgetExhausted { worker }
                }
                None => Shutdown::Crashed { worker },
            };

            if !shutdown.is_fatal() {
                warn!("Stopping remaining supervisors");
                shutdown = stopped;
                scope.cancel();
            }
        }

        info!("Orchestrator stopped: {:?}", shutdown);
        shutdown
    }
}

/// Drain one supervisor's streams until it terminates; `None` if its task
/// did not finish cleanly.
async fn watch(
    worker: &'static str,
    mut handle: SupervisorHandle<AggregationError>,
) -> (String, Option<SupervisorExit>) {
    let mut heartbeats_open = true;
    let mut errors_open = true;

    while heartbeats_open || errors_open {
        tokio::select! {
            beat = handle.heartbeats.recv(), if heartbeats_open => match beat {
                Some(beat) => debug!("Heartbeat from supervisor {}", beat.source()),
                None => heartbeats_open = false,
            },
            failure = handle.errors.recv(), if errors_open => match failure {
                Some(e) => error!("Supervisor {}: {}", worker, e),
                None => errors_open = false,
            },
        }
    }

    let exit = match handle.task.await {
        Ok(exit) => Some(exit),
        Err(e) => {
            error!("Supervisor {} task failed: {}", worker, e);
            None
        }
    };
    (worker.to_string(), exit)
}
