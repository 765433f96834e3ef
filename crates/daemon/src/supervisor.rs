//! Supervisor: keeps one worker alive
//!
//! The supervisor starts a worker through its factory and then serializes
//! every observation through a single monitoring loop:
//! - a worker heartbeat or fatal error resets the liveness window
//! - a fatal error restarts the worker while the recovery budget allows,
//!   otherwise the supervisor terminates
//! - an elapsed liveness window emits [`SupervisorError::WorkerRestarted`]
//!   and restarts the worker; this does not spend the budget
//! - cancellation of `done` terminates immediately
//!
//! Termination closes both output streams for good.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::budget::{RecoveryBudget, RestartDecision};
use crate::cancel::CancelToken;
use crate::heartbeat::Heartbeat;
use crate::worker::{WorkerFactory, WorkerStreams};

/// Buffered supervisor errors before emission waits on the consumer
const ERROR_BUFFER: usize = 16;

/// Errors surfaced on the supervisor's error stream
#[derive(Debug, Error)]
pub enum SupervisorError<E> {
    /// No worker signal within the liveness window
    #[error("worker {worker} not responsive; restarted")]
    WorkerRestarted { worker: String },

    /// Fatal error forwarded from the worker
    #[error("worker {worker} failed: {source}")]
    Worker {
        worker: String,
        #[source]
        source: E,
    },
}

impl<E> SupervisorError<E> {
    pub fn worker(&self) -> &str {
        match self {
            SupervisorError::WorkerRestarted { worker } => worker,
            SupervisorError::Worker { worker, .. } => worker,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SupervisorError::WorkerRestarted { .. })
    }
}

/// Why a supervisor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    Cancelled,
    BudgetExhausted,
}

/// Output of a running supervisor
#[derive(Debug)]
pub struct SupervisorHandle<E> {
    pub heartbeats: mpsc::Receiver<Heartbeat>,
    pub errors: mpsc::Receiver<SupervisorError<E>>,
    pub task: JoinHandle<SupervisorExit>,
}

/// Supervisor for one worker kind
pub struct Supervisor<F> {
    name: Arc<str>,
    factory: F,
    pulse_interval: Duration,
    timeout: Duration,
    budget: RecoveryBudget,
}

impl<F> Supervisor<F> {
    pub fn new(name: impl Into<Arc<str>>, factory: F) -> Self {
        Self {
            name: name.into(),
            factory,
            pulse_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            budget: RecoveryBudget::unbounded(),
        }
    }

    pub fn pulse_interval(mut self, pulse_interval: Duration) -> Self {
        self.pulse_interval = pulse_interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn recovery_budget(mut self, budget: impl Into<RecoveryBudget>) -> Self {
        self.budget = budget.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start supervising. The supervisor stops when `done` is cancelled or
    /// the recovery budget runs out.
    pub fn spawn<E>(self, done: CancelToken) -> SupervisorHandle<E>
    where
        F: WorkerFactory<E>,
        E: fmt::Display + Send + 'static,
    {
        let (heartbeat_tx, heartbeats) = mpsc::channel(1);
        let (error_tx, errors) = mpsc::channel(ERROR_BUFFER);

        let monitor = Monitor {
            name: self.name,
            factory: self.factory,
            pulse_interval: self.pulse_interval,
            timeout: self.timeout,
            budget: self.budget,
            done,
            restarts: 0,
            heartbeats: heartbeat_tx,
            errors: error_tx,
        };

        SupervisorHandle {
            heartbeats,
            errors,
            task: tokio::spawn(monitor.run()),
        }
    }
}

/// Supervisor pulse period: twice the worker's plus 5-10% jitter, so the
/// two never tick in lockstep.
pub fn supervisor_pulse_period(pulse_interval: Duration) -> Duration {
    let fraction = rand::thread_rng().gen_range(0.05..=0.10);
    pulse_interval * 2 + pulse_interval.mul_f64(fraction)
}

struct RunningWorker<E> {
    cancel: CancelToken,
    streams: WorkerStreams<E>,
    heartbeats_open: bool,
    errors_open: bool,
}

impl<E> Drop for RunningWorker<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Monitoring loop state; only the loop touches it.
struct Monitor<F, E> {
    name: Arc<str>,
    factory: F,
    pulse_interval: Duration,
    timeout: Duration,
    budget: RecoveryBudget,
    done: CancelToken,
    restarts: u64,
    heartbeats: mpsc::Sender<Heartbeat>,
    errors: mpsc::Sender<SupervisorError<E>>,
}

impl<F, E> Monitor<F, E>
where
    F: WorkerFactory<E>,
    E: fmt::Display + Send + 'static,
{
    fn launch(&self) -> RunningWorker<E> {
        let cancel = CancelToken::new();
        let scope = CancelToken::any_of([&self.done, &cancel]);
        let streams = self.factory.start(scope, self.pulse_interval);

        RunningWorker {
            cancel,
            streams,
            heartbeats_open: true,
            errors_open: true,
        }
    }

    fn relaunch(&mut self, worker: RunningWorker<E>) -> RunningWorker<E> {
        drop(worker);
        self.restarts += 1;
        info!(
            "Restarting worker {} (restart #{}, budget: {})",
            self.name, self.restarts, self.budget
        );
        self.launch()
    }

    /// Returns false if `done` fired while waiting on the consumer.
    async fn emit(&self, err: SupervisorError<E>) -> bool {
        tokio::select! {
            biased;
            _ = self.done.cancelled() => false,
            sent = self.errors.send(err) => {
                if sent.is_err() {
                    debug!("Error stream of {} has no consumer", self.name);
                }
                true
            }
        }
    }

    async fn run(mut self) -> SupervisorExit {
        let done = self.done.clone();
        if done.is_cancelled() {
            return SupervisorExit::Cancelled;
        }

        let mut worker = self.launch();
        info!(
            "Supervising worker {} (pulse: {:?}, timeout: {:?}, budget: {})",
            self.name, self.pulse_interval, self.timeout, self.budget
        );

        let period = supervisor_pulse_period(self.pulse_interval);
        let mut pulse = tokio::time::interval_at(Instant::now() + period, period);
        pulse.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = done.cancelled() => {
                    info!("Supervisor for {} cancelled", self.name);
                    return SupervisorExit::Cancelled;
                }

                beat = worker.streams.heartbeats.recv(), if worker.heartbeats_open => match beat {
                    Some(_) => deadline.as_mut().reset(Instant::now() + self.timeout),
                    None => {
                        debug!("Heartbeat stream of {} closed", self.name);
                        worker.heartbeats_open = false;
                    }
                },

                failure = worker.streams.errors.recv(), if worker.errors_open => match failure {
                    Some(source) => {
                        if self.budget.on_fatal_error() == RestartDecision::GiveUp {
                            error!(
                                "Worker {} failed with recovery budget exhausted: {}",
                                self.name, source
                            );
                            return SupervisorExit::BudgetExhausted;
                        }

                        warn!("Worker {} failed: {}", self.name, source);
                        let forwarded = SupervisorError::Worker {
                            worker: self.name.to_string(),
                            source,
                        };
                        if !self.emit(forwarded).await {
                            return SupervisorExit::Cancelled;
                        }
                        worker = self.relaunch(worker);
                        // Emission may have waited on the consumer; the new
                        // worker gets a full window.
                        deadline.as_mut().reset(Instant::now() + self.timeout);
                    }
                    None => {
                        debug!("Error stream of {} closed", self.name);
                        worker.errors_open = false;
                    }
                },

                _ = &mut deadline => {
                    warn!(
                        "Worker {} sent no signal within {:?}",
                        self.name, self.timeout
                    );
                    let restarted = SupervisorError::WorkerRestarted {
                        worker: self.name.to_string(),
                    };
                    if !self.emit(restarted).await {
                        return SupervisorExit::Cancelled;
                    }
                    worker = self.relaunch(worker);
                    deadline.as_mut().reset(Instant::now() + self.timeout);
                }

                _ = pulse.tick() => {
                    let _ = self.heartbeats.try_send(Heartbeat::new(&self.name));
                }
            }
        }
    }
}
