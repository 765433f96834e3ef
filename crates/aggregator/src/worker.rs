//! Aggregation worker
//!
//! Runs a [`Reduce`] step every fetch interval and pulses a heartbeat every
//! pulse interval until cancelled. Failed cycles are reported on the error
//! stream and the loop keeps going; deciding to restart is the supervisor's
//! job.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use oracle_core::{parse_interval, AggregationError};
use oracle_daemon::{worker_channels, CancelToken, WorkerFactory, WorkerStreams};

use crate::aggregator::Reduce;

/// Factory for aggregation workers; every start builds a fresh loop.
#[derive(Clone)]
pub struct AggregationWorker {
    name: Arc<str>,
    fetch_interval: String,
    reducer: Arc<dyn Reduce>,
}

impl AggregationWorker {
    pub fn new(
        name: impl Into<Arc<str>>,
        fetch_interval: impl Into<String>,
        reducer: Arc<dyn Reduce>,
    ) -> Self {
        Self {
            name: name.into(),
            fetch_interval: fetch_interval.into(),
            reducer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl WorkerFactory<AggregationError> for AggregationWorker {
    fn start(&self, done: CancelToken, pulse_interval: Duration) -> WorkerStreams<AggregationError> {
        run_worker(
            Arc::clone(&self.name),
            done,
            pulse_interval,
            &self.fetch_interval,
            Arc::clone(&self.reducer),
        )
    }
}

/// Start one aggregation loop and return its streams.
///
/// A malformed `fetch_interval` is reported once on the error stream, after
/// which both streams close without any reduction having run.
pub fn run_worker(
    name: Arc<str>,
    done: CancelToken,
    pulse_interval: Duration,
    fetch_interval: &str,
    reducer: Arc<dyn Reduce>,
) -> WorkerStreams<AggregationError> {
    let (heartbeat, error_tx, streams) = worker_channels(Arc::clone(&name));

    let fetch_every = match parse_interval(fetch_interval) {
        Ok(every) => every,
        Err(e) => {
            error!("Worker {} cannot start: {}", name, e);
            // Fresh single-slot channel, so this cannot be full.
            let _ = error_tx.try_send(AggregationError::from(e));
            return streams;
        }
    };

    tokio::spawn(async move {
        info!(
            "Worker {} started (fetch every {:?}, pulse every {:?})",
            name, fetch_every, pulse_interval
        );

        let mut fetch = interval_at(Instant::now() + fetch_every, fetch_every);
        fetch.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pulse = interval(pulse_interval);
        pulse.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = done.cancelled() => break,

                _ = pulse.tick() => {
                    heartbeat.pulse();
                }

                _ = fetch.tick() => {
                    let outcome = tokio::select! {
                        biased;
                        _ = done.cancelled() => break,
                        outcome = reducer.reduce() => outcome,
                    };

                    match outcome {
                        Ok(written) => debug!("Worker {} wrote {} prices", name, written),
                        Err(e) => {
                            warn!("Worker {} cycle failed: {}", name, e);
                            tokio::select! {
                                biased;
                                _ = done.cancelled() => break,
                                sent = error_tx.send(e) => {
                                    if sent.is_err() {
                                        debug!("Error stream of {} has no consumer", name);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        debug!("Worker {} stopped", name);
    });

    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oracle_core::{
        AggregateKind, AggregationResult, AggregatorSettings, ConfigError, StoreError, Whitelist,
    };
    use oracle_daemon::{RecoveryBudget, Supervisor, SupervisorError, SupervisorExit};
    use oracle_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::aggregator::PriceAggregator;

    const PULSE: Duration = Duration::from_millis(100);

    struct CountingReducer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingReducer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Reduce for CountingReducer {
        async fn reduce(&self) -> AggregationResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StoreError::Database("connection reset".to_string()).into())
            } else {
                Ok(1)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reduces_once_per_fetch_interval() {
        let reducer = CountingReducer::new(false);
        let done = CancelToken::new();
        let mut streams = run_worker("token".into(), done.clone(), PULSE, "1s", reducer.clone());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(reducer.calls(), 3);

        let beat = streams.heartbeats.recv().await.unwrap();
        assert_eq!(beat.source(), "token");

        done.cancel();
        assert!(streams.errors.recv().await.is_none());
        while streams.heartbeats.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_are_reported_and_loop_continues() {
        let reducer = CountingReducer::new(true);
        let done = CancelToken::new();
        let mut streams = run_worker("fiat".into(), done.clone(), PULSE, "500ms", reducer.clone());

        for _ in 0..3 {
            let err = streams.errors.recv().await.unwrap();
            assert!(matches!(err, AggregationError::Store(StoreError::Database(_))));
        }
        assert!(reducer.calls() >= 3);

        done.cancel();
        while streams.errors.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_interval_reports_once_and_closes() {
        let reducer = CountingReducer::new(false);
        let mut streams = run_worker("token".into(), CancelToken::new(), PULSE, "5 parsecs", reducer.clone());

        let err = streams.errors.recv().await.unwrap();
        assert!(matches!(
            err,
            AggregationError::Config(ConfigError::InvalidInterval { .. })
        ));
        assert!(streams.errors.recv().await.is_none());
        assert!(streams.heartbeats.recv().await.is_none());
        assert_eq!(reducer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_streams() {
        let reducer = CountingReducer::new(false);
        let done = CancelToken::new();
        let mut streams = run_worker("token".into(), done.clone(), PULSE, "1s", reducer.clone());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        done.cancel();

        while streams.heartbeats.recv().await.is_some() {}
        assert!(streams.errors.recv().await.is_none());

        let calls = reducer.calls();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reducer.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervised_worker_against_lost_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_whitelist(AggregateKind::Token, Whitelist::new(["ATOM"]));
        store.set_available(false);

        let aggregator = PriceAggregator::new(
            AggregateKind::Token,
            &AggregatorSettings::token_defaults(),
            store,
        );
        let worker = AggregationWorker::new("token", "200ms", Arc::new(aggregator));

        let mut handle = Supervisor::new("token", worker)
            .pulse_interval(PULSE)
            .timeout(Duration::from_secs(1))
            .recovery_budget(RecoveryBudget::new(2))
            .spawn::<AggregationError>(CancelToken::new());

        let mut errors = Vec::new();
        while let Some(err) = handle.errors.recv().await {
            errors.push(err);
        }

        assert_eq!(errors.len(), 2);
        for err in &errors {
            assert_eq!(err.worker(), "token");
            assert!(matches!(
                err,
                SupervisorError::Worker {
                    source: AggregationError::Store(_),
                    ..
                }
            ));
        }
        assert_eq!(handle.task.await.unwrap(), SupervisorExit::BudgetExhausted);
    }
}
