//! Contract between a supervisor and the workers it runs
//!
//! A worker is started with a cancellation token and a pulse interval and
//! hands back a heartbeat stream and a fatal-error stream. The worker owns
//! the sending halves and closes both, once, when it exits.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::heartbeat::{heartbeat_channel, Heartbeat, HeartbeatSender};

/// Receiving side of a running worker
#[derive(Debug)]
pub struct WorkerStreams<E> {
    pub heartbeats: mpsc::Receiver<Heartbeat>,
    pub errors: mpsc::Receiver<E>,
}

/// Builds a fresh worker on every call; no state survives a restart.
pub trait WorkerFactory<E>: Send + Sync + 'static {
    fn start(&self, done: CancelToken, pulse_interval: Duration) -> WorkerStreams<E>;
}

impl<E, F> WorkerFactory<E> for F
where
    F: Fn(CancelToken, Duration) -> WorkerStreams<E> + Send + Sync + 'static,
{
    fn start(&self, done: CancelToken, pulse_interval: Duration) -> WorkerStreams<E> {
        self(done, pulse_interval)
    }
}

/// Channels for a worker implementation: its heartbeat sender, its error
/// sender, and the streams to return to the supervisor.
pub fn worker_channels<E>(
    name: impl Into<Arc<str>>,
) -> (HeartbeatSender, mpsc::Sender<E>, WorkerStreams<E>) {
    let (heartbeat_tx, heartbeats) = heartbeat_channel(name);
    let (error_tx, errors) = mpsc::channel(1);
    (heartbeat_tx, error_tx, WorkerStreams { heartbeats, errors })
}
