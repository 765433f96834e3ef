//! Liveness signals

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// "I am alive" from a named producer. Carries nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    source: Arc<str>,
    at: Instant,
}

impl Heartbeat {
    pub fn new(source: &Arc<str>) -> Self {
        Self {
            source: Arc::clone(source),
            at: Instant::now(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}

/// Sending half of a heartbeat stream. Pulses never wait for the consumer.
#[derive(Debug, Clone)]
pub struct HeartbeatSender {
    source: Arc<str>,
    tx: mpsc::Sender<Heartbeat>,
}

impl HeartbeatSender {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns false when the pulse was dropped (consumer busy or gone).
    pub fn pulse(&self) -> bool {
        self.tx.try_send(Heartbeat::new(&self.source)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-slot heartbeat channel: an unread pulse makes later ones drop.
pub fn heartbeat_channel(source: impl Into<Arc<str>>) -> (HeartbeatSender, mpsc::Receiver<Heartbeat>) {
    let (tx, rx) = mpsc::channel(1);
    (
        HeartbeatSender {
            source: source.into(),
            tx,
        },
        rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pulse_never_blocks() {
        let (sender, mut rx) = heartbeat_channel("token");

        assert!(sender.pulse());
        assert!(!sender.pulse(), "second pulse should be dropped while the first is unread");

        let beat = rx.recv().await.unwrap();
        assert_eq!(beat.source(), "token");
        assert!(sender.pulse());
    }

    #[tokio::test]
    async fn test_pulse_after_consumer_gone() {
        let (sender, rx) = heartbeat_channel("fiat");
        drop(rx);
        assert!(sender.is_closed());
        assert!(!sender.pulse());
    }
}
