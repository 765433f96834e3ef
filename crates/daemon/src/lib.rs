//! Worker supervision
//!
//! Runs a long-lived worker, watches its heartbeats and fatal errors, and
//! restarts it on timeout or failure within a recovery budget:
//! - Broadcast cancellation derived from any number of parents
//! - Non-blocking heartbeats
//! - Bounded, unbounded or disabled recovery

pub mod budget;
pub mod cancel;
pub mod heartbeat;
pub mod supervisor;
pub mod worker;

pub use budget::{RecoveryBudget, RestartDecision};
pub use cancel::CancelToken;
pub use heartbeat::{heartbeat_channel, Heartbeat, HeartbeatSender};
pub use supervisor::{Supervisor, SupervisorError, SupervisorExit, SupervisorHandle};
pub use worker::{worker_channels, WorkerFactory, WorkerStreams};
