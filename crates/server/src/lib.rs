//! Price oracle service
//!
//! Wires the aggregation core into a running process:
//! - Orchestrator supervising the token and fiat workers
//! - Cached price query service with request limits and whitelist checks

pub mod orchestrator;
pub mod service;

pub use orchestrator::{Orchestrator, Shutdown};
pub use service::{ApiResponse, PriceService, ResponseStatus};
