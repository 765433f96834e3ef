//! Price aggregation
//!
//! Features:
//! - Mean reduction of fresh, whitelisted samples per symbol
//! - Token and fiat aggregators writing one transactional batch per cycle
//! - Interval-driven worker with heartbeats, ready for supervision

pub mod aggregator;
pub mod reducer;
pub mod worker;

pub use aggregator::{PriceAggregator, Reduce};
pub use reducer::{mean, MeanReducer};
pub use worker::{run_worker, AggregationWorker};
