//! Persistence for samples and aggregated prices
//!
//! Features:
//! - Store port shared by the aggregators and the query layer
//! - Concurrent in-memory store
//! - PostgreSQL store with transactional upserts
//! - TTL read-through cache for hot query shapes

pub mod cache;
pub mod memory;
pub mod pool;
pub mod port;
pub mod postgres;

pub use cache::{CacheStats, TtlCache};
pub use memory::{MemoryStore, MemoryStoreStats};
pub use pool::{create_pool, DbPoolConfig};
pub use port::PriceStore;
pub use postgres::PgStore;
