//! Token and fiat aggregators
//!
//! One reduction cycle: read the whitelist, read every configured vendor
//! table, reduce to one mean per symbol, and upsert the batch in a single
//! store transaction.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use oracle_core::{
    now_secs, AggregateKind, AggregationResult, AggregatorSettings, PriceSource,
};
use oracle_store::PriceStore;

use crate::reducer::MeanReducer;

/// A repeatable reduction step. Holds no state between calls beyond what
/// it persists through the store.
#[async_trait]
pub trait Reduce: Send + Sync {
    /// Run one cycle; returns the number of prices written
    async fn reduce(&self) -> AggregationResult<usize>;
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Mean aggregator for one aggregate kind
pub struct PriceAggregator {
    kind: AggregateKind,
    quote: String,
    sources: Vec<PriceSource>,
    store: Arc<dyn PriceStore>,
    reducer: MeanReducer,
    clock: Clock,
}

impl PriceAggregator {
    pub fn new(kind: AggregateKind, settings: &AggregatorSettings, store: Arc<dyn PriceStore>) -> Self {
        Self {
            kind,
            quote: settings.quote.clone(),
            sources: settings.sources.clone(),
            store,
            reducer: MeanReducer::default(),
            clock: Arc::new(now_secs),
        }
    }

    /// Evaluate freshness against a custom clock (unix seconds)
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_reducer(mut self, reducer: MeanReducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }
}

#[async_trait]
impl Reduce for PriceAggregator {
    async fn reduce(&self) -> AggregationResult<usize> {
        let symbols = self.store.whitelist(self.kind).await?.symbols(&self.quote);
        if symbols.is_empty() {
            debug!("No whitelisted {} symbols, skipping cycle", self.kind);
            return Ok(0);
        }

        let mut samples = Vec::new();
        for source in &self.sources {
            samples.extend(self.store.samples(*source).await?);
        }

        let prices = self.reducer.reduce(&symbols, &samples, (self.clock)());
        if prices.is_empty() {
            debug!(
                "No fresh {} samples among {} whitelisted symbols",
                self.kind,
                symbols.len()
            );
            return Ok(0);
        }

        let written = self.store.upsert_prices(self.kind, &prices).await?;
        debug!(
            "Aggregated {} of {} {} symbols from {} samples",
            written,
            symbols.len(),
            self.kind,
            samples.len()
        );
        Ok(written)
    }
}
