//! Store port

use async_trait::async_trait;

use oracle_core::{
    AggregateKind, AggregatedPrice, PriceSample, PriceSource, StoreResult, TokenQuote, Whitelist,
};

/// Persistence contract consumed by the aggregators and the query layer.
/// Every operation may fail; callers treat failures as values.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// All raw samples currently held for one vendor
    async fn samples(&self, source: PriceSource) -> StoreResult<Vec<PriceSample>>;

    /// Tracked base symbols (tokens) or fiat codes
    async fn whitelist(&self, kind: AggregateKind) -> StoreResult<Whitelist>;

    /// Aggregated prices for the requested full symbols; unknown symbols are omitted
    async fn aggregated_prices(
        &self,
        kind: AggregateKind,
        symbols: &[String],
    ) -> StoreResult<Vec<AggregatedPrice>>;

    /// Aggregated token prices joined with circulating supply
    async fn token_quotes(&self, symbols: &[String]) -> StoreResult<Vec<TokenQuote>>;

    /// Insert-or-update every price as one unit: either all rows land or
    /// none do. Returns the number of rows written.
    async fn upsert_prices(
        &self,
        kind: AggregateKind,
        prices: &[AggregatedPrice],
    ) -> StoreResult<usize>;
}
