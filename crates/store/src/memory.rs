//! In-memory store
//!
//! Uses DashMap for concurrent sample ingestion; aggregated tables sit
//! behind one lock so a whole upsert batch lands atomically.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use oracle_core::{
    AggregateKind, AggregatedPrice, PriceSample, PriceSource, StoreError, StoreResult, TokenQuote,
    Whitelist,
};

use crate::port::PriceStore;

/// Store backed by process memory
#[derive(Debug)]
pub struct MemoryStore {
    /// One row per (source, symbol), like the raw vendor tables
    samples: DashMap<PriceSource, HashMap<String, PriceSample>>,

    whitelists: DashMap<AggregateKind, Whitelist>,

    /// Aggregated prices by kind, then symbol
    aggregates: RwLock<HashMap<AggregateKind, HashMap<String, f64>>>,

    /// Circulating supply by full token symbol
    supplies: DashMap<String, f64>,

    /// Stats
    upsert_count: AtomicU64,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            samples: DashMap::new(),
            whitelists: DashMap::new(),
            aggregates: RwLock::new(HashMap::new()),
            supplies: DashMap::new(),
            upsert_count: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Record a sample, replacing the previous one for the same source and symbol
    pub fn record_sample(&self, sample: PriceSample) {
        self.samples
            .entry(sample.source)
            .or_default()
            .insert(sample.symbol.clone(), sample);
    }

    pub fn set_whitelist(&self, kind: AggregateKind, whitelist: Whitelist) {
        self.whitelists.insert(kind, whitelist);
    }

    pub fn set_supply(&self, symbol: impl Into<String>, supply: f64) {
        self.supplies.insert(symbol.into(), supply);
    }

    /// Current aggregated price for a symbol
    pub fn aggregated(&self, kind: AggregateKind, symbol: &str) -> Option<f64> {
        self.aggregates.read().get(&kind)?.get(symbol).copied()
    }

    /// While unavailable every port operation fails, as a lost database would.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Database("memory store unavailable".to_string()))
        }
    }

    pub fn stats(&self) -> MemoryStoreStats {
        let aggregates = self.aggregates.read();
        MemoryStoreStats {
            sample_count: self.samples.iter().map(|e| e.value().len()).sum(),
            token_count: aggregates.get(&AggregateKind::Token).map_or(0, HashMap::len),
            fiat_count: aggregates.get(&AggregateKind::Fiat).map_or(0, HashMap::len),
            upsert_count: self.upsert_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn samples(&self, source: PriceSource) -> StoreResult<Vec<PriceSample>> {
        self.ensure_available()?;
        Ok(self
            .samples
            .get(&source)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn whitelist(&self, kind: AggregateKind) -> StoreResult<Whitelist> {
        self.ensure_available()?;
        Ok(self
            .whitelists
            .get(&kind)
            .map(|w| w.value().clone())
            .unwrap_or_default())
    }

    async fn aggregated_prices(
        &self,
        kind: AggregateKind,
        symbols: &[String],
    ) -> StoreResult<Vec<AggregatedPrice>> {
        self.ensure_available()?;
        let aggregates = self.aggregates.read();
        let Some(table) = aggregates.get(&kind) else {
            return Ok(Vec::new());
        };

        Ok(symbols
            .iter()
            .filter_map(|symbol| {
                table
                    .get(symbol)
                    .map(|price| AggregatedPrice::new(symbol.clone(), *price))
            })
            .collect())
    }

    async fn token_quotes(&self, symbols: &[String]) -> StoreResult<Vec<TokenQuote>> {
        let prices = self.aggregated_prices(AggregateKind::Token, symbols).await?;
        Ok(prices
            .into_iter()
            .map(|p| TokenQuote {
                supply: self.supplies.get(&p.symbol).map(|s| *s.value()),
                symbol: p.symbol,
                price: p.price,
            })
            .collect())
    }

    async fn upsert_prices(
        &self,
        kind: AggregateKind,
        prices: &[AggregatedPrice],
    ) -> StoreResult<usize> {
        self.ensure_available()?;
        let mut aggregates = self.aggregates.write();
        let table = aggregates.entry(kind).or_default();
        for price in prices {
            table.insert(price.symbol.clone(), price.price);
        }
        self.upsert_count.fetch_add(1, Ordering::Relaxed);
        Ok(prices.len())
    }
}

/// Statistics about the memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub sample_count: usize,
    pub token_count: usize,
    pub fiat_count: usize,
    pub upsert_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_replaces_previous_row() {
        let store = MemoryStore::new();
        store.record_sample(PriceSample::new("ATOMUSDT", 10.0, 100, PriceSource::Binance));
        store.record_sample(PriceSample::new("ATOMUSDT", 12.0, 105, PriceSource::Binance));
        store.record_sample(PriceSample::new("ATOMUSDT", 11.0, 105, PriceSource::Kraken));

        let binance = store.samples(PriceSource::Binance).await.unwrap();
        assert_eq!(binance.len(), 1);
        assert_eq!(binance[0].price, 12.0);
        assert!(store.samples(PriceSource::Fixer).await.unwrap().is_empty());
        assert_eq!(store.stats().sample_count, 2);
    }

    #[tokio::test]
    async fn test_upsert_is_update_not_duplicate() {
        let store = MemoryStore::new();
        let batch = vec![AggregatedPrice::new("ATOMUSDT", 10.5)];

        store.upsert_prices(AggregateKind::Token, &batch).await.unwrap();
        store.upsert_prices(AggregateKind::Token, &batch).await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.token_count, 1);
        assert_eq!(stats.fiat_count, 0);
        assert_eq!(stats.upsert_count, 2);
        assert_eq!(store.aggregated(AggregateKind::Token, "ATOMUSDT"), Some(10.5));
    }

    #[tokio::test]
    async fn test_token_quotes_join_supply() {
        let store = MemoryStore::new();
        store
            .upsert_prices(
                AggregateKind::Token,
                &[
                    AggregatedPrice::new("ATOMUSDT", 10.0),
                    AggregatedPrice::new("LUNAUSDT", 2.0),
                ],
            )
            .await
            .unwrap();
        store.set_supply("ATOMUSDT", 1_000_000.0);

        let symbols = vec!["ATOMUSDT".to_string(), "LUNAUSDT".to_string(), "BTCUSDT".to_string()];
        let quotes = store.token_quotes(&symbols).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].supply, Some(1_000_000.0));
        assert_eq!(quotes[1].supply, None);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(store.samples(PriceSource::Binance).await.is_err());
        assert!(store.whitelist(AggregateKind::Token).await.is_err());
        assert!(store.upsert_prices(AggregateKind::Fiat, &[]).await.is_err());

        store.set_available(true);
        assert!(store.whitelist(AggregateKind::Token).await.unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_sample_ingestion() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..100 {
                        store.record_sample(PriceSample::new(
                            format!("T{i}_{j}USDT"),
                            (i * 100 + j) as f64,
                            j as i64,
                            PriceSource::Binance,
                        ));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.stats().sample_count, 400);
    }
}
