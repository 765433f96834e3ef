//! Price query service
//!
//! Transport-agnostic read side: validates requests against the size limit
//! and the whitelist, then answers from the TTL cache in front of the store.
//! Results are wrapped in the `{status, data, message}` envelope by the
//! caller via [`ApiResponse`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use oracle_core::{
    full_symbol, AggregateKind, AggregatedPrice, ApiConfig, OracleConfig, QueryError, QueryResult,
    TokenQuote, Whitelist,
};
use oracle_store::{CacheStats, PriceStore, TtlCache};

/// Envelope status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            message: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            message: message.into(),
        }
    }
}

impl<T> From<QueryResult<T>> for ApiResponse<T> {
    fn from(result: QueryResult<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Cached price queries
pub struct PriceService {
    store: Arc<dyn PriceStore>,
    token_quote: String,
    fiat_quote: String,
    max_symbols: usize,
    ttl: Duration,
    whitelists: TtlCache<AggregateKind, Whitelist>,
    fiats: TtlCache<String, Vec<AggregatedPrice>>,
    tokens: TtlCache<String, Vec<TokenQuote>>,
}

impl PriceService {
    pub fn new(store: Arc<dyn PriceStore>, config: &OracleConfig) -> Self {
        Self::with_limits(
            store,
            &config.token.quote,
            &config.fiat.quote,
            &config.api,
        )
    }

    pub fn with_limits(
        store: Arc<dyn PriceStore>,
        token_quote: &str,
        fiat_quote: &str,
        api: &ApiConfig,
    ) -> Self {
        Self {
            store,
            token_quote: token_quote.trim().to_uppercase(),
            fiat_quote: fiat_quote.trim().to_uppercase(),
            max_symbols: api.max_symbols,
            ttl: api.cache_ttl(),
            whitelists: TtlCache::new(),
            fiats: TtlCache::new(),
            tokens: TtlCache::new(),
        }
    }

    /// Whitelisted bases for one aggregate kind
    pub async fn whitelist(&self, kind: AggregateKind) -> QueryResult<Whitelist> {
        self.whitelists
            .get_or_compute(kind, self.ttl, || async {
                debug!("Loading {} whitelist", kind);
                self.store.whitelist(kind).await.map_err(QueryError::from)
            })
            .await
    }

    /// Aggregated fiat prices for the requested currency codes
    pub async fn fiat_prices(&self, codes: &[String]) -> QueryResult<Vec<AggregatedPrice>> {
        let symbols = self.resolve(AggregateKind::Fiat, codes).await?;
        let key = symbols.join(",");

        self.fiats
            .get_or_compute(key, self.ttl, || async {
                self.store
                    .aggregated_prices(AggregateKind::Fiat, &symbols)
                    .await
                    .map_err(QueryError::from)
            })
            .await
    }

    /// Aggregated token prices with circulating supply where known
    pub async fn token_prices(&self, bases: &[String]) -> QueryResult<Vec<TokenQuote>> {
        let symbols = self.resolve(AggregateKind::Token, bases).await?;
        let key = symbols.join(",");

        self.tokens
            .get_or_compute(key, self.ttl, || async {
                self.store.token_quotes(&symbols).await.map_err(QueryError::from)
            })
            .await
    }

    pub fn cache_stats(&self) -> [CacheStats; 3] {
        [
            self.whitelists.stats(),
            self.fiats.stats(),
            self.tokens.stats(),
        ]
    }

    /// Normalize requested bases, enforce the size limit and whitelist, and
    /// return sorted full symbols so equal requests share one cache entry.
    async fn resolve(&self, kind: AggregateKind, requested: &[String]) -> QueryResult<Vec<String>> {
        let mut bases: Vec<String> = requested
            .iter()
            .map(|b| b.trim().to_uppercase())
            .filter(|b| !b.is_empty())
            .collect();
        bases.sort();
        bases.dedup();

        if bases.is_empty() {
            return Err(QueryError::Empty);
        }
        if bases.len() > self.max_symbols {
            return Err(QueryError::TooManySymbols {
                requested: bases.len(),
                max: self.max_symbols,
            });
        }

        let whitelist = self.whitelist(kind).await?;
        if let Some(unknown) = bases.iter().find(|b| !whitelist.contains_base(b)) {
            return Err(QueryError::NotWhitelisted(unknown.clone()));
        }

        let quote = match kind {
            AggregateKind::Token => &self.token_quote,
            AggregateKind::Fiat => &self.fiat_quote,
        };
        Ok(bases.iter().map(|b| full_symbol(b, quote)).collect())
    }
}
