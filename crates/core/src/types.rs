//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Samples older than this (relative to evaluation time) never reach a reduction.
pub const MAX_SAMPLE_AGE_SECS: i64 = 60;

/// Which aggregate table a price belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Token,
    Fiat,
}

impl AggregateKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Token => "token",
            AggregateKind::Fiat => "fiat",
        }
    }

    /// Output table holding one aggregated row per symbol
    pub fn table(&self) -> &'static str {
        match self {
            AggregateKind::Token => "tokens",
            AggregateKind::Fiat => "fiats",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// External price vendors. Each one lands in its own raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Binance,
    Coinbase,
    Kraken,
    Coingecko,
    OpenExchangeRates,
    Fixer,
}

impl PriceSource {
    pub const ALL: [PriceSource; 6] = [
        PriceSource::Binance,
        PriceSource::Coinbase,
        PriceSource::Kraken,
        PriceSource::Coingecko,
        PriceSource::OpenExchangeRates,
        PriceSource::Fixer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PriceSource::Binance => "binance",
            PriceSource::Coinbase => "coinbase",
            PriceSource::Kraken => "kraken",
            PriceSource::Coingecko => "coingecko",
            PriceSource::OpenExchangeRates => "openexchangerates",
            PriceSource::Fixer => "fixer",
        }
    }

    /// Raw table the ingestion side writes this vendor's samples into
    pub fn table(&self) -> &'static str {
        match self {
            PriceSource::Binance => "binance_prices",
            PriceSource::Coinbase => "coinbase_prices",
            PriceSource::Kraken => "kraken_prices",
            PriceSource::Coingecko => "coingecko_prices",
            PriceSource::OpenExchangeRates => "openexchangerates_prices",
            PriceSource::Fixer => "fixer_prices",
        }
    }

    /// Aggregate kind this vendor quotes
    pub fn kind(&self) -> AggregateKind {
        match self {
            PriceSource::OpenExchangeRates | PriceSource::Fixer => AggregateKind::Fiat,
            _ => AggregateKind::Token,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One observation of one symbol from one vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub symbol: String,
    pub price: f64,
    /// Unix seconds
    pub observed_at: i64,
    pub source: PriceSource,
}

impl PriceSample {
    pub fn new(symbol: impl Into<String>, price: f64, observed_at: i64, source: PriceSource) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            observed_at,
            source,
        }
    }

    pub fn age_secs(&self, now_secs: i64) -> i64 {
        now_secs - self.observed_at
    }

    /// A sample exactly `max_age_secs` old is still fresh.
    pub fn is_stale(&self, max_age_secs: i64, now_secs: i64) -> bool {
        self.observed_at < now_secs - max_age_secs
    }
}

/// The single current price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: String,
    pub price: f64,
}

impl AggregatedPrice {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Aggregated token price with circulating supply, when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenQuote {
    pub symbol: String,
    pub price: f64,
    pub supply: Option<f64>,
}

/// Current wall-clock time in unix seconds
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
