//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AggregateKind, ConfigError, PriceSource};

/// Default config file, looked up relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/oracle";

/// Environment variable prefix, e.g. `ORACLE__SUPERVISOR__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "ORACLE";

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; absent means the in-memory store
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        }
    }
}

/// Settings for one aggregation worker kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Interval string, parsed by the worker when it starts
    pub fetch_interval: String,
    /// Suffix appended to every whitelisted base
    pub quote: String,
    pub sources: Vec<PriceSource>,
}

impl AggregatorSettings {
    pub fn token_defaults() -> Self {
        Self {
            fetch_interval: "5s".to_string(),
            quote: "USDT".to_string(),
            sources: vec![
                PriceSource::Binance,
                PriceSource::Coinbase,
                PriceSource::Kraken,
                PriceSource::Coingecko,
            ],
        }
    }

    pub fn fiat_defaults() -> Self {
        Self {
            fetch_interval: "30s".to_string(),
            quote: "USD".to_string(),
            sources: vec![PriceSource::OpenExchangeRates, PriceSource::Fixer],
        }
    }
}

fn default_token_settings() -> AggregatorSettings {
    AggregatorSettings::token_defaults()
}

fn default_fiat_settings() -> AggregatorSettings {
    AggregatorSettings::fiat_defaults()
}

/// Supervision configuration shared by every worker kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub pulse_interval_ms: u64,
    pub timeout_ms: u64,
    /// 0 = never restart, >0 = at most N restarts, <0 = unbounded
    pub recovery_budget: i64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            pulse_interval_ms: 1_000,
            timeout_ms: 10_000,
            recovery_budget: 5,
        }
    }
}

impl SupervisorConfig {
    pub fn pulse_interval(&self) -> Duration {
        Duration::from_millis(self.pulse_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Query layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Maximum symbols accepted in one batch request
    pub max_symbols: usize,
    pub cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_symbols: 25,
            cache_ttl_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_token_settings")]
    pub token: AggregatorSettings,
    #[serde(default = "default_fiat_settings")]
    pub fiat: AggregatorSettings,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            token: AggregatorSettings::token_defaults(),
            fiat: AggregatorSettings::fiat_defaults(),
            supervisor: SupervisorConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl OracleConfig {
    /// Load from `config/oracle.{toml,yaml,json}` (optional) overlaid by
    /// `ORACLE__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("token.sources")
                    .with_list_parse_key("fiat.sources"),
            )
            .build()?;

        let config: OracleConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn aggregator(&self, kind: AggregateKind) -> &AggregatorSettings {
        match kind {
            AggregateKind::Token => &self.token,
            AggregateKind::Fiat => &self.fiat,
        }
    }

    /// Interval strings are not checked here; a malformed one is reported
    /// by the worker when it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sup = &self.supervisor;
        if sup.pulse_interval_ms == 0 {
            return Err(ConfigError::Invalid("supervisor.pulse_interval_ms must be > 0".into()));
        }
        if sup.timeout_ms <= sup.pulse_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "supervisor.timeout_ms ({}) must exceed pulse_interval_ms ({})",
                sup.timeout_ms, sup.pulse_interval_ms
            )));
        }
        if self.api.max_symbols == 0 {
            return Err(ConfigError::Invalid("api.max_symbols must be > 0".into()));
        }

        for kind in [AggregateKind::Token, AggregateKind::Fiat] {
            let settings = self.aggregator(kind);
            if settings.quote.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{kind}.quote must not be empty")));
            }
            if let Some(source) = settings.sources.iter().find(|s| s.kind() != kind) {
                return Err(ConfigError::Invalid(format!(
                    "source {source} does not quote {kind} prices"
                )));
            }
        }
        Ok(())
    }
}
