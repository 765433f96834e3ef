//! Error types

use thiserror::Error;

use crate::AggregateKind;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid interval {input:?}: {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Store port errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction commit failed for {kind} prices: {reason}")]
    CommitFailed { kind: AggregateKind, reason: String },
}

/// Errors produced by one reduction cycle
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Price query errors surfaced at the request boundary
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("No symbols requested")]
    Empty,

    #[error("Too many symbols requested: {requested} > {max}")]
    TooManySymbols { requested: usize, max: usize },

    #[error("Symbol not whitelisted: {0}")]
    NotWhitelisted(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type AggregationResult<T> = Result<T, AggregationError>;
pub type QueryResult<T> = Result<T, QueryError>;
