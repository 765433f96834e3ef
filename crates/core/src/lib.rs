//! Core types and utilities for the price oracle
//!
//! This crate provides shared types used across all components:
//! - Price samples, aggregated prices and their sources
//! - Whitelist and symbol construction
//! - Interval parsing and configuration
//! - Error taxonomy

pub mod types;
pub mod whitelist;
pub mod interval;
pub mod config;
pub mod errors;

pub use types::*;
pub use whitelist::*;
pub use interval::parse_interval;
pub use config::*;
pub use errors::*;
