//! Whitelist of tracked symbols
//!
//! Base symbols (tokens) and fiat codes are stored bare; the full symbol
//! served and persisted is the base joined with a fixed quote suffix:
//! `ATOM` + `USDT` => `ATOMUSDT`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered, de-duplicated set of upper-case base symbols
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    bases: Vec<String>,
}

impl Whitelist {
    pub fn new<I, S>(bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let bases = bases
            .into_iter()
            .map(|b| b.as_ref().trim().to_uppercase())
            .filter(|b| !b.is_empty() && seen.insert(b.clone()))
            .collect();
        Self { bases }
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn contains_base(&self, base: &str) -> bool {
        self.bases.iter().any(|b| b.eq_ignore_ascii_case(base))
    }

    /// Full symbols in whitelist order
    pub fn symbols(&self, quote: &str) -> Vec<String> {
        self.bases.iter().map(|b| full_symbol(b, quote)).collect()
    }

    /// Full symbols as a lookup set
    pub fn symbol_set(&self, quote: &str) -> HashSet<String> {
        self.bases.iter().map(|b| full_symbol(b, quote)).collect()
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

/// Join a base symbol and quote suffix into the stored symbol
pub fn full_symbol(base: &str, quote: &str) -> String {
    format!("{}{}", base.trim().to_uppercase(), quote.trim().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_symbol() {
        assert_eq!(full_symbol("atom", "USDT"), "ATOMUSDT");
        assert_eq!(full_symbol("EUR", "usd"), "EURUSD");
    }

    #[test]
    fn test_whitelist_dedup_keeps_order() {
        let whitelist = Whitelist::new(["luna", "ATOM", "Luna", " ", "osmo"]);
        assert_eq!(whitelist.bases(), &["LUNA", "ATOM", "OSMO"]);
        assert_eq!(
            whitelist.symbols("USDT"),
            vec!["LUNAUSDT", "ATOMUSDT", "OSMOUSDT"]
        );
        assert!(whitelist.contains_base("atom"));
        assert!(!whitelist.contains_base("BTC"));
    }
}
