//! Mean reduction of per-source samples

use std::collections::{HashMap, HashSet};

use oracle_core::{AggregatedPrice, PriceSample, MAX_SAMPLE_AGE_SECS};

/// Arithmetic mean; `None` for no data. Finite inputs give a finite mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    Some(values.iter().map(|v| v / n).sum())
}

/// Reduces many observations of a symbol into one price
#[derive(Debug, Clone, Copy)]
pub struct MeanReducer {
    max_age_secs: i64,
}

impl MeanReducer {
    pub fn new(max_age_secs: i64) -> Self {
        Self { max_age_secs }
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// One price per symbol in `symbols` that has at least one usable
    /// sample, in `symbols` order. Samples for other symbols, stale samples
    /// and non-finite prices are ignored; a symbol left with nothing is
    /// skipped.
    pub fn reduce<'a, I>(&self, symbols: &[String], samples: I, now_secs: i64) -> Vec<AggregatedPrice>
    where
        I: IntoIterator<Item = &'a PriceSample>,
    {
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();

        for sample in samples {
            if !wanted.contains(sample.symbol.as_str())
                || sample.is_stale(self.max_age_secs, now_secs)
                || !sample.price.is_finite()
            {
                continue;
            }
            grouped
                .entry(sample.symbol.as_str())
                .or_default()
                .push(sample.price);
        }

        symbols
            .iter()
            .filter_map(|symbol| {
                let prices = grouped.get(symbol.as_str())?;
                mean(prices).map(|price| AggregatedPrice::new(symbol.clone(), price))
            })
            .collect()
    }
}

impl Default for MeanReducer {
    fn default() -> Self {
        Self::new(MAX_SAMPLE_AGE_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::PriceSource;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(mean(&[10.0, 11.0]), Some(10.5));
    }

    #[test]
    fn test_two_sources_average() {
        let samples = vec![
            PriceSample::new("ATOMUSDT", 10.0, NOW, PriceSource::Binance),
            PriceSample::new("ATOMUSDT", 11.0, NOW, PriceSource::Kraken),
        ];
        let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT", "LUNAUSDT"]), &samples, NOW);
        assert_eq!(out, vec![AggregatedPrice::new("ATOMUSDT", 10.5)]);
    }

    #[test]
    fn test_staleness_boundary() {
        let samples = vec![
            PriceSample::new("ATOMUSDT", 10.0, NOW - 60, PriceSource::Binance),
            PriceSample::new("ATOMUSDT", 1_000.0, NOW - 61, PriceSource::Kraken),
        ];
        let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);
        assert_eq!(out, vec![AggregatedPrice::new("ATOMUSDT", 10.0)]);
    }

    #[test]
    fn test_empty_first_symbol_does_not_stop_the_rest() {
        let samples = vec![PriceSample::new("LUNAUSDT", 2.0, NOW, PriceSource::Binance)];
        let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT", "LUNAUSDT"]), &samples, NOW);
        assert_eq!(out, vec![AggregatedPrice::new("LUNAUSDT", 2.0)]);
    }

    #[test]
    fn test_mean_near_f64_max_stays_finite() {
        assert_eq!(mean(&[f64::MAX, f64::MAX]), Some(f64::MAX));

        let samples = vec![
            PriceSample::new("ATOMUSDT", 1e308, NOW, PriceSource::Binance),
            PriceSample::new("ATOMUSDT", 1e308, NOW, PriceSource::Kraken),
        ];
        let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);
        assert_eq!(out.len(), 1);
        assert!(out[0].price.is_finite());
        assert_eq!(out[0].price, 1e308);
    }

    #[test]
    fn test_non_finite_prices_ignored() {
        let samples = vec![
            PriceSample::new("ATOMUSDT", f64::NAN, NOW, PriceSource::Binance),
            PriceSample::new("ATOMUSDT", 9.0, NOW, PriceSource::Coinbase),
        ];
        let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);
        assert_eq!(out, vec![AggregatedPrice::new("ATOMUSDT", 9.0)]);
    }

    proptest! {
        #[test]
        fn prop_fresh_whitelisted_samples_average(
            prices in prop::collection::vec(0.0001f64..1_000_000.0, 1..16),
            ages in prop::collection::vec(0i64..=60, 16),
        ) {
            let samples: Vec<_> = prices
                .iter()
                .zip(ages.iter().cycle())
                .zip(PriceSource::ALL.iter().cycle())
                .map(|((price, age), source)| PriceSample::new("ATOMUSDT", *price, NOW - age, *source))
                .collect();

            let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);
            let expected = prices.iter().sum::<f64>() / prices.len() as f64;

            prop_assert_eq!(out.len(), 1);
            prop_assert!((out[0].price - expected).abs() <= expected.abs() * 1e-12);
        }

        #[test]
        fn prop_stale_samples_have_no_influence(
            fresh in prop::collection::vec(1.0f64..100.0, 1..8),
            stale in prop::collection::vec(1.0f64..100.0, 0..8),
            extra_age in 1i64..10_000,
        ) {
            let mut samples: Vec<_> = fresh
                .iter()
                .map(|p| PriceSample::new("ATOMUSDT", *p, NOW, PriceSource::Binance))
                .collect();
            let baseline = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);

            samples.extend(
                stale
                    .iter()
                    .map(|p| PriceSample::new("ATOMUSDT", *p, NOW - 60 - extra_age, PriceSource::Kraken)),
            );
            let with_stale = MeanReducer::default().reduce(&symbols(&["ATOMUSDT"]), &samples, NOW);

            prop_assert_eq!(baseline, with_stale);
        }

        #[test]
        fn prop_unlisted_symbols_never_written(
            prices in prop::collection::vec(1.0f64..100.0, 1..8),
        ) {
            let samples: Vec<_> = prices
                .iter()
                .map(|p| PriceSample::new("BTCUSDT", *p, NOW, PriceSource::Binance))
                .collect();
            let out = MeanReducer::default().reduce(&symbols(&["ATOMUSDT", "LUNAUSDT"]), &samples, NOW);
            prop_assert!(out.is_empty());
        }
    }
}
