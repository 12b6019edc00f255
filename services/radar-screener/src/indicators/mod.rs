//! Technical indicators.
//!
//! The screener treats indicator math as a black box behind
//! `IndicatorEngine`. An indicator that cannot be computed (too little
//! history) is stored as absent, never as zero.

mod technical;

pub use technical::TechnicalIndicatorEngine;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::PriceSeries;

/// Indicator names produced by the default engine and read by the classifier.
pub mod names {
    pub const SMA_20: &str = "sma_20";
    pub const SMA_50: &str = "sma_50";
    pub const SMA_200: &str = "sma_200";
    pub const EMA_12: &str = "ema_12";
    pub const EMA_26: &str = "ema_26";
    pub const RSI: &str = "rsi";
    pub const MACD: &str = "macd";
    pub const MACD_SIGNAL: &str = "macd_signal";
    pub const MACD_HISTOGRAM: &str = "macd_histogram";
    pub const STOCHASTIC_K: &str = "stochastic_k";
    pub const STOCHASTIC_D: &str = "stochastic_d";
    pub const BOLLINGER_UPPER: &str = "bollinger_upper";
    pub const BOLLINGER_MIDDLE: &str = "bollinger_middle";
    pub const BOLLINGER_LOWER: &str = "bollinger_lower";
    pub const ATR: &str = "atr";
    pub const VOLUME_SMA: &str = "volume_sma";
    pub const OBV: &str = "obv";
    pub const ADX: &str = "adx";
}

/// Named indicator snapshot for one symbol. `None` means "not evaluable".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSet(BTreeMap<String, Option<f64>>);

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.insert(name, value);
        }
        set
    }

    /// Record a value. Non-finite numbers are stored as absent.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.0.insert(name.into(), value.filter(|v| v.is_finite()));
    }

    /// The value of an indicator, if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten()
    }

    /// Whether the indicator was computed at all (present or absent).
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Present indicators in name order.
    pub fn present(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter_map(|(name, value)| value.map(|v| (name.as_str(), v)))
    }
}

/// Computes indicators from a price series.
///
/// Returns `None` when nothing can be computed.
pub trait IndicatorEngine: Send + Sync {
    fn compute(&self, series: &PriceSeries) -> Option<IndicatorSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_not_zero() {
        let set = IndicatorSet::from_pairs([(names::RSI, None), (names::ADX, Some(0.0))]);
        assert_eq!(set.get(names::RSI), None);
        assert!(set.contains(names::RSI));
        assert_eq!(set.get(names::ADX), Some(0.0));
        assert_eq!(set.present().count(), 1);
    }

    #[test]
    fn test_non_finite_stored_as_absent() {
        let mut set = IndicatorSet::new();
        set.insert(names::OBV, Some(f64::NAN));
        assert_eq!(set.get(names::OBV), None);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let set = IndicatorSet::from_pairs([("rsi", Some(42.5)), ("sma_200", None)]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"rsi":42.5,"sma_200":null}"#);

        let back: IndicatorSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
