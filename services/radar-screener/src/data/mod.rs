//! Market data module for NSE/BSE equities.
//!
//! Provides the symbol and price types, the price provider abstraction,
//! the shared outbound rate limiter and the symbol universe sources.
//!
//! # Data Sources
//! - **Yahoo chart API** (Primary): daily OHLCV history, exchange-suffixed symbols
//! - **Static universe**: built-in large-cap list used when no listing source works

mod provider;
mod rate_limiter;
mod universe;
mod yahoo;

pub use provider::{PriceProvider, ProviderError, RateLimitedProvider};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use universe::{dedup_by_symbol, fallback_universe, StaticUniverse, UniverseSource};
pub use yahoo::YahooChartAdapter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A listed symbol eligible for screening.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Bare ticker (e.g. "RELIANCE")
    pub symbol: String,
    /// Company name
    #[serde(alias = "name")]
    pub display_name: String,
    /// Sector or index bucket
    pub category: String,
    /// Listing exchange (e.g. "NSE")
    pub exchange: String,
}

impl SymbolInfo {
    pub fn new(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            category: category.into(),
            exchange: exchange.into(),
        }
    }
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronological price history for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, sorting bars by timestamp.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// An empty series for a symbol.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close of the most recent bar.
    pub fn latest_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}
