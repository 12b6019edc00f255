//! Yahoo Finance chart API adapter for NSE/BSE daily history.
//!
//! # Endpoint
//! `GET {base}/v8/finance/chart/{symbol}?range=2y&interval=1d`
//!
//! # Symbols
//! Bare tickers get the configured exchange suffix (".NS" by default);
//! tickers already ending in a known suffix (".NS", ".BO") pass through.
//!
//! Rate limiting is not applied here; wrap the adapter in
//! `RateLimitedProvider` to share the outbound quota.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use radar_common::config::ProviderConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{PriceProvider, ProviderError};
use super::{PriceBar, PriceSeries};

// ============================================================================
// Constants
// ============================================================================

/// Chart endpoint path
const CHART_ENDPOINT: &str = "/v8/finance/chart";

/// Retry hint after a 429
const RATE_LIMIT_RETRY_SECS: u64 = 60;

/// The chart API rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) breakout-radar/0.1";

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Yahoo chart adapter.
pub struct YahooChartAdapter {
    base_url: String,
    client: reqwest::Client,
    default_suffix: String,
    known_suffixes: Vec<String>,
}

impl YahooChartAdapter {
    /// Create an adapter against a base URL with NSE defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(&ProviderConfig {
            base_url: base_url.into(),
            ..ProviderConfig::default()
        })
    }

    /// Create from config
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            default_suffix: config.default_suffix.clone(),
            known_suffixes: config.known_suffixes.clone(),
        }
    }

    /// Append the default exchange suffix unless the symbol already has a known one.
    pub fn normalize_symbol(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        if self
            .known_suffixes
            .iter()
            .any(|suffix| symbol.ends_with(&suffix.to_uppercase()))
        {
            symbol
        } else {
            format!("{}{}", symbol, self.default_suffix)
        }
    }

    /// Fetch chart rows for a range like "2y", "5d" or "1d".
    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<PriceSeries, ProviderError> {
        if symbol.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("Empty symbol".into()));
        }

        let ticker = self.normalize_symbol(symbol);
        let url = format!("{}{}/{}", self.base_url, CHART_ENDPOINT, ticker);

        debug!(url = %url, symbol = %ticker, range = %range, "Fetching chart");

        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", "1d")])
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::DataNotAvailable(ticker));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!("HTTP {}: {}", status, body)));
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse response: {}", e)))?;

        if let Some(err) = envelope.chart.error {
            if err.code.eq_ignore_ascii_case("Not Found") {
                return Err(ProviderError::DataNotAvailable(ticker));
            }
            return Err(ProviderError::Internal(format!(
                "{}: {}",
                err.code, err.description
            )));
        }

        let result = envelope
            .chart
            .result
            .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)));

        match result {
            Some(result) => Ok(parse_rows(symbol, result)),
            None => Ok(PriceSeries::empty(symbol)),
        }
    }
}

/// Convert chart columns into bars, skipping rows with any missing price.
fn parse_rows(symbol: &str, result: ChartResult) -> PriceSeries {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let timestamp = Utc.timestamp_opt(ts, 0).single()?;
            let open = quote.open.get(i).copied().flatten()?;
            let high = quote.high.get(i).copied().flatten()?;
            let low = quote.low.get(i).copied().flatten()?;
            let close = quote.close.get(i).copied().flatten()?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
            Some(PriceBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect();

    PriceSeries::new(symbol, bars)
}

// ============================================================================
// PriceProvider Implementation
// ============================================================================

#[async_trait]
impl PriceProvider for YahooChartAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        lookback_years: u32,
    ) -> Result<PriceSeries, ProviderError> {
        let range = format!("{}y", lookback_years.max(1));
        let series = self.fetch_chart(symbol, &range).await?;
        debug!(symbol = %symbol, bars = series.len(), "Fetched history");
        Ok(series)
    }

    async fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, ProviderError> {
        match self.fetch_chart(symbol, "1d").await {
            Ok(series) => Ok(series.latest_close()),
            Err(ProviderError::DataNotAvailable(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn validate_symbol(&self, symbol: &str) -> bool {
        self.fetch_chart(symbol, "5d")
            .await
            .map(|series| !series.is_empty())
            .unwrap_or(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
