//! Price provider abstraction.
//!
//! Defines the `PriceProvider` trait every historical data source implements,
//! and `RateLimitedProvider`, which gates any provider behind the shared
//! outbound rate limiter.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::rate_limiter::SharedRateLimiter;
use super::PriceSeries;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to price providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream rate limit exceeded
    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// No data for the requested symbol
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal provider error (bad status, unparseable payload)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying by the caller)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }

    /// Whether the error means "nothing to screen" rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::DataNotAvailable(_))
    }
}

// ============================================================================
// Price Provider Trait
// ============================================================================

/// Trait for historical price providers.
///
/// Symbol normalization (exchange suffixes) is the adapter's job; callers
/// pass the bare symbol stored in the universe.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch daily history covering the last `lookback_years` years.
    ///
    /// An unknown or delisted symbol yields either an empty series or
    /// `ProviderError::DataNotAvailable`.
    async fn fetch_history(
        &self,
        symbol: &str,
        lookback_years: u32,
    ) -> Result<PriceSeries, ProviderError>;

    /// Fetch the most recent close, if any.
    async fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, ProviderError>;

    /// Check whether the provider has any recent data for a symbol.
    async fn validate_symbol(&self, symbol: &str) -> bool {
        matches!(self.fetch_latest_price(symbol).await, Ok(Some(_)))
    }
}

// ============================================================================
// Rate-limited decorator
// ============================================================================

/// Wraps a provider so that every outbound call first acquires the shared limiter.
pub struct RateLimitedProvider {
    inner: Arc<dyn PriceProvider>,
    limiter: SharedRateLimiter,
}

impl RateLimitedProvider {
    pub fn new(inner: Arc<dyn PriceProvider>, limiter: SharedRateLimiter) -> Self {
        Self { inner, limiter }
    }

    /// The limiter gating this provider.
    pub fn limiter(&self) -> &SharedRateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl PriceProvider for RateLimitedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        lookback_years: u32,
    ) -> Result<PriceSeries, ProviderError> {
        self.limiter.acquire().await;
        self.inner.fetch_history(symbol, lookback_years).await
    }

    async fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, ProviderError> {
        self.limiter.acquire().await;
        self.inner.fetch_latest_price(symbol).await
    }

    async fn validate_symbol(&self, symbol: &str) -> bool {
        self.limiter.acquire().await;
        self.inner.validate_symbol(symbol).await
    }
}
