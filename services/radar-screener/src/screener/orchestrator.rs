//! Screening orchestrator.
//!
//! `Screener` is the one context object built per process. It owns handles
//! to the provider, indicator engine, classifier, store and radar, and is
//! cheap to clone into worker tasks.

use futures::FutureExt;
use radar_common::config::Config;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AggregateReport, FailureKind, ScreenOutcome, ScreenerError, ScreeningResult};
use crate::classifier::{BreakoutClassifier, BreakoutVerdict, ChatCompletionBackend};
use crate::data::{
    dedup_by_symbol, fallback_universe, shared_limiter, PriceProvider, ProviderError,
    RateLimitedProvider, StaticUniverse, SymbolInfo, UniverseSource, YahooChartAdapter,
};
use crate::indicators::{IndicatorEngine, TechnicalIndicatorEngine};
use crate::radar::RadarQueue;
use crate::store::{create_store, StoreGateway, StoreKeys, StoreResult};

/// Exclusive right to perform one full-universe run.
#[must_use = "dropping the claim releases the run lock"]
pub struct RunClaim {
    _guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for RunClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunClaim").finish_non_exhaustive()
    }
}

/// Tunables for screening runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSettings {
    pub lookback_years: u32,
    /// A breakout verdict must exceed this confidence to enter the radar
    pub radar_confidence_threshold: f64,
    pub max_concurrent: usize,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            lookback_years: 2,
            radar_confidence_threshold: 0.6,
            max_concurrent: 5,
        }
    }
}

impl From<&Config> for ScreenSettings {
    fn from(config: &Config) -> Self {
        Self {
            lookback_years: config.provider.lookback_years,
            radar_confidence_threshold: config.screener.radar_confidence_threshold,
            max_concurrent: config.screener.max_concurrent,
        }
    }
}

/// Service health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub store_ok: bool,
    pub store_backend: String,
    pub universe_size: Option<usize>,
    pub radar_count: Option<usize>,
    /// "ai" when a remote backend is configured, otherwise "fallback"
    pub classifier: String,
    pub provider: String,
}

/// Breakout screener.
#[derive(Clone)]
pub struct Screener {
    provider: Arc<dyn PriceProvider>,
    engine: Arc<dyn IndicatorEngine>,
    classifier: BreakoutClassifier,
    store: StoreGateway,
    radar: RadarQueue,
    universe_source: Option<Arc<dyn UniverseSource>>,
    settings: ScreenSettings,
    run_lock: Arc<Mutex<()>>,
}

impl Screener {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        engine: Arc<dyn IndicatorEngine>,
        classifier: BreakoutClassifier,
        store: StoreGateway,
        settings: ScreenSettings,
    ) -> Self {
        let radar = RadarQueue::new(store.clone());
        Self {
            provider,
            engine,
            classifier,
            store,
            radar,
            universe_source: None,
            settings,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_universe_source(mut self, source: Arc<dyn UniverseSource>) -> Self {
        self.universe_source = Some(source);
        self
    }

    /// Wire the production collaborators from config.
    pub async fn from_config(config: &Config) -> Result<Self, ScreenerError> {
        let raw = create_store(&config.store).await?;
        let store = StoreGateway::new(raw, StoreKeys::from(&config.store));

        let limiter = shared_limiter(
            "yahoo",
            config.provider.requests_per_minute,
            Duration::from_millis(config.provider.min_delay_ms),
        );
        let adapter = Arc::new(YahooChartAdapter::from_config(&config.provider));
        let provider = Arc::new(RateLimitedProvider::new(adapter, limiter));

        let classifier = match ChatCompletionBackend::from_config(&config.classifier) {
            Some(backend) => {
                info!(model = %backend.model(), "Remote classifier enabled");
                BreakoutClassifier::with_backend(Arc::new(backend))
            }
            None => {
                warn!("No classifier API key configured, using rule-based scoring only");
                BreakoutClassifier::fallback_only()
            }
        };

        Ok(Self::new(
            provider,
            Arc::new(TechnicalIndicatorEngine::new()),
            classifier,
            store,
            ScreenSettings::from(config),
        )
        .with_universe_source(Arc::new(StaticUniverse::fallback())))
    }

    pub fn settings(&self) -> &ScreenSettings {
        &self.settings
    }

    pub fn store(&self) -> &StoreGateway {
        &self.store
    }

    pub fn radar(&self) -> &RadarQueue {
        &self.radar
    }

    /// Whether a full-universe run currently holds the run lock.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    // ========================================================================
    // Universe
    // ========================================================================

    /// Fetch, de-duplicate and store the symbol universe.
    ///
    /// Falls back to the built-in list when asked to, when no source is set,
    /// or when the source fails or returns nothing.
    pub async fn initialize_universe(
        &self,
        use_fallback: bool,
    ) -> Result<Vec<SymbolInfo>, ScreenerError> {
        let symbols = match (&self.universe_source, use_fallback) {
            (Some(source), false) => match source.fetch_symbols().await {
                Ok(symbols) if !symbols.is_empty() => symbols,
                Ok(_) => {
                    warn!(source = source.name(), "Universe source returned no symbols, using fallback list");
                    fallback_universe()
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Universe source failed, using fallback list");
                    fallback_universe()
                }
            },
            _ => fallback_universe(),
        };

        let symbols = dedup_by_symbol(symbols);
        if symbols.is_empty() {
            return Err(ScreenerError::UniverseEmpty);
        }

        self.store.save_universe(&symbols).await?;
        info!(count = symbols.len(), "Symbol universe initialized");
        Ok(symbols)
    }

    pub async fn universe(&self) -> StoreResult<Vec<SymbolInfo>> {
        self.store.load_universe().await
    }

    pub async fn cached_result(&self, symbol: &str) -> StoreResult<Option<ScreeningResult>> {
        self.store.load_result(symbol).await
    }

    /// Delete the universe, radar and every cached result.
    pub async fn clear_all(&self) -> StoreResult<u64> {
        let deleted = self.store.clear_all().await?;
        info!(deleted, "Cleared all screening data");
        Ok(deleted)
    }

    pub async fn health(&self) -> HealthReport {
        let store_ok = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        };

        let (universe_size, radar_count) = if store_ok {
            (
                self.store.load_universe().await.ok().map(|u| u.len()),
                self.radar.count().await.ok(),
            )
        } else {
            (None, None)
        };

        HealthReport {
            store_ok,
            store_backend: self.store.raw().backend_name().to_string(),
            universe_size,
            radar_count,
            classifier: if self.classifier.has_backend() { "ai" } else { "fallback" }.to_string(),
            provider: self.provider.name().to_string(),
        }
    }

    // ========================================================================
    // Single symbol
    // ========================================================================

    /// Screen one symbol.
    pub async fn screen_one(&self, symbol: &str) -> ScreenOutcome {
        self.screen_one_cancellable(symbol, &CancellationToken::new())
            .await
    }

    /// Screen one symbol, aborting before persistence if `token` fires.
    ///
    /// Once the result is ready, persisting it and the radar decision always
    /// run to completion. A panic anywhere in the pipeline becomes a
    /// `Failed` outcome.
    pub async fn screen_one_cancellable(
        &self,
        symbol: &str,
        token: &CancellationToken,
    ) -> ScreenOutcome {
        match AssertUnwindSafe(self.run_pipeline(symbol, token))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(symbol = %symbol, panic = %message, "Screening pipeline panicked");
                ScreenOutcome::failed(symbol, FailureKind::Panicked, message)
            }
        }
    }

    async fn run_pipeline(&self, symbol: &str, token: &CancellationToken) -> ScreenOutcome {
        let prepared = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(symbol = %symbol, "Screening cancelled before commit");
                return ScreenOutcome::failed(symbol, FailureKind::Cancelled, "screening cancelled");
            }
            prepared = self.prepare(symbol) => prepared,
        };

        match prepared {
            Ok(result) => self.commit(result).await,
            Err(outcome) => outcome,
        }
    }

    /// Fetch, compute and classify. Nothing is written here.
    async fn prepare(&self, symbol: &str) -> Result<ScreeningResult, ScreenOutcome> {
        let series = match self
            .provider
            .fetch_history(symbol, self.settings.lookback_years)
            .await
        {
            Ok(series) => series,
            Err(ProviderError::DataNotAvailable(_)) => {
                return Err(ScreenOutcome::NoData {
                    symbol: symbol.to_string(),
                })
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Price fetch failed");
                return Err(ScreenOutcome::failed(symbol, FailureKind::Fetch, e.to_string()));
            }
        };

        let Some(latest_price) = series.latest_close() else {
            info!(symbol = %symbol, "No price data");
            return Err(ScreenOutcome::NoData {
                symbol: symbol.to_string(),
            });
        };

        let indicators = match self.engine.compute(&series) {
            Some(indicators) if !indicators.is_empty() => indicators,
            _ => {
                warn!(symbol = %symbol, bars = series.len(), "Indicator computation produced nothing");
                return Err(ScreenOutcome::failed(
                    symbol,
                    FailureKind::Computation,
                    "indicator engine returned no values",
                ));
            }
        };

        let verdict = self
            .classifier
            .classify(symbol, &indicators, latest_price)
            .await;

        Ok(ScreeningResult {
            symbol: symbol.to_string(),
            indicators,
            latest_price,
            verdict,
            data_points: series.len(),
            screened_at: chrono::Utc::now(),
        })
    }

    /// Persist the result, then maybe enqueue on the radar.
    async fn commit(&self, result: ScreeningResult) -> ScreenOutcome {
        if let Err(e) = self.store.save_result(&result).await {
            warn!(symbol = %result.symbol, error = %e, "Failed to persist screening result");
            return ScreenOutcome::failed(&result.symbol, FailureKind::Persistence, e.to_string());
        }

        let mut added_to_radar = false;
        if self.qualifies_for_radar(&result.verdict) {
            match self
                .radar
                .add(&result.symbol, result.verdict.clone(), Some(result.latest_price))
                .await
            {
                Ok(added) => added_to_radar = added,
                Err(e) => {
                    warn!(symbol = %result.symbol, error = %e, "Failed to add to radar");
                    return ScreenOutcome::failed(
                        &result.symbol,
                        FailureKind::Persistence,
                        format!("radar update failed: {}", e),
                    );
                }
            }
        }

        debug!(
            symbol = %result.symbol,
            is_breakout = result.verdict.is_breakout,
            confidence = result.verdict.confidence,
            source = ?result.verdict.source,
            added_to_radar,
            "Symbol screened"
        );

        ScreenOutcome::Screened {
            result,
            added_to_radar,
        }
    }

    fn qualifies_for_radar(&self, verdict: &BreakoutVerdict) -> bool {
        verdict.is_breakout && verdict.confidence > self.settings.radar_confidence_threshold
    }

    // ========================================================================
    // Full universe
    // ========================================================================

    /// Screen every stored symbol with at most `max_concurrent` in flight.
    pub async fn screen_all(&self, max_concurrent: usize) -> Result<AggregateReport, ScreenerError> {
        self.screen_all_with_cancel(max_concurrent, CancellationToken::new())
            .await
    }

    /// Like `screen_all`, but stops scheduling new symbols once `token`
    /// fires and returns the partial report.
    pub async fn screen_all_with_cancel(
        &self,
        max_concurrent: usize,
        token: CancellationToken,
    ) -> Result<AggregateReport, ScreenerError> {
        let claim = self.claim_run()?;
        self.screen_all_claimed(claim, max_concurrent, token).await
    }

    /// Take the run lock without starting a run.
    ///
    /// Lets a caller refuse an overlapping run synchronously and then hand
    /// the claim to a background task.
    pub fn claim_run(&self) -> Result<RunClaim, ScreenerError> {
        Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map(|guard| RunClaim { _guard: guard })
            .map_err(|_| ScreenerError::AlreadyRunning)
    }

    /// Full run under an already-held claim. The claim is released when the
    /// run returns.
    pub async fn screen_all_claimed(
        &self,
        _claim: RunClaim,
        max_concurrent: usize,
        token: CancellationToken,
    ) -> Result<AggregateReport, ScreenerError> {
        let universe = self.store.load_universe().await?;
        if universe.is_empty() {
            return Err(ScreenerError::UniverseEmpty);
        }

        let max_concurrent = max_concurrent.max(1);
        let mut report = AggregateReport::new(universe.len());
        info!(total = universe.len(), max_concurrent, "Starting full screening run");

        let mut pending = universe.into_iter().map(|info| info.symbol);
        let mut in_flight: JoinSet<ScreenOutcome> = JoinSet::new();

        loop {
            while in_flight.len() < max_concurrent && !token.is_cancelled() {
                let Some(symbol) = pending.next() else {
                    break;
                };
                let screener = self.clone();
                let token = token.clone();
                in_flight.spawn(async move { screener.screen_one_cancellable(&symbol, &token).await });
            }

            match in_flight.join_next().await {
                Some(Ok(outcome)) => {
                    if let ScreenOutcome::Failed { symbol, kind, message } = &outcome {
                        debug!(symbol = %symbol, kind = ?kind, message = %message, "Symbol failed");
                    }
                    report.record(&outcome);
                }
                Some(Err(e)) => {
                    error!(error = %e, "Screening task failed to join");
                    report.record_lost_task();
                }
                None => break,
            }
        }

        if token.is_cancelled() {
            report.mark_cancelled(pending.count());
            warn!(skipped = report.skipped, "Screening run cancelled");
        }

        report.finish();
        info!(
            total = report.total,
            processed = report.processed,
            breakouts = report.breakouts,
            no_data = report.no_data,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Screening run complete"
        );

        Ok(report)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
