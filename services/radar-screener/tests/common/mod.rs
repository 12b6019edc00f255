//! Mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use radar_screener::classifier::{
    BreakoutClassifier, ClassificationBackend, ClassifierError, PromptContext,
};
use radar_screener::data::{PriceBar, PriceProvider, PriceSeries, ProviderError, SymbolInfo};
use radar_screener::indicators::{names, IndicatorEngine, IndicatorSet};
use radar_screener::screener::{ScreenSettings, Screener};
use radar_screener::store::{KeyValueStore, MemoryStore, StoreError, StoreGateway, StoreKeys, StoreResult};

// ============================================================================
// Price provider
// ============================================================================

/// Provider returning a flat 30-bar series ending at a configurable price.
#[derive(Default)]
pub struct MockProvider {
    prices: Mutex<HashMap<String, f64>>,
    empty: HashSet<String>,
    missing: HashSet<String>,
    failing: HashSet<String>,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_empty(mut self, symbol: &str) -> Self {
        self.empty.insert(symbol.to_string());
        self
    }

    pub fn with_missing(mut self, symbol: &str) -> Self {
        self.missing.insert(symbol.to_string());
        self
    }

    pub fn with_network_error(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn series(symbol: &str, bars: usize, last_close: f64) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = (0..bars)
        .map(|i| {
            let close = if i + 1 == bars { last_close } else { 100.0 };
            PriceBar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    PriceSeries::new(symbol, bars)
}

#[async_trait]
impl PriceProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        _lookback_years: u32,
    ) -> Result<PriceSeries, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(symbol) {
            return Err(ProviderError::Network("connection reset".into()));
        }
        if self.missing.contains(symbol) {
            return Err(ProviderError::DataNotAvailable(symbol.to_string()));
        }
        if self.empty.contains(symbol) {
            return Ok(PriceSeries::empty(symbol));
        }

        let price = self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(100.0);
        Ok(series(symbol, 30, price))
    }

    async fn fetch_latest_price(&self, symbol: &str) -> Result<Option<f64>, ProviderError> {
        Ok(self.prices.lock().unwrap().get(symbol).copied())
    }
}

// ============================================================================
// Indicator engine
// ============================================================================

/// Engine returning a bullish snapshot, with per-symbol faults.
#[derive(Default)]
pub struct ScriptedEngine {
    panic_on: HashSet<String>,
    none_on: HashSet<String>,
    pub calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panicking_on(mut self, symbol: &str) -> Self {
        self.panic_on.insert(symbol.to_string());
        self
    }

    pub fn nothing_for(mut self, symbol: &str) -> Self {
        self.none_on.insert(symbol.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn bullish_indicators() -> IndicatorSet {
    IndicatorSet::from_pairs([
        (names::RSI, Some(25.0)),
        (names::MACD, Some(1.0)),
        (names::MACD_SIGNAL, Some(0.5)),
        (names::SMA_20, Some(110.0)),
        (names::SMA_50, Some(100.0)),
        (names::SMA_200, None),
    ])
}

impl IndicatorEngine for ScriptedEngine {
    fn compute(&self, series: &PriceSeries) -> Option<IndicatorSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.contains(&series.symbol) {
            panic!("indicator failure for {}", series.symbol);
        }
        if self.none_on.contains(&series.symbol) {
            return None;
        }
        Some(bullish_indicators())
    }
}

// ============================================================================
// Classification backend
// ============================================================================

/// Backend answering with fixed text.
pub struct CountingBackend {
    answer: String,
    pub calls: AtomicUsize,
}

impl CountingBackend {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn complete(&self, _prompt: &PromptContext) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-memory store that counts writes and can refuse string writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub writes: AtomicUsize,
    pub fail_value_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_value_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".into()));
        }
        self.wrote();
        self.inner.set(key, value).await
    }

    async fn get_list(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.get_list(key).await
    }

    async fn set_list(&self, key: &str, values: &[String]) -> StoreResult<()> {
        self.wrote();
        self.inner.set_list(key, values).await
    }

    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()> {
        self.wrote();
        self.inner.list_append(key, value).await
    }

    async fn list_remove(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.wrote();
        self.inner.list_remove(key, value).await
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        self.wrote();
        self.inner.set_add(set, member).await
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        self.wrote();
        self.inner.set_remove(set, member).await
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        self.inner.set_contains(set, member).await
    }

    async fn delete_keys(&self, keys: &[String]) -> StoreResult<u64> {
        self.wrote();
        self.inner.delete_keys(keys).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub provider: Arc<MockProvider>,
    pub engine: Arc<ScriptedEngine>,
    pub store: Arc<CountingStore>,
    pub screener: Screener,
}

impl Harness {
    pub fn new(provider: MockProvider, engine: ScriptedEngine) -> Self {
        Self::with_classifier(provider, engine, BreakoutClassifier::fallback_only())
    }

    pub fn with_classifier(
        provider: MockProvider,
        engine: ScriptedEngine,
        classifier: BreakoutClassifier,
    ) -> Self {
        let provider = Arc::new(provider);
        let engine = Arc::new(engine);
        let store = CountingStore::new();
        let gateway = StoreGateway::new(store.clone(), StoreKeys::default());

        let screener = Screener::new(
            provider.clone(),
            engine.clone(),
            classifier,
            gateway,
            ScreenSettings::default(),
        );

        Self {
            provider,
            engine,
            store,
            screener,
        }
    }

    /// Store a universe of the given symbols directly.
    pub async fn seed_universe(&self, symbols: &[&str]) {
        let infos: Vec<SymbolInfo> = symbols
            .iter()
            .map(|s| SymbolInfo::new(*s, *s, "TEST", "NSE"))
            .collect();
        self.screener.store().save_universe(&infos).await.unwrap();
    }
}
