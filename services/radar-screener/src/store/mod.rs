//! Key-value store gateway.
//!
//! The store is an external collaborator: `KeyValueStore` exposes the raw
//! string/list/set operations, implemented in-process (`MemoryStore`) and,
//! with the `redis-backend` feature, by a Redis server (`RedisStore`).
//!
//! `StoreGateway` layers the radar's key layout and JSON encoding on top.
//! It carries no business logic.
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `stocks:list` | list | one JSON `SymbolInfo` per element |
//! | `stocks:data:{symbol}` | string | JSON `ScreeningResult` |
//! | `stocks:radar` | list | one JSON `RadarEntry` per element |
//! | `stocks:radar:set` | set | symbols currently on the radar |

mod memory;
#[cfg(feature = "redis-backend")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;

use async_trait::async_trait;
use radar_common::config::{StoreBackend, StoreConfig};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::data::SymbolInfo;
use crate::screener::ScreeningResult;

// ============================================================================
// Error Types
// ============================================================================

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection error to the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command was rejected or failed.
    #[error("Command error: {0}")]
    Command(String),

    /// Value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend not available.
    #[error("Backend not available: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Store Trait
// ============================================================================

/// Raw key-value operations.
///
/// Each call is atomic per key: a reader never sees a half-written value
/// or a half-replaced list.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend name for logging and health output.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// All list elements in order; missing key is an empty list.
    async fn get_list(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Atomically replace the whole list.
    async fn set_list(&self, key: &str, values: &[String]) -> StoreResult<()>;

    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove every element equal to `value`; returns how many were removed.
    async fn list_remove(&self, key: &str, value: &str) -> StoreResult<u64>;

    /// Returns true if the member was newly added.
    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Returns true if the member was present.
    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool>;

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Delete keys of any type; returns how many existed.
    async fn delete_keys(&self, keys: &[String]) -> StoreResult<u64>;

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Create a store for the configured backend.
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| StoreError::Connection("store.redis_url is not set".into()))?;

            #[cfg(feature = "redis-backend")]
            {
                let store = RedisStore::connect(url).await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "redis-backend"))]
            {
                warn!(
                    url = %url,
                    "Redis backend feature not enabled. Falling back to in-memory store. \
                     Enable with: cargo build --features redis-backend"
                );
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Key names used by the gateway.
#[derive(Debug, Clone)]
pub struct StoreKeys {
    pub universe: String,
    pub result_prefix: String,
    pub radar_list: String,
    pub radar_set: String,
}

impl From<&StoreConfig> for StoreKeys {
    fn from(config: &StoreConfig) -> Self {
        Self {
            universe: config.universe_key.clone(),
            result_prefix: config.result_prefix.clone(),
            radar_list: config.radar_list_key.clone(),
            radar_set: config.radar_set_key.clone(),
        }
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

/// Typed access to the radar's keys.
#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StoreKeys) -> Self {
        Self { store, keys }
    }

    /// Gateway over a fresh in-memory store with default keys.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), StoreKeys::default())
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// The underlying raw store.
    pub fn raw(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn result_key(&self, symbol: &str) -> String {
        format!("{}{}", self.keys.result_prefix, symbol)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.store.ping().await
    }

    /// Replace the stored universe.
    pub async fn save_universe(&self, symbols: &[SymbolInfo]) -> StoreResult<()> {
        let encoded = symbols
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.set_list(&self.keys.universe, &encoded).await
    }

    /// Load the stored universe, skipping undecodable elements.
    pub async fn load_universe(&self) -> StoreResult<Vec<SymbolInfo>> {
        let raw = self.store.get_list(&self.keys.universe).await?;
        Ok(raw
            .iter()
            .filter_map(|item| match serde_json::from_str::<SymbolInfo>(item) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable universe entry");
                    None
                }
            })
            .collect())
    }

    /// Persist a screening result, overwriting any previous one.
    pub async fn save_result(&self, result: &ScreeningResult) -> StoreResult<()> {
        let encoded = serde_json::to_string(result)?;
        self.store
            .set(&self.result_key(&result.symbol), &encoded)
            .await
    }

    pub async fn load_result(&self, symbol: &str) -> StoreResult<Option<ScreeningResult>> {
        match self.store.get(&self.result_key(symbol)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Delete the universe, the radar and every cached result.
    pub async fn clear_all(&self) -> StoreResult<u64> {
        let mut keys = vec![
            self.keys.universe.clone(),
            self.keys.radar_list.clone(),
            self.keys.radar_set.clone(),
        ];
        keys.extend(self.store.keys_with_prefix(&self.keys.result_prefix).await?);
        self.store.delete_keys(&keys).await
    }
}
