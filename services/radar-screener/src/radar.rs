//! Radar queue.
//!
//! The deduplicated watchlist of symbols flagged as breakout candidates.
//! The membership set is authoritative for `contains`; the ordered list is
//! authoritative for enumeration. A symbol is never listed twice because
//! the set is consulted (and claimed) before the list is touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::BreakoutVerdict;
use crate::store::{StoreGateway, StoreResult};

/// One flagged symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarEntry {
    pub symbol: String,
    pub added_at: DateTime<Utc>,
    pub verdict: BreakoutVerdict,
    pub last_price: Option<f64>,
}

/// Deduplicated, insertion-ordered radar over the store.
#[derive(Clone)]
pub struct RadarQueue {
    store: StoreGateway,
}

impl RadarQueue {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Add a symbol. Returns true only if a new entry was inserted.
    ///
    /// Re-adding a tracked symbol is a no-op, not an update.
    pub async fn add(
        &self,
        symbol: &str,
        verdict: BreakoutVerdict,
        last_price: Option<f64>,
    ) -> StoreResult<bool> {
        let keys = self.store.keys();
        let raw = self.store.raw();

        if raw.set_contains(&keys.radar_set, symbol).await? {
            info!(symbol = %symbol, "Symbol already tracked on radar");
            return Ok(false);
        }

        // Claiming membership first means two racing adders cannot both append.
        if !raw.set_add(&keys.radar_set, symbol).await? {
            info!(symbol = %symbol, "Symbol already tracked on radar");
            return Ok(false);
        }

        let entry = RadarEntry {
            symbol: symbol.to_string(),
            added_at: Utc::now(),
            verdict,
            last_price,
        };

        let appended = match serde_json::to_string(&entry) {
            Ok(encoded) => raw.list_append(&keys.radar_list, &encoded).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = appended {
            if let Err(rollback) = raw.set_remove(&keys.radar_set, symbol).await {
                warn!(symbol = %symbol, error = %rollback, "Failed to roll back radar membership");
            }
            return Err(e);
        }

        info!(
            symbol = %symbol,
            confidence = entry.verdict.confidence,
            "Added to radar"
        );
        Ok(true)
    }

    /// Remove a symbol. Returns true if it was tracked.
    ///
    /// Membership is cleared first; list cleanup is best-effort.
    pub async fn remove(&self, symbol: &str) -> StoreResult<bool> {
        let keys = self.store.keys();
        let raw = self.store.raw();

        let was_member = raw.set_remove(&keys.radar_set, symbol).await?;

        match raw.get_list(&keys.radar_list).await {
            Ok(items) => {
                for item in items
                    .iter()
                    .filter(|item| entry_symbol(item).as_deref() == Some(symbol))
                {
                    if let Err(e) = raw.list_remove(&keys.radar_list, item).await {
                        warn!(symbol = %symbol, error = %e, "Failed to remove radar list entry");
                    }
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to read radar list during removal");
            }
        }

        if was_member {
            info!(symbol = %symbol, "Removed from radar");
        } else {
            debug!(symbol = %symbol, "Symbol was not on radar");
        }
        Ok(was_member)
    }

    /// Entries in insertion order, skipping undecodable elements.
    pub async fn list_all(&self) -> StoreResult<Vec<RadarEntry>> {
        let items = self.store.raw().get_list(&self.store.keys().radar_list).await?;
        Ok(items
            .iter()
            .filter_map(|item| match serde_json::from_str::<RadarEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable radar entry");
                    None
                }
            })
            .collect())
    }

    pub async fn count(&self) -> StoreResult<usize> {
        Ok(self
            .store
            .raw()
            .get_list(&self.store.keys().radar_list)
            .await?
            .len())
    }

    pub async fn contains(&self, symbol: &str) -> StoreResult<bool> {
        self.store
            .raw()
            .set_contains(&self.store.keys().radar_set, symbol)
            .await
    }

    /// Drop every entry and membership.
    pub async fn clear(&self) -> StoreResult<()> {
        let keys = self.store.keys();
        self.store
            .raw()
            .delete_keys(&[keys.radar_list.clone(), keys.radar_set.clone()])
            .await?;
        info!("Radar cleared");
        Ok(())
    }
}

fn entry_symbol(raw: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct SymbolOnly {
        symbol: String,
    }

    serde_json::from_str::<SymbolOnly>(raw)
        .ok()
        .map(|entry| entry.symbol)
}
