//! Breakout screening.
//!
//! Drives the per-symbol pipeline and fans it out across the stored
//! universe.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Screener                                   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  universe ──▶ JoinSet (≤ max_concurrent) ──▶ AggregateReport     │
//! │                    │                                             │
//! │                    ▼  per symbol                                 │
//! │   fetch ──▶ compute ──▶ classify ──▶ persist ──▶ maybe radar     │
//! │   └──────── cancellable ─────────┘   └──── always completes ───┘ │
//! │                                                                  │
//! │  ScreenerScheduler: cron ──▶ screen_all (no overlap)             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod orchestrator;
pub mod report;
pub mod scheduler;

pub use orchestrator::{HealthReport, RunClaim, ScreenSettings, Screener};
pub use report::AggregateReport;
pub use scheduler::{SchedulerState, SchedulerStatus, ScreenerScheduler};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::BreakoutVerdict;
use crate::indicators::IndicatorSet;
use crate::store::StoreError;

/// The persisted unit of one successful screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub symbol: String,
    pub indicators: IndicatorSet,
    pub latest_price: f64,
    pub verdict: BreakoutVerdict,
    pub data_points: usize,
    pub screened_at: DateTime<Utc>,
}

/// Why a symbol's pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Computation,
    Persistence,
    Panicked,
    Cancelled,
}

/// Outcome of screening one symbol. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScreenOutcome {
    Screened {
        result: ScreeningResult,
        added_to_radar: bool,
    },
    NoData {
        symbol: String,
    },
    Failed {
        symbol: String,
        kind: FailureKind,
        message: String,
    },
}

impl ScreenOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Screened { result, .. } => &result.symbol,
            Self::NoData { symbol } | Self::Failed { symbol, .. } => symbol,
        }
    }

    pub(crate) fn failed(symbol: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            symbol: symbol.to_string(),
            kind,
            message: message.into(),
        }
    }
}

/// Run-level errors. Per-symbol problems never surface here.
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Symbol universe is empty; initialize it first")]
    UniverseEmpty,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Universe source error: {0}")]
    Universe(String),

    #[error("A screening run is already in progress")]
    AlreadyRunning,
}

impl From<ScreenerError> for radar_common::Error {
    fn from(e: ScreenerError) -> Self {
        match e {
            ScreenerError::UniverseEmpty => Self::InvalidInput(e.to_string()),
            ScreenerError::AlreadyRunning => Self::Conflict(e.to_string()),
            ScreenerError::Store(_) | ScreenerError::Universe(_) => Self::External(e.to_string()),
        }
    }
}
