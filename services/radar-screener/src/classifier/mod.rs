//! Breakout classification.
//!
//! `BreakoutClassifier` asks the remote backend first and degrades to
//! rule-based scoring when there is no backend, the call fails, or the
//! answer cannot be parsed. It never returns an error.
//!
//! # Flow
//!
//! ```text
//! indicators ──▶ PromptContext ──▶ backend.complete()
//!                                     │ Ok(raw)        │ Err
//!                                     ▼                ▼
//!                              parse_response      fallback
//!                         Parsed │   │ Malformed       ▲
//!                                ▼   └─────────────────┘
//!                             verdict (source = ai | fallback)
//! ```

pub mod bridge;
pub mod fallback;
pub mod response;

pub use bridge::{ChatCompletionBackend, ClassificationBackend, PromptContext};
pub use fallback::{fallback_verdict, score_indicators, FallbackScore};
pub use response::{extract_json, parse_response, ParsedResponse};

use radar_common::util::truncate_with_ellipsis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::indicators::IndicatorSet;

/// Which path produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictSource {
    Ai,
    Fallback,
}

/// Breakout decision for one symbol in one screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutVerdict {
    pub symbol: String,
    pub is_breakout: bool,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub signals: Vec<String>,
    pub reasoning: String,
    pub source: VerdictSource,
}

/// Errors from the remote backend. Never escapes the classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier not configured")]
    NotConfigured,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Empty response")]
    EmptyResponse,

    #[error("Unparseable response: {0}")]
    Malformed(String),
}

/// Remote-first classifier with deterministic fallback.
#[derive(Clone, Default)]
pub struct BreakoutClassifier {
    backend: Option<Arc<dyn ClassificationBackend>>,
}

impl BreakoutClassifier {
    pub fn new(backend: Option<Arc<dyn ClassificationBackend>>) -> Self {
        Self { backend }
    }

    pub fn with_backend(backend: Arc<dyn ClassificationBackend>) -> Self {
        Self::new(Some(backend))
    }

    /// A classifier that only uses rule-based scoring.
    pub fn fallback_only() -> Self {
        Self::default()
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Classify a symbol from its indicators and latest close.
    pub async fn classify(
        &self,
        symbol: &str,
        indicators: &IndicatorSet,
        latest_price: f64,
    ) -> BreakoutVerdict {
        match self.try_remote(symbol, indicators, latest_price).await {
            Ok(verdict) => verdict,
            Err(e) => {
                if matches!(e, ClassifierError::NotConfigured) {
                    debug!(symbol = %symbol, "No classifier backend, using rule-based scoring");
                } else {
                    warn!(symbol = %symbol, error = %e, "Classification degraded to rule-based scoring");
                }
                fallback_verdict(symbol, indicators)
            }
        }
    }

    async fn try_remote(
        &self,
        symbol: &str,
        indicators: &IndicatorSet,
        latest_price: f64,
    ) -> Result<BreakoutVerdict, ClassifierError> {
        let backend = self.backend.as_ref().ok_or(ClassifierError::NotConfigured)?;
        let prompt = PromptContext::build(symbol, indicators, latest_price);
        let raw = backend.complete(&prompt).await?;

        match parse_response(symbol, &raw) {
            ParsedResponse::Parsed(verdict) => Ok(verdict),
            ParsedResponse::Malformed(text) => Err(ClassifierError::Malformed(
                truncate_with_ellipsis(&text, 200),
            )),
        }
    }
}
