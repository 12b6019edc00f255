//! Rule-based breakout scoring.
//!
//! Used whenever the remote classifier is unavailable or its answer is
//! unusable. Each rule contributes to the denominator only when its inputs
//! are present, so missing history never counts against a symbol.

use super::{BreakoutVerdict, VerdictSource};
use crate::indicators::{names, IndicatorSet};

/// Minimum confidence for a rule-based breakout.
const BREAKOUT_CONFIDENCE: f64 = 0.6;

/// Minimum raw score for a rule-based breakout.
const BREAKOUT_MIN_SCORE: f64 = 2.0;

/// Raw outcome of the rules, before it becomes a verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackScore {
    pub score: f64,
    pub max_score: f64,
    pub signals: Vec<String>,
}

impl FallbackScore {
    pub fn confidence(&self) -> f64 {
        if self.max_score > 0.0 {
            self.score / self.max_score
        } else {
            0.0
        }
    }

    pub fn is_breakout(&self) -> bool {
        self.confidence() > BREAKOUT_CONFIDENCE && self.score >= BREAKOUT_MIN_SCORE
    }
}

/// Apply the scoring rules to an indicator snapshot.
pub fn score_indicators(indicators: &IndicatorSet) -> FallbackScore {
    let mut signals = Vec::new();
    let mut score = 0.0;
    let mut max_score = 0.0;

    if let Some(rsi) = indicators.get(names::RSI) {
        max_score += 1.0;
        if rsi > 30.0 && rsi < 70.0 {
            score += 0.5;
            signals.push(format!("RSI at {:.1} (neutral range)", rsi));
        } else if rsi < 30.0 {
            score += 1.0;
            signals.push(format!("RSI at {:.1} (oversold, potential bounce)", rsi));
        } else if rsi > 70.0 {
            signals.push(format!("RSI at {:.1} (overbought, caution)", rsi));
        }
    }

    if let (Some(macd), Some(signal)) = (
        indicators.get(names::MACD),
        indicators.get(names::MACD_SIGNAL),
    ) {
        max_score += 1.0;
        if macd > signal && macd > 0.0 {
            score += 1.0;
            signals.push("MACD bullish crossover".to_string());
        } else if macd > signal {
            score += 0.5;
            signals.push("MACD above signal line".to_string());
        }
    }

    if let (Some(sma_20), Some(sma_50)) = (
        indicators.get(names::SMA_20),
        indicators.get(names::SMA_50),
    ) {
        max_score += 1.0;
        if sma_20 > sma_50 {
            score += 1.0;
            signals.push("20 SMA above 50 SMA (bullish)".to_string());
        }
    }

    // Band position against price is not evaluated; the slot is counted but never scores.
    if indicators.get(names::BOLLINGER_UPPER).is_some()
        && indicators.get(names::BOLLINGER_MIDDLE).is_some()
        && indicators.get(names::BOLLINGER_LOWER).is_some()
    {
        max_score += 1.0;
        signals.push("Bollinger Bands calculated".to_string());
    }

    if indicators.get(names::OBV).is_some() {
        signals.push("Volume analysis available".to_string());
    }

    FallbackScore {
        score,
        max_score,
        signals,
    }
}

/// Produce a rule-based verdict.
pub fn fallback_verdict(symbol: &str, indicators: &IndicatorSet) -> BreakoutVerdict {
    let scored = score_indicators(indicators);
    let is_breakout = scored.is_breakout();

    let mut reasoning = format!(
        "Rule-based analysis: {} signals detected. ",
        scored.signals.len()
    );
    reasoning.push_str(if is_breakout {
        "Multiple bullish indicators suggest potential breakout."
    } else {
        "Insufficient bullish signals for breakout confirmation."
    });

    BreakoutVerdict {
        symbol: symbol.to_string(),
        is_breakout,
        confidence: scored.confidence(),
        signals: scored.signals,
        reasoning,
        source: VerdictSource::Fallback,
    }
}
