//! Parsing of remote classifier answers.
//!
//! The answer is free text expected to contain
//! `{"is_breakout": bool, "confidence": 0-100, "signals": [...], "reasoning": "..."}`,
//! possibly wrapped in a fenced code block.

use serde::Deserialize;

use super::{BreakoutVerdict, VerdictSource};

/// Outcome of parsing a remote answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Parsed(BreakoutVerdict),
    /// The raw text, kept for logging.
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_breakout: bool,
    confidence: f64,
    #[serde(default)]
    signals: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

/// Pull the JSON object out of a model answer.
///
/// Fenced blocks (```json or bare ```) win; otherwise the first balanced
/// `{...}` span is used; braces inside string literals are ignored.
pub fn extract_json(content: &str) -> Option<&str> {
    let content = content.trim();

    for fence in ["```json", "```"] {
        if let Some(start) = content.find(fence) {
            let start = start + fence.len();
            if let Some(end) = content[start..].find("```") {
                return Some(content[start..start + end].trim());
            }
        }
    }

    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in content[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&content[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse a model answer into a verdict for `symbol`.
///
/// Confidence is read on a 0-100 scale and normalized to 0-1.
pub fn parse_response(symbol: &str, raw: &str) -> ParsedResponse {
    let Some(json) = extract_json(raw) else {
        return ParsedResponse::Malformed(raw.to_string());
    };

    match serde_json::from_str::<RawVerdict>(json) {
        Ok(parsed) if parsed.confidence.is_finite() => ParsedResponse::Parsed(BreakoutVerdict {
            symbol: symbol.to_string(),
            is_breakout: parsed.is_breakout,
            confidence: (parsed.confidence / 100.0).clamp(0.0, 1.0),
            signals: parsed.signals,
            reasoning: parsed.reasoning,
            source: VerdictSource::Ai,
        }),
        _ => ParsedResponse::Malformed(raw.to_string()),
    }
}
