//! Bridge to the remote classification service.
//!
//! Builds the analysis prompt from an indicator snapshot and sends it to an
//! OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use radar_common::config::ClassifierConfig;
use radar_common::util::{sanitize_for_log, truncate_with_ellipsis};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use super::ClassifierError;
use crate::indicators::IndicatorSet;

/// System role sent with every request.
pub const SYSTEM_PROMPT: &str =
    "You are a technical analysis expert specializing in stock market breakout detection.";

/// Everything the backend needs for one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub symbol: String,
    pub system: String,
    pub user: String,
}

impl PromptContext {
    /// Build the analysis prompt for a symbol.
    ///
    /// Only present indicators are listed, each with two decimals.
    pub fn build(symbol: &str, indicators: &IndicatorSet, latest_price: f64) -> Self {
        let mut user = format!(
            "Analyze the following technical indicators for stock {} and determine if there is a potential breakout signal.\n\nTechnical Indicators:\n",
            symbol
        );

        for (name, value) in indicators.present() {
            let _ = writeln!(user, "- {}: {:.2}", name, value);
        }

        let _ = write!(
            user,
            "\nCurrent Price Data:\n- current_price: {:.2}\n",
            latest_price
        );

        user.push_str(
            "
Analyze these indicators and provide:
1. Is there a breakout signal? (yes/no)
2. Confidence level (0-100%)
3. Key signals supporting your decision (list)
4. Brief reasoning (2-3 sentences)

Consider the following for breakout detection:
- RSI: Values above 70 indicate overbought (potential reversal), below 30 oversold (potential bounce)
- MACD: Positive crossover (MACD > Signal) is bullish, negative is bearish
- Moving Averages: Price above SMA/EMA is bullish, golden cross (50 SMA > 200 SMA) is very bullish
- Bollinger Bands: Price near upper band with high volume suggests breakout, near lower band suggests oversold
- Volume: Increasing volume confirms breakout strength
- ADX: Above 25 indicates strong trend
- Stochastic: Above 80 overbought, below 20 oversold

Respond in the following JSON format:
{
    \"is_breakout\": true/false,
    \"confidence\": 0-100,
    \"signals\": [\"signal1\", \"signal2\", ...],
    \"reasoning\": \"Your analysis here\"
}
",
        );

        Self {
            symbol: symbol.to_string(),
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }
}

/// A remote service that turns a prompt into raw answer text.
#[async_trait]
pub trait ClassificationBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &PromptContext) -> Result<String, ClassifierError>;
}

// ============================================================================
// Chat completions backend
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatAnswer,
}

#[derive(Debug, Deserialize)]
struct ChatAnswer {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct ChatCompletionBackend {
    api_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl ChatCompletionBackend {
    /// Create from config. Returns `None` when no API key is configured.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        let api_key = config.api_key()?.to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ClassificationBackend for ChatCompletionBackend {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn complete(&self, prompt: &PromptContext) -> Result<String, ClassifierError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Http {
                status: status.as_u16(),
                body: truncate_with_ellipsis(&sanitize_for_log(&body), 200),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Transport(format!("Failed to parse response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClassifierError::EmptyResponse)?;

        debug!(
            symbol = %prompt.symbol,
            chars = content.len(),
            "Classifier response received"
        );

        Ok(content)
    }
}
