//! Configuration validation for radar services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    ClassifierConfig, Config, ObservabilityConfig, ProviderConfig, ScheduleConfig, ScreenerConfig,
    ServerConfig, StoreBackend, StoreConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 7] = [
            &self.server,
            &self.provider,
            &self.classifier,
            &self.store,
            &self.screener,
            &self.schedule,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides, and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.requests_per_minute == 0 {
            return Err(ValidationError::InvalidValue {
                field: "provider.requests_per_minute".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if !(1..=30).contains(&self.lookback_years) {
            return Err(ValidationError::InvalidValue {
                field: "provider.lookback_years".into(),
                reason: format!("{} is outside 1..=30", self.lookback_years),
            });
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidValue {
                field: "provider.base_url".into(),
                reason: "must start with http:// or https://".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ClassifierConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "classifier.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ValidationError::InvalidValue {
                field: "classifier.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.backend == StoreBackend::Redis && self.redis_url.is_none() {
            return Err(ValidationError::MissingField {
                field: "store.redis_url".into(),
            });
        }
        if self.radar_list_key == self.radar_set_key {
            return Err(ValidationError::InvalidValue {
                field: "store.radar_set_key".into(),
                reason: "must differ from store.radar_list_key".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_concurrent == 0 {
            return Err(ValidationError::InvalidValue {
                field: "screener.max_concurrent".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.radar_confidence_threshold) {
            return Err(ValidationError::InvalidValue {
                field: "screener.radar_confidence_threshold".into(),
                reason: "must be between 0.0 and 1.0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Err(e) = cron::Schedule::from_str(&self.cron) {
            return Err(ValidationError::InvalidValue {
                field: "schedule.cron".into(),
                reason: e.to_string(),
            });
        }
        if self.max_concurrent == Some(0) {
            return Err(ValidationError::InvalidValue {
                field: "schedule.max_concurrent".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {:?}", LEVELS),
            });
        }
        if !FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of {:?}", FORMATS),
            });
        }
        Ok(())
    }
}
