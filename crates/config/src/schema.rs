//! Demo configuration schema.
//!
//! `DemoConfig` is the raw, serde-facing shape. `validate` turns it into a
//! `ValidatedDemoConfig`, which is the only form the CLI consumes.

use errchan_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default merged stream capacity.
pub const DEFAULT_CAPACITY: usize = 10;
/// Default number of items each demo producer sends.
pub const DEFAULT_ITEMS: u32 = 3;
/// Default per-item delay for the slow demo (ms).
pub const DEFAULT_DELAY_MS: u64 = 100;

const CAPACITY_MAX: usize = 1_000_000;
const ITEMS_MIN: u32 = 1;
const ITEMS_MAX: u32 = 10_000;
const DELAY_MAX_MS: u64 = 60_000;

/// Demo configuration as read from files, env, and flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DemoConfig {
    /// Merged stream capacity. `0` means every send is a rendezvous.
    pub capacity: usize,
    /// Number of items the demo producer sends.
    pub items: u32,
    /// Per-item delay for the slow demo (ms).
    pub delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            items: DEFAULT_ITEMS,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl DemoConfig {
    /// Validate bounds and wrap the config.
    pub fn validate(self) -> Result<ValidatedDemoConfig, ConfigSchemaError> {
        bounded("capacity", as_u64(self.capacity), 0, as_u64(CAPACITY_MAX))?;
        bounded(
            "items",
            u64::from(self.items),
            u64::from(ITEMS_MIN),
            u64::from(ITEMS_MAX),
        )?;
        bounded("delayMs", self.delay_ms, 0, DELAY_MAX_MS)?;
        Ok(ValidatedDemoConfig { raw: self })
    }
}

/// Config that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDemoConfig {
    raw: DemoConfig,
}

impl ValidatedDemoConfig {
    /// Borrow the raw config.
    #[must_use]
    pub const fn as_ref(&self) -> &DemoConfig {
        &self.raw
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> DemoConfig {
        self.raw
    }

    /// Merged stream capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.raw.capacity
    }

    /// Number of items per demo producer.
    #[must_use]
    pub const fn items(&self) -> u32 {
        self.raw.items
    }

    /// Per-item delay (ms).
    #[must_use]
    pub const fn delay_ms(&self) -> u64 {
        self.raw.delay_ms
    }
}

/// Parse and validate a JSON config document.
pub fn parse_demo_config_json(input: &str) -> Result<ValidatedDemoConfig, ErrorEnvelope> {
    let config: DemoConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
        .with_metadata("source", "config")
    })?;
    config.validate().map_err(ErrorEnvelope::from)
}

/// Parse and validate a TOML config document.
pub fn parse_demo_config_toml(input: &str) -> Result<ValidatedDemoConfig, ErrorEnvelope> {
    let config: DemoConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
        .with_metadata("source", "config")
    })?;
    config.validate().map_err(ErrorEnvelope::from)
}

/// Schema validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// A numeric value is out of bounds.
    LimitOutOfRange {
        /// Field name in the config file (e.g. `delayMs`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "limit_out_of_range"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitOutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{field} must be between {min} and {max} (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::LimitOutOfRange {
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value.to_string())
                .with_metadata("min", min.to_string())
                .with_metadata("max", max.to_string()),
        }
    }
}

fn bounded(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigSchemaError> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigSchemaError::LimitOutOfRange {
        field,
        value,
        min,
        max,
    })
}

fn as_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
