//! Environment variable overrides.
//!
//! Env parsing is split from application so the parse step can be tested
//! against a plain map without touching the process environment.

use crate::{ConfigSchemaError, DemoConfig, ValidatedDemoConfig};
use errchan_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Env var: merged stream capacity.
pub const ENV_CAPACITY: &str = "ERRCHAN_CAPACITY";
/// Env var: items per demo producer.
pub const ENV_ITEMS: &str = "ERRCHAN_ITEMS";
/// Env var: per-item delay in milliseconds.
pub const ENV_DELAY_MS: &str = "ERRCHAN_DELAY_MS";

const ALL_VARS: [&str; 3] = [ENV_CAPACITY, ENV_ITEMS, ENV_DELAY_MS];

/// Typed env-derived overrides for `DemoConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoEnv {
    /// Override for `capacity`.
    pub capacity: Option<usize>,
    /// Override for `items`.
    pub items: Option<u32>,
    /// Override for `delayMs`.
    pub delay_ms: Option<u64>,
}

impl DemoEnv {
    /// Parse overrides from an explicit variable map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            capacity: parse_optional(map, ENV_CAPACITY)?,
            items: parse_optional(map, ENV_ITEMS)?,
            delay_ms: parse_optional(map, ENV_DELAY_MS)?,
        })
    }

    /// Parse overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_owned(), value);
            }
        }
        Self::from_map(&map)
    }

    /// True when no override is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.capacity.is_none() && self.items.is_none() && self.delay_ms.is_none()
    }

    pub(crate) const fn apply_to(&self, config: &mut DemoConfig) {
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(items) = self.items {
            config.items = items;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
    }
}

/// Apply env overrides on top of `config` and validate the result.
pub fn apply_env_overrides(
    mut config: DemoConfig,
    env: &DemoEnv,
) -> Result<ValidatedDemoConfig, ConfigSchemaError> {
    env.apply_to(&mut config);
    config.validate()
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidInt { var, .. } => {
                write!(formatter, "{var} must be a non-negative integer")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidInt { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", value),
        }
    }
}

fn parse_optional<T: FromStr>(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<T>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: raw.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn empty_map_has_no_overrides() {
        let env = DemoEnv::from_map(&BTreeMap::new());
        assert_eq!(env.as_ref().map(DemoEnv::is_empty), Ok(true));
    }

    #[test]
    fn parses_trimmed_values() {
        let env = DemoEnv::from_map(&map(&[
            (ENV_CAPACITY, " 0 "),
            (ENV_ITEMS, "25"),
            (ENV_DELAY_MS, "5"),
        ]));
        assert_eq!(
            env,
            Ok(DemoEnv {
                capacity: Some(0),
                items: Some(25),
                delay_ms: Some(5),
            })
        );
    }

    #[test]
    fn rejects_empty_and_invalid_values() {
        assert_eq!(
            DemoEnv::from_map(&map(&[(ENV_ITEMS, "  ")])),
            Err(EnvParseError::EmptyValue { var: ENV_ITEMS })
        );
        assert_eq!(
            DemoEnv::from_map(&map(&[(ENV_DELAY_MS, "-1")])),
            Err(EnvParseError::InvalidInt {
                var: ENV_DELAY_MS,
                value: "-1".to_owned(),
            })
        );
    }

    #[test]
    fn env_error_maps_to_envelope() {
        let envelope = ErrorEnvelope::from(EnvParseError::InvalidInt {
            var: ENV_CAPACITY,
            value: "lots".to_owned(),
        });
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_env_int"));
        assert_eq!(envelope.metadata_value("env_var"), Some(ENV_CAPACITY));
        assert_eq!(envelope.metadata_value("value"), Some("lots"));
    }

    #[test]
    fn overrides_apply_then_validate() {
        let env = DemoEnv {
            items: Some(9),
            ..DemoEnv::default()
        };
        let validated = apply_env_overrides(DemoConfig::default(), &env);
        assert_eq!(
            validated.map(|config| (config.items(), config.capacity())),
            Ok((9, 10))
        );

        let env = DemoEnv {
            items: Some(0),
            ..DemoEnv::default()
        };
        assert!(apply_env_overrides(DemoConfig::default(), &env).is_err());
    }
}
