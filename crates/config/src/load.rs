//! Config loading helpers (file + env + flag overrides).
//!
//! The loader owns the merge order and surfaces user-facing errors as typed
//! `ErrorEnvelope`s.

use crate::{DemoConfig, DemoEnv, ValidatedDemoConfig};
use errchan_shared::{ErrorCode, ErrorEnvelope};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Explicit overrides, usually taken from CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoOverrides {
    /// Override for `capacity`.
    pub capacity: Option<usize>,
    /// Override for `items`.
    pub items: Option<u32>,
    /// Override for `delayMs`.
    pub delay_ms: Option<u64>,
}

impl DemoOverrides {
    const fn apply_to(self, config: &mut DemoConfig) {
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

/// Load the demo config from an optional file path.
///
/// Precedence (highest wins):
/// - explicit overrides (`DemoOverrides`)
/// - env overrides (`DemoEnv`)
/// - config file (`.json` or `.toml`)
/// - defaults (`DemoConfig::default()`)
///
/// Validation runs once, on the merged result.
pub fn load_demo_config_from_path(
    config_path: Option<&Path>,
    env: &DemoEnv,
    overrides: DemoOverrides,
) -> Result<ValidatedDemoConfig, ErrorEnvelope> {
    let mut config = match config_path {
        None => DemoConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            debug!(path = %path.display(), format = ?format, "loading config file");
            parse_config_unvalidated(&config_text, format)?
        },
    };

    env.apply_to(&mut config);
    overrides.apply_to(&mut config);

    config.validate().map_err(ErrorEnvelope::from)
}

/// Load the demo config from std env and an optional file path.
pub fn load_demo_config_std_env(
    config_path: Option<&Path>,
    overrides: DemoOverrides,
) -> Result<ValidatedDemoConfig, ErrorEnvelope> {
    let env = DemoEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_demo_config_from_path(config_path, &env, overrides)
}

fn parse_config_unvalidated(input: &str, format: ConfigFormat) -> Result<DemoConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid config JSON: {error}"),
            )
            .with_metadata("source", "config")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid config TOML: {error}"),
            )
            .with_metadata("source", "config")
        }),
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        other => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.unwrap_or_default().to_owned())),
    }
}
