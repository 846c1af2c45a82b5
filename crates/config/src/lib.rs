//! # errchan-config
//!
//! Configuration schema, validation, and env/file loading for the demo CLI.
//! This crate depends on `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (file + env + flag overrides).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{DemoEnv, EnvParseError, apply_env_overrides};
pub use load::{DemoOverrides, load_demo_config_from_path, load_demo_config_std_env};
pub use schema::{
    ConfigSchemaError, DEFAULT_CAPACITY, DEFAULT_DELAY_MS, DEFAULT_ITEMS, DemoConfig,
    ValidatedDemoConfig, parse_demo_config_json, parse_demo_config_toml,
};
