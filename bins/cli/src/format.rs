//! Output format helpers for CLI commands.

use crate::error::CliError;
use clap::{Args, ValueEnum};
use errchan_shared::ErrorEnvelope;

/// Output format choices for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-friendly text output.
    Text,
    /// Machine-friendly JSON output.
    Json,
}

/// Log line format for the stderr subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Output-related CLI flags.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output format for command responses.
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputFormat>,
    /// Format of diagnostic log lines written to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Output mode derived from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub format: OutputFormat,
}

impl OutputMode {
    /// Build output mode from CLI flags.
    #[must_use]
    pub fn from_args(args: &OutputArgs) -> Self {
        Self {
            format: args.output.unwrap_or(OutputFormat::Text),
        }
    }

    /// Returns true when JSON output is requested.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Render a group outcome for text output.
pub fn outcome_text(outcome: &Result<(), ErrorEnvelope>) -> String {
    match outcome {
        Ok(()) => "none".to_string(),
        Err(error) => error.message.clone(),
    }
}

/// Render a group outcome for JSON output (`null` on success).
pub fn outcome_json(outcome: &Result<(), ErrorEnvelope>) -> serde_json::Value {
    match outcome {
        Ok(()) => serde_json::Value::Null,
        Err(error) => serde_json::json!({
            "code": error.code.to_string(),
            "message": error.message,
        }),
    }
}

/// Serialize a payload as pretty JSON with a trailing newline.
pub fn to_pretty_json(payload: &serde_json::Value) -> Result<String, CliError> {
    let mut output = serde_json::to_string_pretty(payload)?;
    output.push('\n');
    Ok(output)
}
