//! Reader demo: drain everything, then report the producer's error.

use super::{demo_failure, exit_code_for, spawn_counting_reader};
use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, outcome_json, outcome_text, to_pretty_json};
use errchan_config::ValidatedDemoConfig;
use errchan_group::ChannelGroup;
use errchan_shared::RequestContext;
use std::time::Duration;
use tracing::debug;

/// Run the reader demo.
pub async fn run_reader(
    mode: OutputMode,
    config: &ValidatedDemoConfig,
) -> Result<CliOutput, CliError> {
    let ctx = RequestContext::new_request();
    let group = ChannelGroup::<u64>::with_context(&ctx, config.capacity());
    spawn_counting_reader(
        &group,
        config.items(),
        Duration::ZERO,
        demo_failure("reader_error", "readerError"),
    );

    let receiver = group.chan();
    let mut sum = 0u64;
    while let Some(value) = receiver.recv().await {
        sum += value;
    }
    let outcome = group.err().await;
    debug!(correlation_id = %ctx.correlation_id(), sum, "reader demo finished");

    let stdout = if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "command": "reader",
            "sum": sum,
            "error": outcome_json(&outcome),
        }))?
    } else {
        format!("sum: {sum}\nerror: {}\n", outcome_text(&outcome))
    };

    Ok(CliOutput {
        stdout,
        exit_code: exit_code_for(&outcome),
    })
}
