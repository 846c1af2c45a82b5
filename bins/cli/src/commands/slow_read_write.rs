//! Slow read-write demo: both sides sleep per item, so the buffer lets the
//! producer run ahead while the consumer works.

use super::{demo_failure, exit_code_for, spawn_counting_reader};
use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, outcome_json, outcome_text, to_pretty_json};
use errchan_config::ValidatedDemoConfig;
use errchan_group::ChannelGroup;
use errchan_shared::RequestContext;
use std::time::{Duration, Instant};
use tracing::debug;

/// Run the slow read-write demo.
pub async fn run_slow_read_write(
    mode: OutputMode,
    config: &ValidatedDemoConfig,
) -> Result<CliOutput, CliError> {
    let delay = Duration::from_millis(config.delay_ms());
    let ctx = RequestContext::new_request();
    let group = ChannelGroup::<u64>::with_context(&ctx, config.capacity());
    spawn_counting_reader(
        &group,
        config.items(),
        delay,
        demo_failure("reader_fail", "readerFail"),
    );

    let started = Instant::now();
    let receiver = group.chan();
    let mut sum = 0u64;
    while let Some(value) = receiver.recv().await {
        sum += value;
        tokio::time::sleep(delay).await;
    }
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let outcome = group.err().await;
    debug!(correlation_id = %ctx.correlation_id(), sum, elapsed_ms, "slow read-write demo finished");

    let stdout = if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "command": "slow-read-write",
            "sum": sum,
            "elapsedMs": elapsed_ms,
            "error": outcome_json(&outcome),
        }))?
    } else {
        format!(
            "elapsed: {elapsed_ms}ms\nsum: {sum}\nerror: {}\n",
            outcome_text(&outcome)
        )
    };

    Ok(CliOutput {
        stdout,
        exit_code: exit_code_for(&outcome),
    })
}
