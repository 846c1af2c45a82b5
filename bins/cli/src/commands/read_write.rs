//! Read-write demo: the consumer gives up at the last value with its own
//! error, and `close` drains whatever the producer still has in flight.

use super::{demo_failure, exit_code_for, spawn_counting_reader};
use crate::CliOutput;
use crate::error::CliError;
use crate::format::{OutputMode, outcome_json, outcome_text, to_pretty_json};
use errchan_config::ValidatedDemoConfig;
use errchan_group::ChannelGroup;
use errchan_shared::{ErrorEnvelope, RequestContext};
use std::time::Duration;
use tracing::debug;

/// Run the read-write demo.
pub async fn run_read_write(
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

    let (count, consumer) = write_until_last(&group, u64::from(config.items())).await;
    let outcome = group.close().await;
    debug!(correlation_id = %ctx.correlation_id(), count, "read-write demo finished");

    let stdout = if mode.is_json() {
        to_pretty_json(&serde_json::json!({
            "command": "read-write",
            "count": count,
            "consumerError": outcome_json(&consumer),
            "error": outcome_json(&outcome),
        }))?
    } else {
        format!(
            "consumer error: {}\ncount: {count}\nerror: {}\n",
            outcome_text(&consumer),
            outcome_text(&outcome)
        )
    };

    Ok(CliOutput {
        stdout,
        exit_code: exit_code_for(&outcome),
    })
}

async fn write_until_last(group: &ChannelGroup<u64>, last: u64) -> (u64, Result<(), ErrorEnvelope>) {
    let receiver = group.chan();
    let mut count = 0u64;
    while let Some(value) = receiver.recv().await {
        count += 1;
        if value == last {
            return (count, Err(demo_failure("writer_error", "writerError")));
        }
    }
    (count, Ok(()))
}
