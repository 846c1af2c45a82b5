//! Demo command handlers.
//!
//! Every demo wires the same counting producer into a channel group and
//! differs only in how the consumer side behaves.

pub mod read_write;
pub mod reader;
pub mod slow_read_write;

pub use read_write::run_read_write;
pub use reader::run_reader;
pub use slow_read_write::run_slow_read_write;

use crate::error::ExitCode;
use errchan_group::ChannelGroup;
use errchan_shared::{ErrorCode, ErrorEnvelope};
use std::time::Duration;

fn demo_failure(code: &'static str, message: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::expected(ErrorCode::new("demo", code), message)
}

/// Register a producer that sends `1..=items`, sleeping `delay` before each
/// send, and then fails with `failure`.
fn spawn_counting_reader(
    group: &ChannelGroup<u64>,
    items: u32,
    delay: Duration,
    failure: ErrorEnvelope,
) {
    group.go(move |ctx, tx| async move {
        for value in 1..=u64::from(items) {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            ctx.ensure_not_cancelled("demo.reader")?;
            tx.send(value).await?;
        }
        Err(failure)
    });
}

const fn exit_code_for(outcome: &Result<(), ErrorEnvelope>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::Ok,
        Err(_) => ExitCode::ProducerFailed,
    }
}
