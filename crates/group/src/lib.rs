//! # errchan-group
//!
//! A channel group lets any number of concurrently running producers write
//! into one merged stream while each may fail independently. The consumer
//! drains the stream and then asks the group for its outcome: the first
//! producer error by completion order, if any.
//!
//! - [`ChannelGroup`] - lifecycle, first-error capture, cancellation, close/drain
//! - [`Sender`] / [`Receiver`] - the merged stream (`capacity == 0` is a rendezvous)
//!
//! The first failing producer cancels the group scope. Cancellation is
//! advisory: producers poll the [`RequestContext`](errchan_shared::RequestContext)
//! they receive and decide when to stop. It never closes the stream early and
//! never drops values that are already buffered.
//!
//! ```
//! use errchan_group::ChannelGroup;
//! use errchan_shared::{ErrorCode, ErrorEnvelope, RequestContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let group = ChannelGroup::<u32>::with_context(&RequestContext::new_request(), 10);
//! group.go(|_ctx, tx| async move {
//!     for value in 1..=3 {
//!         tx.send(value).await?;
//!     }
//!     Err(ErrorEnvelope::expected(ErrorCode::new("demo", "reader_error"), "readerError"))
//! });
//!
//! let receiver = group.chan();
//! let mut acc = 0;
//! while let Some(value) = receiver.recv().await {
//!     acc += value;
//! }
//! assert_eq!(acc, 6);
//! assert_eq!(
//!     group.err().await.map_err(|error| error.message),
//!     Err("readerError".to_owned())
//! );
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod group;
mod latch;
pub mod stream;

pub use group::ChannelGroup;
pub use stream::{Receiver, SendError, Sender, channel};
