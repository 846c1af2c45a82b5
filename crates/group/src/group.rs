//! `ChannelGroup`: fallible producers fanned into one merged stream.
//!
//! Lifecycle:
//! - `with_context` derives a child cancellation scope and allocates the stream;
//!   nothing runs yet
//! - `go` spawns a producer; the first producer error (by completion order) is
//!   recorded and cancels the group scope
//! - `chan`, `wait`, `err` and `close` start the closer task exactly once; it
//!   waits for every producer, then closes the stream
//! - once the closer is done the group is quiescent and its outcome is sealed
//!
//! Drain policy: `wait` and `err` never discard values. Anything left unread
//! stays buffered until it is received, so a producer parked on a full buffer
//! keeps `wait` pending until somebody reads. `close` drains: it drops unread
//! values and accepts later sends without keeping them, then waits.

use crate::latch::Latch;
use crate::stream::{self, Receiver, Sender};
use errchan_shared::{ErrorEnvelope, RequestContext};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// A group of producers writing into one merged stream.
///
/// Cloning is cheap and every clone refers to the same group.
///
/// Producers and the closer run on the tokio runtime: `go`, `chan`, `wait`,
/// `err` and `close` must be called from within one.
pub struct ChannelGroup<T, E = ErrorEnvelope> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ChannelGroup<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, E> {
    ctx: RequestContext,
    sender: Sender<T>,
    receiver: Receiver<T>,
    producers: TaskTracker,
    outcome: Mutex<Outcome<E>>,
    closer_started: Latch,
    drained: Latch,
    quiescent: watch::Sender<bool>,
    next_producer: AtomicU64,
}

struct Outcome<E> {
    first_error: Option<E>,
    sealed: bool,
}

impl<T, E> ChannelGroup<T, E> {
    /// Create a group bound to `parent` with a stream of `capacity` values.
    ///
    /// Cancelling `parent` cancels the group; cancelling the group never
    /// touches `parent`. A capacity of `0` makes every send a rendezvous.
    pub fn with_context(parent: &RequestContext, capacity: usize) -> Self {
        let (sender, receiver) = stream::channel(capacity);
        let (quiescent, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                ctx: parent.child(),
                sender,
                receiver,
                producers: TaskTracker::new(),
                outcome: Mutex::new(Outcome {
                    first_error: None,
                    sealed: false,
                }),
                closer_started: Latch::new(),
                drained: Latch::new(),
                quiescent,
                next_producer: AtomicU64::new(0),
            }),
        }
    }

    /// Create a group under a fresh root request context.
    pub fn new(capacity: usize) -> Self {
        Self::with_context(&RequestContext::new_request(), capacity)
    }

    /// The group's cancellation scope, as handed to every producer.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.inner.ctx
    }

    /// Stream capacity (`0` for rendezvous).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.sender.capacity()
    }

    /// Returns true once the group scope is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.ctx.is_cancelled()
    }

    /// Cancel the group scope without recording an error.
    ///
    /// Producers only stop if they poll the scope.
    pub fn cancel(&self) {
        self.inner.ctx.cancel();
    }

    /// Returns true once every producer finished and the stream is closed.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        *self.inner.quiescent.borrow()
    }
}

impl<T, E> ChannelGroup<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Register a producer and run it as a new task.
    ///
    /// The producer receives the group scope and a sender. Registering never
    /// blocks; failures surface later through [`err`](Self::err). A producer
    /// registered after the group went quiescent still runs, but its sends
    /// fail and its error is ignored.
    pub fn go<F, Fut>(&self, producer: F)
    where
        F: FnOnce(RequestContext, Sender<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Debug,
    {
        let id = self.inner.next_producer.fetch_add(1, Ordering::Relaxed);
        if self.is_quiescent() {
            debug!(
                correlation_id = %self.inner.ctx.correlation_id(),
                producer = id,
                "producer registered after the stream closed"
            );
        } else {
            trace!(
                correlation_id = %self.inner.ctx.correlation_id(),
                producer = id,
                "producer registered"
            );
        }

        let inner = Arc::clone(&self.inner);
        let ctx = self.inner.ctx.clone();
        let sender = self.inner.sender.clone();
        self.inner.producers.spawn(async move {
            if let Err(error) = producer(ctx, sender).await {
                inner.record_error(id, error);
            }
        });
    }

    /// Receiving view of the merged stream. Starts the closer.
    ///
    /// The stream ends once every producer has returned.
    pub fn chan(&self) -> Receiver<T> {
        self.start_closer();
        self.inner.receiver.clone()
    }

    /// Wait until every producer has returned and the stream is closed.
    ///
    /// Does not drain: values nobody reads stay buffered.
    pub async fn wait(&self) {
        self.start_closer();
        let mut quiescent = self.inner.quiescent.subscribe();
        // The watch sender lives in `inner`, so this only resolves on `true`.
        let _ = quiescent.wait_for(|done| *done).await;
    }

    fn start_closer(&self) {
        if !self.inner.closer_started.fire() {
            return;
        }
        debug!(
            correlation_id = %self.inner.ctx.correlation_id(),
            capacity = self.capacity(),
            "channel group closer started"
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_closer().await });
    }
}

impl<T, E> ChannelGroup<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wait for quiescence and return the first producer error, if any.
    pub async fn err(&self) -> Result<(), E> {
        self.wait().await;
        self.inner.first_error().map_or(Ok(()), Err)
    }

    /// Drain unread values, wait for quiescence, and return the outcome.
    ///
    /// Releases producers parked on a full buffer, so it completes even if
    /// the consumer abandoned the stream. After it returns, receiving yields
    /// `None` immediately.
    pub async fn close(&self) -> Result<(), E> {
        self.start_closer();
        if self.inner.drained.fire() {
            let discarded = self.inner.sender.discard();
            debug!(
                correlation_id = %self.inner.ctx.correlation_id(),
                discarded,
                "channel group draining unread values"
            );
        }
        self.err().await
    }
}

impl<T, E> Inner<T, E> {
    fn lock_outcome(&self) -> MutexGuard<'_, Outcome<E>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn first_error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.lock_outcome().first_error.clone()
    }

    fn record_error(&self, producer: u64, error: E)
    where
        E: fmt::Debug,
    {
        let mut outcome = self.lock_outcome();
        if outcome.sealed || outcome.first_error.is_some() {
            drop(outcome);
            trace!(
                correlation_id = %self.ctx.correlation_id(),
                producer,
                ?error,
                "producer error ignored"
            );
            return;
        }

        debug!(
            correlation_id = %self.ctx.correlation_id(),
            producer,
            ?error,
            "producer failed; cancelling group"
        );
        outcome.first_error = Some(error);
        drop(outcome);
        self.ctx.cancel();
    }

    async fn run_closer(&self) {
        self.producers.close();
        self.producers.wait().await;
        self.sender.close();
        self.lock_outcome().sealed = true;
        self.quiescent.send_replace(true);
        debug!(
            correlation_id = %self.ctx.correlation_id(),
            failed = self.lock_outcome().first_error.is_some(),
            "channel group closed"
        );
    }
}

impl<T, E> fmt::Debug for ChannelGroup<T, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChannelGroup")
            .field("correlation_id", &self.inner.ctx.correlation_id().as_str())
            .field("capacity", &self.capacity())
            .field("cancelled", &self.is_cancelled())
            .field("draining", &self.inner.drained.is_fired())
            .field("quiescent", &self.is_quiescent())
            .finish_non_exhaustive()
    }
}
