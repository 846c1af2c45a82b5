//! The merged stream: a closable multi-producer FIFO with explicit capacity.
//!
//! - `capacity == 0` is a rendezvous: a send completes only by handing its
//!   value to a parked receiver
//! - `capacity > 0` buffers up to `capacity` values before sends wait
//! - closing keeps buffered values readable; receivers see `None` once empty
//! - discarding (drain) drops buffered values and accepts later sends without
//!   keeping them, so no sender stays parked on a stream nobody reads
//!
//! The state lock is only taken for bounded, non-blocking updates and is never
//! held across an `.await`.

use errchan_shared::{ErrorCode, ErrorEnvelope};
use futures_util::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Create a connected sender/receiver pair with the given capacity.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        capacity,
        state: Mutex::new(State {
            items: VecDeque::new(),
            waiting_consumers: VecDeque::new(),
            waiting_producers: VecDeque::new(),
            closed: false,
            discarding: false,
        }),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

/// Error returned by [`Sender::send`] once the stream is closed.
///
/// Carries the rejected value back to the caller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Recover the value that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SendError(..)")
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("send on a closed stream")
    }
}

impl<T> std::error::Error for SendError<T> {}

impl<T> From<SendError<T>> for ErrorEnvelope {
    fn from(_: SendError<T>) -> Self {
        Self::expected(
            ErrorCode::new("group", "stream_closed"),
            "send on a closed stream",
        )
    }
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
}

struct State<T> {
    items: VecDeque<T>,
    waiting_consumers: VecDeque<oneshot::Sender<T>>,
    waiting_producers: VecDeque<oneshot::Sender<()>>,
    closed: bool,
    discarding: bool,
}

impl<T> State<T> {
    /// Let one parked producer retry.
    fn release_one_producer(&mut self) {
        while let Some(producer) = self.waiting_producers.pop_front() {
            if producer.send(()).is_ok() {
                break;
            }
        }
    }
}

enum SendAttempt<T> {
    Done(Result<(), SendError<T>>),
    Discarded(T),
    Park(T, oneshot::Receiver<()>),
}

enum RecvAttempt<T> {
    Ready(Option<T>),
    Park(oneshot::Receiver<T>),
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_send(&self, mut value: T) -> SendAttempt<T> {
        let mut state = self.lock();
        if state.closed {
            return SendAttempt::Done(Err(SendError(value)));
        }
        if state.discarding {
            return SendAttempt::Discarded(value);
        }

        // If a consumer is parked, hand the value over directly.
        while let Some(consumer) = state.waiting_consumers.pop_front() {
            match consumer.send(value) {
                Ok(()) => return SendAttempt::Done(Ok(())),
                Err(returned) => value = returned,
            }
        }

        if state.items.len() < self.capacity {
            state.items.push_back(value);
            return SendAttempt::Done(Ok(()));
        }

        let (tx, rx) = oneshot::channel::<()>();
        state.waiting_producers.push_back(tx);
        SendAttempt::Park(value, rx)
    }

    fn try_recv(&self) -> RecvAttempt<T> {
        let mut state = self.lock();

        if let Some(item) = state.items.pop_front() {
            // Capacity was just freed.
            state.release_one_producer();
            return RecvAttempt::Ready(Some(item));
        }

        if state.closed {
            return RecvAttempt::Ready(None);
        }

        let (tx, rx) = oneshot::channel::<T>();
        state.waiting_consumers.push_back(tx);
        // A rendezvous producer can only complete against a parked consumer.
        state.release_one_producer();
        RecvAttempt::Park(rx)
    }

    /// Put back a value that was handed to a receiver which went away.
    ///
    /// Another parked receiver gets it first; otherwise it returns to the head
    /// of the queue.
    fn restore(&self, mut value: T) {
        let mut state = self.lock();
        if state.discarding {
            drop(state);
            drop(value);
            return;
        }
        while let Some(consumer) = state.waiting_consumers.pop_front() {
            match consumer.send(value) {
                Ok(()) => return,
                Err(returned) => value = returned,
            }
        }
        state.items.push_front(value);
    }

    fn close(&self) -> bool {
        let (consumers, producers) = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            (
                std::mem::take(&mut state.waiting_consumers),
                std::mem::take(&mut state.waiting_producers),
            )
        };
        // Dropping the slots wakes parked receivers (end of sequence) and
        // parked senders (which then observe `closed`).
        drop(consumers);
        drop(producers);
        true
    }

    fn discard(&self) -> usize {
        let (items, producers) = {
            let mut state = self.lock();
            state.discarding = true;
            (
                std::mem::take(&mut state.items),
                std::mem::take(&mut state.waiting_producers),
            )
        };
        let discarded = items.len();
        drop(items);
        drop(producers);
        discarded
    }
}

/// Sending half of the merged stream. Cheap to clone.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Sender")
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> Sender<T> {
    /// Send a value, waiting while the buffer is full (or, for a rendezvous
    /// stream, until a receiver takes it).
    ///
    /// Cancellation never interrupts a send. The only failure is a closed
    /// stream, in which case the value is returned inside the error. While the
    /// stream is being drained the value is accepted and dropped.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut value = value;
        loop {
            let gate = match self.shared.try_send(value) {
                SendAttempt::Done(result) => return result,
                SendAttempt::Discarded(dropped) => {
                    drop(dropped);
                    return Ok(());
                },
                SendAttempt::Park(returned, gate) => {
                    value = returned;
                    gate
                },
            };
            let mut parked = ParkedSend {
                shared: &self.shared,
                gate,
                finished: false,
            };
            // Released on freed capacity, a parked receiver, drain or close;
            // every case is re-checked on the next pass.
            let _ = (&mut parked.gate).await;
            parked.finished = true;
        }
    }

    /// Returns the configured capacity (`0` for a rendezvous stream).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns true once the stream has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Close the stream. Returns false when it was already closed.
    pub(crate) fn close(&self) -> bool {
        self.shared.close()
    }

    /// Enter drain mode; returns how many buffered values were dropped.
    pub(crate) fn discard(&self) -> usize {
        self.shared.discard()
    }
}

/// Receiving half of the merged stream. Cheap to clone; clones share one queue.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Receiver")
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> Receiver<T> {
    /// Receive the next value; `None` once the stream is closed and empty.
    ///
    /// Cancel-safe: if the returned future is dropped after a value was handed
    /// to it, that value goes back to the head of the queue.
    pub async fn recv(&self) -> Option<T> {
        let slot = match self.shared.try_recv() {
            RecvAttempt::Ready(item) => return item,
            RecvAttempt::Park(slot) => slot,
        };

        let mut pending = PendingRecv {
            shared: &self.shared,
            slot,
            finished: false,
        };
        // A dropped slot sender means the stream closed while we were parked.
        let item = (&mut pending.slot).await.ok();
        pending.finished = true;
        item
    }

    /// Number of values currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Returns true when no values are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.lock().items.is_empty()
    }

    /// Returns true once the stream has been closed (buffered values may remain).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Consume the receiver as a lazy, finite `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures_util::stream::unfold(self, |receiver| async move {
            let item = receiver.recv().await?;
            Some((item, receiver))
        })
    }
}

struct ParkedSend<'a, T> {
    shared: &'a Shared<T>,
    gate: oneshot::Receiver<()>,
    finished: bool,
}

impl<T> Drop for ParkedSend<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.gate.close();
        // A release that arrived but was never acted on moves to the next sender.
        if self.gate.try_recv().is_ok() {
            self.shared.lock().release_one_producer();
        }
    }
}

struct PendingRecv<'a, T> {
    shared: &'a Shared<T>,
    slot: oneshot::Receiver<T>,
    finished: bool,
}

impl<T> Drop for PendingRecv<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.slot.close();
        if let Ok(value) = self.slot.try_recv() {
            self.shared.restore(value);
        }
    }
}
