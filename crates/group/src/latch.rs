//! Single-fire latch guarding a run-once action.

use std::sync::atomic::{AtomicBool, Ordering};

/// A latch that can be fired exactly once.
#[derive(Debug)]
pub(crate) struct Latch(AtomicBool);

impl Latch {
    pub(crate) const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Fire the latch. Only the first caller gets `true`.
    pub(crate) fn fire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
