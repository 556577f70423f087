//! Binary auto-reset event.
//!
//! Each event has exactly one waiting thread, which owns the [`Event`] and
//! parks on it. Any number of [`Signal`] handles can wake it. A signal holds
//! at most one pending wakeup: `set` twice before a `wait` still releases a
//! single `wait`, and a `set` that happens before the matching `wait` is
//! never lost.

use crossbeam_utils::sync::{Parker, Unparker};

/// Waiting side of a binary event. Starts signaled.
///
/// `Event` is `Send` but not `Sync`: only the owning thread may wait on it.
#[derive(Debug)]
pub struct Event {
    parker: Parker,
}

/// Waking side of an [`Event`].
#[derive(Debug, Clone)]
pub struct Signal {
    unparker: Unparker,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    /// Create a new event in the signaled state.
    pub fn new() -> Self {
        let parker = Parker::new();
        parker.unparker().unpark();
        Self { parker }
    }

    /// A handle that wakes this event from any thread.
    pub fn signal(&self) -> Signal {
        Signal {
            unparker: self.parker.unparker().clone(),
        }
    }

    /// Block until signaled, then reset to unsignaled.
    pub fn wait(&self) {
        self.parker.park();
    }
}

impl Signal {
    /// Latch the signal and wake the waiter.
    pub fn set(&self) {
        self.unparker.unpark();
    }
}
