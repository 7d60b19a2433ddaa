//! Debounced database flushes
//!
//! The first change after an idle period arms a single flush timer; further
//! changes before it fires are coalesced into that one flush.
//!
//! ```text
//!          trigger()                  take_due(now >= deadline)
//!   Idle ───────────────► Armed{deadline} ─────────────────────► Idle
//!                          │    ▲
//!                          └────┘ trigger(): no-op
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Flush timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// No flush pending
    Idle,
    /// One flush pending at `deadline`
    Armed { deadline: Instant },
}

/// Two-state flush debouncer
#[derive(Debug)]
pub struct SaveScheduler {
    interval: Duration,
    state: SaveState,
}

impl SaveScheduler {
    /// Create an idle scheduler
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SaveState::Idle,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Pending flush deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SaveState::Idle => None,
            SaveState::Armed { deadline } => Some(deadline),
        }
    }

    /// Whether a flush is pending
    pub fn is_armed(&self) -> bool {
        matches!(self.state, SaveState::Armed { .. })
    }

    /// Record a change at `now`
    ///
    /// Returns `true` if this armed a new timer, `false` if one was
    /// already pending.
    pub fn trigger(&mut self, now: Instant) -> bool {
        match self.state {
            SaveState::Armed { .. } => false,
            SaveState::Idle => {
                self.state = SaveState::Armed {
                    deadline: now + self.interval,
                };
                true
            }
        }
    }

    /// Fire the timer if it is due at `now`
    ///
    /// Returns `true` when the caller must flush; the scheduler is idle
    /// again afterwards.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.state {
            SaveState::Armed { deadline } if now >= deadline => {
                self.state = SaveState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Disarm a pending timer; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        self.state = SaveState::Idle;
        was_armed
    }
}
