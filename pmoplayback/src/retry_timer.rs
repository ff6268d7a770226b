//! One-shot retry timer.
//!
//! At most one deadline is pending at any time: arming the timer replaces
//! whatever was pending. The timer never fires by itself, the owner polls
//! it with [`RetryTimer::take_if_due`].

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct RetryTimer {
    /// When the pending retry is due (None if nothing is armed).
    deadline: Option<Instant>,
    /// Delay used for the pending retry.
    delay: Duration,
    /// Bumped on every arm/cancel so a stale deadline can be told apart.
    generation: u64,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer `delay` after `now`, cancelling any pending deadline.
    pub fn arm(&mut self, now: Instant, delay: Duration) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + delay);
        self.delay = delay;
        self.generation
    }

    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.generation += 1;
        }
        self.delay = Duration::ZERO;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time left before the deadline, zero once due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|end| end.saturating_duration_since(now))
    }

    /// Disarms and returns true if the deadline has passed.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(end) if now >= end => {
                self.deadline = None;
                self.delay = Duration::ZERO;
                true
            }
            _ => false,
        }
    }
}
