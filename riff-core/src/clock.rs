//! # Playback Clock
//!
//! Converts wall-clock instants into chart-relative milliseconds. The clock
//! banks elapsed time across pauses so that resuming continues exactly where
//! pausing left off, and adds an operator-controlled latency offset on top.
//!
//! Every operation takes the current [`Instant`] explicitly; the game loop
//! passes `Instant::now()` and tests pass synthetic instants.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    /// Instant the current running stretch began.
    anchor: Instant,
    /// Time accumulated by previous running stretches.
    banked: Duration,
    running: bool,
    offset_ms: i64,
}

impl PlaybackClock {
    /// A stopped clock at chart time zero.
    pub fn new(now: Instant, offset_ms: i64) -> Self {
        Self {
            anchor: now,
            banked: Duration::ZERO,
            running: false,
            offset_ms,
        }
    }

    /// Resets chart time to zero and starts running from `now`.
    pub fn start(&mut self, now: Instant) {
        self.anchor = now;
        self.banked = Duration::ZERO;
        self.running = true;
    }

    /// Chart time in milliseconds at `now`, including the latency offset.
    ///
    /// While paused this returns the value frozen at the pause (plus the
    /// current offset).
    pub fn tick(&self, now: Instant) -> i64 {
        millis(self.elapsed(now)).saturating_add(self.offset_ms)
    }

    /// Freezes chart time. Pausing a paused clock does nothing.
    pub fn pause(&mut self, now: Instant) {
        if self.running {
            self.banked = self.elapsed(now);
            self.running = false;
        }
    }

    /// Continues from the frozen time. Resuming a running clock does nothing.
    pub fn resume(&mut self, now: Instant) {
        if !self.running {
            self.anchor = now;
            self.running = true;
        }
    }

    /// Pauses a running clock or resumes a paused one. Returns whether the
    /// clock is running afterwards.
    pub fn toggle(&mut self, now: Instant) -> bool {
        if self.running {
            self.pause(now);
        } else {
            self.resume(now);
        }
        self.running
    }

    /// Shifts every subsequent [`tick`](Self::tick) by `delta_ms`.
    ///
    /// Any value is accepted.
    pub fn adjust_offset(&mut self, delta_ms: i64) {
        self.offset_ms = self.offset_ms.saturating_add(delta_ms);
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn elapsed(&self, now: Instant) -> Duration {
        if self.running {
            self.banked + now.saturating_duration_since(self.anchor)
        } else {
            self.banked
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
