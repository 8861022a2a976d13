//! Playback clock shared by the time control and the scatter plot.
//!
//! The clock owns only the timing. Which year comes next is decided by
//! [`advance_index`], so both cyclers step through their year lists the
//! same way and stop after exactly one full pass.

use std::time::{Duration, Instant};

/// Longest period the clock will wait between ticks
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed-period deadline timer polled from the event loop
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    period: Duration,
    next_deadline: Option<Instant>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the clock; the first tick is due one period after `now`.
    ///
    /// The period is clamped to `[1ms, MAX_PERIOD]`.
    pub fn start(&mut self, now: Instant, period: Duration) {
        self.period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
        self.next_deadline = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next_deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_deadline.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of whole periods that elapsed by `now`.
    ///
    /// The deadline advances past every counted tick; nothing is coalesced.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let Some(mut deadline) = self.next_deadline else {
            return 0;
        };
        let mut ticks = 0;
        while deadline <= now {
            ticks += 1;
            deadline += self.period;
        }
        self.next_deadline = Some(deadline);
        ticks
    }
}

/// Outcome of stepping through a year list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to this year
    Advance(i32),
    /// The next index wrapped to the start: one full pass is complete
    Wrapped,
}

/// Next year after `current` in `years`, wrapping modulo the length.
///
/// A `current` not in the list is treated as the first entry.
pub fn advance_index(years: &[i32], current: i32) -> Step {
    if years.is_empty() {
        return Step::Wrapped;
    }
    let index = years.iter().position(|&y| y == current).unwrap_or(0);
    let next = (index + 1) % years.len();
    if next == 0 {
        Step::Wrapped
    } else {
        Step::Advance(years[next])
    }
}
