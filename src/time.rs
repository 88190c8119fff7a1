//! Logical time keys.
//!
//! Cue events are ordered by logical (scheduled) time, never by wall-clock
//! arrival. A key carries five components:
//! - **time**: virtual time in seconds
//! - **priority**: scheduling priority at that instant
//! - **thread**: index of the producing thread
//! - **delta**: sub-instant scheduling step
//! - **beat**: beat position at `time`

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A totally ordered logical timestamp.
///
/// Components are compared in declaration order. `time` and `beat` use the
/// IEEE 754 total order so the key stays a strict total order even for
/// non-finite inputs.
///
/// # Examples
///
/// ```
/// use cuehistory::LogicalTime;
///
/// let early = LogicalTime::at(1.0);
/// let late = LogicalTime::at(1.0).with_priority(1);
/// assert!(early < late);
/// assert!(LogicalTime::at(0.5) < early);
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LogicalTime {
    /// Virtual time in seconds.
    pub time: f64,

    /// Scheduling priority.
    pub priority: i64,

    /// Producing thread index.
    pub thread: u64,

    /// Sub-instant scheduling step.
    pub delta: u64,

    /// Beat position.
    pub beat: f64,
}

impl LogicalTime {
    /// Creates a key from all five components.
    #[must_use]
    pub const fn new(time: f64, priority: i64, thread: u64, delta: u64, beat: f64) -> Self {
        Self {
            time,
            priority,
            thread,
            delta,
            beat,
        }
    }

    /// Creates a key at `time` with every other component zeroed.
    #[must_use]
    pub const fn at(time: f64) -> Self {
        Self::new(time, 0, 0, 0, 0.0)
    }

    /// Sets the priority component.
    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the thread component.
    #[must_use]
    pub const fn with_thread(mut self, thread: u64) -> Self {
        self.thread = thread;
        self
    }

    /// Sets the delta component.
    #[must_use]
    pub const fn with_delta(mut self, delta: u64) -> Self {
        self.delta = delta;
        self
    }

    /// Sets the beat component.
    #[must_use]
    pub const fn with_beat(mut self, beat: f64) -> Self {
        self.beat = beat;
        self
    }
}

impl PartialEq for LogicalTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LogicalTime {}

impl PartialOrd for LogicalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogicalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.thread.cmp(&other.thread))
            .then_with(|| self.delta.cmp(&other.delta))
            .then_with(|| self.beat.total_cmp(&other.beat))
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={} p={} i={} d={} b={}",
            self.time, self.priority, self.thread, self.delta, self.beat
        )
    }
}
