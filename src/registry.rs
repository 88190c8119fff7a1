//! Pending matcher registry.
//!
//! Waiters that found nothing register a (pattern, value matcher, time) entry
//! here with a one-shot delivery channel. Every publish scans the registry and
//! signals and removes each entry the new event satisfies. Registration,
//! delivery and cancellation all take the registry's own lock, which is never
//! the history's coordination lock, so publishing never waits on a query.

use std::fmt;
use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CueError, CueResult, ExecutionError};
use crate::event::CueEvent;
use crate::matcher::{accepts, ValueMatcher};
use crate::path::PathPattern;
use crate::time::LogicalTime;

/// Unique identifier for a pending waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaiterId(Uuid);

impl WaiterId {
    /// Create a new random waiter id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WaiterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct PendingEntry {
    id: WaiterId,
    pattern: PathPattern,
    matcher: Option<ValueMatcher>,
    after: LogicalTime,
    delivery: Sender<()>,
}

impl PendingEntry {
    fn accepts(&self, event: &CueEvent) -> bool {
        event.is_after(&self.after)
            && self.pattern.matches(&event.path)
            && accepts(self.matcher.as_ref(), &event.value)
    }
}

/// Registry of waiters blocked on future events.
#[derive(Debug)]
pub struct PendingMatchers {
    entries: Mutex<Vec<PendingEntry>>,
    max_entries: usize,
}

fn lock_err() -> CueError {
    CueError::internal("poisoned lock: pending matcher registry")
}

impl PendingMatchers {
    /// Creates an empty registry holding at most `max_entries` waiters.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Registers a waiter for events matching `pattern` and `matcher` that
    /// are strictly after `after`.
    ///
    /// The returned receiver yields exactly one message when delivered.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::WaiterLimitExceeded` when the registry is
    /// full, or `CueError::Internal` if its lock is poisoned.
    pub fn register(
        &self,
        pattern: PathPattern,
        matcher: Option<ValueMatcher>,
        after: LogicalTime,
    ) -> CueResult<(WaiterId, Receiver<()>)> {
        let mut entries = self.entries.lock().map_err(|_| lock_err())?;
        if entries.len() >= self.max_entries {
            return Err(ExecutionError::WaiterLimitExceeded {
                max: self.max_entries,
            }
            .into());
        }

        let id = WaiterId::new();
        let (tx, rx) = bounded::<()>(1);
        debug!(waiter = %id, pattern = %pattern, after = %after, "registering pending matcher");
        entries.push(PendingEntry {
            id,
            pattern,
            matcher,
            after,
            delivery: tx,
        });
        Ok((id, rx))
    }

    /// Signals and removes every entry `event` satisfies.
    ///
    /// Returns the number of waiters signalled.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if the registry lock is poisoned.
    pub fn deliver(&self, event: &CueEvent) -> CueResult<usize> {
        let mut entries = self.entries.lock().map_err(|_| lock_err())?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        entries.retain(|entry| {
            if !entry.accepts(event) {
                return true;
            }
            // A waiter that already gave up has dropped its receiver.
            if entry.delivery.try_send(()).is_ok() {
                delivered += 1;
            }
            debug!(waiter = %entry.id, path = %event.path, time = %event.time, "delivered pending matcher");
            false
        });
        Ok(delivered)
    }

    /// Removes a waiter. Returns false if it was already delivered or removed.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if the registry lock is poisoned.
    pub fn cancel(&self, id: WaiterId) -> CueResult<bool> {
        let mut entries = self.entries.lock().map_err(|_| lock_err())?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    /// Number of waiters currently registered.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if the registry lock is poisoned.
    pub fn len(&self) -> CueResult<usize> {
        Ok(self.entries.lock().map_err(|_| lock_err())?.len())
    }

    /// Returns true if no waiter is registered.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if the registry lock is poisoned.
    pub fn is_empty(&self) -> CueResult<bool> {
        Ok(self.len()? == 0)
    }
}
