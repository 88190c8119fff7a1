//! Event history façade.
//!
//! `EventHistory` owns the ingestion queue, the trie and the pending-matcher
//! registry. Producers publish without touching the coordination lock: the
//! event is queued and the registry is scanned for waiters. Consumers take the
//! coordination lock, drain the queue into the trie, then query it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, trace};

use crate::error::{CueError, CueResult, ExecutionError, ValidationError};
use crate::event::CueEvent;
use crate::matcher::ValueMatcher;
use crate::path::{CuePath, PathPattern};
use crate::registry::{PendingMatchers, WaiterId};
use crate::time::LogicalTime;
use crate::trie::{Direction, EventTrie};
use crate::value::{Metadata, Value};

/// History configuration.
#[derive(Debug, Clone)]
pub struct EventHistoryConfig {
    /// Maximum number of segments in a published path or query pattern.
    pub max_path_depth: usize,
    /// Maximum number of simultaneously blocked waiters.
    pub max_pending_waiters: usize,
}

impl Default for EventHistoryConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 64,
            max_pending_waiters: 4096,
        }
    }
}

impl EventHistoryConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if any limit is zero.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_path_depth == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_path_depth must be at least 1".to_string(),
            });
        }
        if self.max_pending_waiters == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_pending_waiters must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryStats {
    /// Events drained into the trie.
    pub events: usize,
    /// Trie nodes, root included.
    pub nodes: usize,
    /// Events published but not yet drained.
    pub queued: usize,
    /// Waiters currently blocked.
    pub pending_waiters: usize,
    /// Waiter deliveries since creation.
    pub deliveries: u64,
}

/// Outcome of [`EventHistory::begin_wait`].
#[derive(Debug)]
pub enum Wait<'h> {
    /// A matching event already existed.
    Ready(CueEvent),
    /// Nothing matched yet; the waiter is registered.
    Pending(PendingWait<'h>),
}

/// A registered waiter that has not been delivered yet.
///
/// Dropping it without waiting cancels the registration.
#[derive(Debug)]
pub struct PendingWait<'h> {
    history: &'h EventHistory,
    id: WaiterId,
    delivery: Receiver<()>,
    time: LogicalTime,
    pattern: PathPattern,
    matcher: Option<ValueMatcher>,
    finished: bool,
}

impl PendingWait<'_> {
    /// The registered waiter's id.
    #[must_use]
    pub const fn id(&self) -> WaiterId {
        self.id
    }

    /// Blocks until delivery, then returns the earliest matching event after
    /// the waiter's time.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::SyncProtocolViolation` if the re-query after
    /// delivery finds nothing.
    pub fn wait(mut self) -> CueResult<CueEvent> {
        self.delivery.recv().map_err(|_| {
            CueError::Execution(ExecutionError::Disconnected {
                path: "pending_matcher".to_string(),
            })
        })?;
        self.finished = true;
        self.requery()
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, removing the
    /// registration.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` if nothing was delivered in time,
    /// and the same errors as [`wait`](Self::wait) otherwise.
    pub fn wait_timeout(mut self, timeout: Duration) -> CueResult<CueEvent> {
        match self.delivery.recv_timeout(timeout) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => self.give_up(timeout)?,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ExecutionError::Disconnected {
                    path: "pending_matcher".to_string(),
                }
                .into());
            }
        }
        self.finished = true;
        self.requery()
    }

    // Removes the registration after a timeout. Succeeds only if a delivery
    // landed between the timeout and the cancel.
    fn give_up(&mut self, timeout: Duration) -> CueResult<()> {
        debug!(waiter = %self.id, pattern = %self.pattern, "wait timed out");
        self.history.pending.cancel(self.id)?;
        self.finished = true;
        if self.delivery.try_recv().is_ok() {
            return Ok(());
        }
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        Err(ExecutionError::Timeout { duration_ms }.into())
    }

    // An earlier-timestamped match may have been published after the one
    // that woke us, so query again rather than trusting the delivery.
    fn requery(&self) -> CueResult<CueEvent> {
        let found = self
            .history
            .query(&self.time, &self.pattern, self.matcher.as_ref(), Direction::Next)?;
        found.ok_or_else(|| {
            error!(pattern = %self.pattern, time = %self.time, "sync error: delivered waiter found no event");
            ExecutionError::SyncProtocolViolation {
                pattern: self.pattern.to_string(),
                time: self.time.to_string(),
            }
            .into()
        })
    }
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.history.pending.cancel(self.id);
        }
    }
}

/// Concurrent, path-indexed history of cue events.
///
/// Share it between threads behind an `Arc`.
///
/// # Examples
///
/// ```
/// use cuehistory::{EventHistory, LogicalTime, Metadata, Value};
///
/// let history = EventHistory::new();
/// history.publish(LogicalTime::at(1.0), "/drums/kick", Value::Int(1), Metadata::new()).unwrap();
/// history.publish(LogicalTime::at(2.0), "/drums/snare", Value::Int(1), Metadata::new()).unwrap();
///
/// let last = history.query_most_recent(LogicalTime::at(3.0), "/drums/*", None).unwrap();
/// assert_eq!(last.unwrap().path.to_string(), "/drums/snare");
///
/// let next = history.query_next(LogicalTime::at(0.0), "/drums/**", None).unwrap();
/// assert_eq!(next.unwrap().path.to_string(), "/drums/kick");
/// ```
#[derive(Debug)]
pub struct EventHistory {
    cfg: EventHistoryConfig,
    ingest_tx: Sender<CueEvent>,
    ingest_rx: Receiver<CueEvent>,
    index: Mutex<EventTrie>,
    pending: PendingMatchers,
    deliveries: AtomicU64,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_err() -> CueError {
    CueError::internal("poisoned lock: event history index")
}

impl EventHistory {
    /// Creates a history with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(EventHistoryConfig::default())
    }

    /// Creates a history with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for zero limits.
    pub fn with_config(cfg: EventHistoryConfig) -> CueResult<Self> {
        Ok(Self::build(cfg.validate()?))
    }

    fn build(cfg: EventHistoryConfig) -> Self {
        let (ingest_tx, ingest_rx) = unbounded::<CueEvent>();
        let pending = PendingMatchers::new(cfg.max_pending_waiters);
        Self {
            cfg,
            ingest_tx,
            ingest_rx,
            index: Mutex::new(EventTrie::new()),
            pending,
            deliveries: AtomicU64::new(0),
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EventHistoryConfig {
        &self.cfg
    }

    /// Publishes a cue at `path`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `path` is not a concrete path or is too
    /// deep.
    pub fn publish(
        &self,
        time: LogicalTime,
        path: &str,
        value: impl Into<Value>,
        metadata: Metadata,
    ) -> CueResult<()> {
        let event = CueEvent::new(time, path, value)?.with_metadata(metadata);
        self.publish_event(event)
    }

    /// Publishes a pre-built event.
    ///
    /// Never takes the coordination lock.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::PathTooDeep` for a path deeper than the
    /// configured limit, or `CueError::Internal` if the registry lock is
    /// poisoned.
    pub fn publish_event(&self, event: CueEvent) -> CueResult<()> {
        self.check_depth(event.path.depth(), || event.path.to_string())?;

        // Enqueue before delivering so a woken waiter's re-query can see it.
        let published = event.clone();
        self.ingest_tx.send(event).map_err(|_| {
            CueError::Execution(ExecutionError::Disconnected {
                path: "ingest_queue".to_string(),
            })
        })?;

        let delivered = self.pending.deliver(&published)?;
        if delivered > 0 {
            let delivered = u64::try_from(delivered).unwrap_or(u64::MAX);
            self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Latest event matching `pattern` at or before `time`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed or too-deep pattern, or
    /// `CueError::Internal` if the coordination lock is poisoned.
    pub fn query_most_recent(
        &self,
        time: LogicalTime,
        pattern: &str,
        matcher: Option<&ValueMatcher>,
    ) -> CueResult<Option<CueEvent>> {
        let pattern = self.compile(pattern)?;
        self.query(&time, &pattern, matcher, Direction::MostRecent)
    }

    /// Earliest event matching `pattern` strictly after `time`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed or too-deep pattern, or
    /// `CueError::Internal` if the coordination lock is poisoned.
    pub fn query_next(
        &self,
        time: LogicalTime,
        pattern: &str,
        matcher: Option<&ValueMatcher>,
    ) -> CueResult<Option<CueEvent>> {
        let pattern = self.compile(pattern)?;
        self.query(&time, &pattern, matcher, Direction::Next)
    }

    /// Drains the queue and runs one query against the trie.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if the coordination lock is poisoned.
    pub fn query(
        &self,
        time: &LogicalTime,
        pattern: &PathPattern,
        matcher: Option<&ValueMatcher>,
        direction: Direction,
    ) -> CueResult<Option<CueEvent>> {
        let mut index = self.lock_index()?;
        self.drain_into(&mut index);
        Ok(index.find(time, pattern, matcher, direction).cloned())
    }

    /// Checks for a next event and, if none exists, registers a waiter.
    ///
    /// Check and registration happen under the coordination lock, and the
    /// queue is drained once more after registering, so an event published
    /// at any point is either found here or delivered to the waiter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed or too-deep pattern,
    /// `ExecutionError::WaiterLimitExceeded` when the registry is full, or
    /// `CueError::Internal` if a lock is poisoned.
    pub fn begin_wait(
        &self,
        time: LogicalTime,
        pattern: &str,
        matcher: Option<ValueMatcher>,
    ) -> CueResult<Wait<'_>> {
        let pattern = self.compile(pattern)?;
        let mut index = self.lock_index()?;

        self.drain_into(&mut index);
        if let Some(found) = index.next_after(&time, &pattern, matcher.as_ref()) {
            return Ok(Wait::Ready(found.clone()));
        }

        let (id, delivery) = self.pending.register(pattern.clone(), matcher.clone(), time)?;

        // Anything queued between the first drain and registration missed the
        // registry scan.
        if self.drain_into(&mut index) > 0 {
            if let Some(found) = index.next_after(&time, &pattern, matcher.as_ref()) {
                self.pending.cancel(id)?;
                return Ok(Wait::Ready(found.clone()));
            }
        }
        drop(index);

        Ok(Wait::Pending(PendingWait {
            history: self,
            id,
            delivery,
            time,
            pattern,
            matcher,
            finished: false,
        }))
    }

    /// Returns the earliest event matching `pattern` after `time`, blocking
    /// until one is published if necessary.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::SyncProtocolViolation` (fatal) if a delivered
    /// waiter cannot find its event.
    pub fn wait_for_next(
        &self,
        time: LogicalTime,
        pattern: &str,
        matcher: Option<ValueMatcher>,
    ) -> CueResult<CueEvent> {
        match self.begin_wait(time, pattern, matcher)? {
            Wait::Ready(event) => Ok(event),
            Wait::Pending(pending) => pending.wait(),
        }
    }

    /// Like [`wait_for_next`](Self::wait_for_next) with an upper bound on the
    /// blocking time.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` if nothing matching arrives in time,
    /// plus the errors of [`wait_for_next`](Self::wait_for_next).
    pub fn wait_for_next_timeout(
        &self,
        time: LogicalTime,
        pattern: &str,
        matcher: Option<ValueMatcher>,
        timeout: Duration,
    ) -> CueResult<CueEvent> {
        match self.begin_wait(time, pattern, matcher)? {
            Wait::Ready(event) => Ok(event),
            Wait::Pending(pending) => pending.wait_timeout(timeout),
        }
    }

    /// Waits for the first of several patterns. Not supported yet.
    ///
    /// # Errors
    ///
    /// Always returns `ExecutionError::Unsupported`.
    pub fn wait_for_first_of(
        &self,
        _time: LogicalTime,
        _patterns: &[&str],
        _matcher: Option<ValueMatcher>,
    ) -> CueResult<CueEvent> {
        Err(ExecutionError::Unsupported {
            operation: "wait_for_first_of",
        }
        .into())
    }

    /// Waits for all of several patterns. Not supported yet.
    ///
    /// # Errors
    ///
    /// Always returns `ExecutionError::Unsupported`.
    pub fn wait_for_all_of(
        &self,
        _time: LogicalTime,
        _patterns: &[&str],
        _matcher: Option<ValueMatcher>,
    ) -> CueResult<Vec<CueEvent>> {
        Err(ExecutionError::Unsupported {
            operation: "wait_for_all_of",
        }
        .into())
    }

    /// Events stored at exactly `path`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` for a non-concrete path, or
    /// `CueError::Internal` if the coordination lock is poisoned.
    pub fn events_at(&self, path: &str) -> CueResult<Vec<CueEvent>> {
        let path = CuePath::parse(path)?;
        let mut index = self.lock_index()?;
        self.drain_into(&mut index);
        Ok(index.events_at(&path).into_iter().cloned().collect())
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Returns `CueError::Internal` if a lock is poisoned.
    pub fn stats(&self) -> CueResult<HistoryStats> {
        let index = self.lock_index()?;
        Ok(HistoryStats {
            events: index.event_count(),
            nodes: index.node_count(),
            queued: self.ingest_rx.len(),
            pending_waiters: self.pending.len()?,
            deliveries: self.deliveries.load(Ordering::Relaxed),
        })
    }

    fn compile(&self, pattern: &str) -> CueResult<PathPattern> {
        let compiled = PathPattern::compile(pattern)?;
        self.check_depth(compiled.depth(), || pattern.to_string())?;
        Ok(compiled)
    }

    fn check_depth(&self, depth: usize, path: impl FnOnce() -> String) -> CueResult<()> {
        if depth > self.cfg.max_path_depth {
            return Err(ValidationError::PathTooDeep {
                path: path(),
                depth,
                max_depth: self.cfg.max_path_depth,
            }
            .into());
        }
        Ok(())
    }

    fn lock_index(&self) -> CueResult<MutexGuard<'_, EventTrie>> {
        self.index.lock().map_err(|_| lock_err())
    }

    /// Moves everything currently queued into the trie, in queue order.
    fn drain_into(&self, index: &mut EventTrie) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.ingest_rx.try_recv() {
            index.insert(event);
            drained += 1;
        }
        if drained > 0 {
            trace!(drained, total = index.event_count(), "drained ingest queue");
        }
        drained
    }
}
