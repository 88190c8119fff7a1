//! # cuehistory - path-indexed cue event history
//!
//! cuehistory is the synchronization primitive behind a live-coding
//! performance environment. Producers announce cues (musical events, external
//! signals) tagged with a logical time and a `/`-delimited path; consumers ask
//! for the most recent or next cue matching a path pattern relative to their
//! own logical time, or block until one arrives.
//!
//! ## Core Concepts
//!
//! - **LogicalTime**: totally ordered, five-component timestamp
//! - **CueEvent**: an immutable (time, path, value, metadata) record
//! - **PathPattern**: a compiled pattern with `*` (one segment) and `**`
//!   (many segments) wildcards
//! - **EventHistory**: the concurrent store exposing publish, query and wait
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use cuehistory::{EventHistory, LogicalTime, Metadata, Value};
//!
//! let history = Arc::new(EventHistory::new());
//!
//! let waiter = {
//!     let history = Arc::clone(&history);
//!     thread::spawn(move || history.wait_for_next(LogicalTime::at(4.0), "/sync/**", None))
//! };
//!
//! history
//!     .publish(LogicalTime::at(8.0), "/sync/bar", Value::Int(2), Metadata::new())
//!     .unwrap();
//!
//! let cue = waiter.join().unwrap().unwrap();
//! assert_eq!(cue.path.to_string(), "/sync/bar");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod history;
pub mod matcher;
pub mod path;
pub mod registry;
pub mod time;
pub mod trie;
pub mod value;

// Re-export primary types at crate root for convenience
pub use error::{CueError, CueResult, ExecutionError, ValidationError};
pub use event::CueEvent;
pub use history::{EventHistory, EventHistoryConfig, HistoryStats, PendingWait, Wait};
pub use matcher::ValueMatcher;
pub use path::{CuePath, PathPattern, PatternSegment};
pub use registry::{PendingMatchers, WaiterId};
pub use time::LogicalTime;
pub use trie::{Direction, EventTrie, NodeId};
pub use value::{Metadata, Value};
