//! Cue events.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::path::CuePath;
use crate::time::LogicalTime;
use crate::value::{Metadata, Value};

/// A timestamped, path-addressed occurrence.
///
/// Events are immutable once published. They are ordered by logical time,
/// then by path; the wall-clock `published_at` stamp is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueEvent {
    /// Logical time of the cue.
    pub time: LogicalTime,

    /// Concrete path the cue was published at.
    pub path: CuePath,

    /// Payload.
    pub value: Value,

    /// Producer-supplied metadata.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,

    /// Wall-clock time the event was constructed.
    pub published_at: DateTime<Utc>,
}

impl CueEvent {
    /// Creates an event, parsing `path`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` if `path` is not a concrete path.
    pub fn new(time: LogicalTime, path: &str, value: impl Into<Value>) -> Result<Self, ValidationError> {
        Ok(Self::at_path(time, CuePath::parse(path)?, value))
    }

    /// Creates an event at an already-validated path.
    #[must_use]
    pub fn at_path(time: LogicalTime, path: CuePath, value: impl Into<Value>) -> Self {
        Self {
            time,
            path,
            value: value.into(),
            metadata: Metadata::new(),
            published_at: Utc::now(),
        }
    }

    /// Replaces the event's metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Total order used for every time comparison in the index.
    #[must_use]
    pub fn order(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.path.cmp(&other.path))
    }

    /// Returns true if this event is at or before `time`.
    #[must_use]
    pub fn is_at_or_before(&self, time: &LogicalTime) -> bool {
        self.time <= *time
    }

    /// Returns true if this event is strictly after `time`.
    #[must_use]
    pub fn is_after(&self, time: &LogicalTime) -> bool {
        self.time > *time
    }
}
