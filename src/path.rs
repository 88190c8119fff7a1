//! Cue paths and path patterns.
//!
//! Paths are `/`-delimited segment sequences. Patterns compile once into a
//! sequence of [`PatternSegment`]s, and both consumers work from that single
//! form: the trie walks the segments directly, and the pending-matcher
//! registry uses [`PathPattern::matches`], which is derived from the same
//! segments. The two can therefore never disagree about a match.
//!
//! Wildcards:
//! - a segment containing `*` matches one segment, `*` standing for any run of
//!   characters other than `/`
//! - `**` in the middle of a pattern matches zero or more whole segments
//! - a trailing `**` matches one or more whole segments (every descendant)

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const SEPARATOR: char = '/';
const RECURSIVE: &str = "**";

/// A concrete (wildcard-free) cue path.
///
/// Surrounding whitespace of each segment is trimmed and leading/trailing
/// separators are optional, so `"/a/b"`, `"a/b/"` and `" /a / b"` are the same
/// path. The root path `/` has no segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CuePath {
    segments: Vec<String>,
}

impl CuePath {
    /// Parses a concrete path.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` if the path contains a wildcard
    /// or an empty interior segment.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let segments = split_segments(path).map_err(|reason| ValidationError::InvalidPath {
            path: path.to_string(),
            reason,
        })?;

        if let Some(seg) = segments.iter().find(|s| s.contains('*')) {
            return Err(ValidationError::InvalidPath {
                path: path.to_string(),
                reason: format!("segment '{seg}' contains a wildcard"),
            });
        }

        Ok(Self { segments })
    }

    /// The root path.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// The path's segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path `/`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for CuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for CuePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CuePath> for String {
    fn from(value: CuePath) -> Self {
        value.to_string()
    }
}

impl std::str::FromStr for CuePath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One compiled segment of a [`PathPattern`].
#[derive(Debug, Clone)]
pub enum PatternSegment {
    /// Matches exactly this segment.
    Literal(String),

    /// Matches any single segment accepted by the anchored regex.
    Wildcard(Regex),

    /// `**`: matches a run of whole segments.
    Recursive,
}

impl PatternSegment {
    /// Returns true if this segment matches one concrete path segment.
    ///
    /// `Recursive` never matches a single segment on its own; callers handle
    /// it structurally.
    #[must_use]
    pub fn matches_segment(&self, segment: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == segment,
            Self::Wildcard(re) => re.is_match(segment),
            Self::Recursive => false,
        }
    }

    /// Returns true for `**`.
    #[must_use]
    pub const fn is_recursive(&self) -> bool {
        matches!(self, Self::Recursive)
    }
}

/// A compiled path pattern.
///
/// # Examples
///
/// ```
/// use cuehistory::{CuePath, PathPattern};
///
/// let pattern = PathPattern::compile("/osc*/**/note").unwrap();
/// assert!(pattern.matches(&CuePath::parse("/osc/note").unwrap()));
/// assert!(pattern.matches(&CuePath::parse("/osc-in/synth/1/note").unwrap()));
/// assert!(!pattern.matches(&CuePath::parse("/midi/note").unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPattern` for an empty interior segment
    /// or a segment mixing `**` with other characters.
    pub fn compile(pattern: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let raw = split_segments(pattern).map_err(invalid)?;

        let mut segments: Vec<PatternSegment> = Vec::with_capacity(raw.len());
        for seg in raw {
            if seg == RECURSIVE {
                // Consecutive `**` collapse into one.
                if !segments.last().is_some_and(PatternSegment::is_recursive) {
                    segments.push(PatternSegment::Recursive);
                }
            } else if seg.contains(RECURSIVE) {
                return Err(invalid(format!(
                    "segment '{seg}' mixes '**' with other characters"
                )));
            } else if seg.contains('*') {
                segments.push(PatternSegment::Wildcard(compile_wildcard(&seg).map_err(invalid)?));
            } else {
                segments.push(PatternSegment::Literal(seg));
            }
        }

        Ok(Self {
            source: pattern.trim().to_string(),
            segments,
        })
    }

    /// Builds a pattern that matches exactly one concrete path.
    #[must_use]
    pub fn exact(path: &CuePath) -> Self {
        Self {
            source: path.to_string(),
            segments: path
                .segments()
                .iter()
                .cloned()
                .map(PatternSegment::Literal)
                .collect(),
        }
    }

    /// The pattern text as given (trimmed).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled segments.
    #[must_use]
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Number of compiled segments (after `**` collapsing).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if the pattern contains no wildcard.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PatternSegment::Literal(_)))
    }

    /// Whole-path predicate over a concrete path.
    #[must_use]
    pub fn matches(&self, path: &CuePath) -> bool {
        matches_from(&self.segments, path.segments())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for PathPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

/// Bottom-up match table, O(pattern × path).
///
/// After processing pattern segment `pi`, `tail[si]` says whether
/// `pattern[pi..]` matches `path[si..]`.
fn matches_from(pattern: &[PatternSegment], path: &[String]) -> bool {
    let n = path.len();
    let mut tail: Vec<bool> = (0..=n).map(|si| si == n).collect();

    for (pi, segment) in pattern.iter().enumerate().rev() {
        let mut cur = vec![false; n + 1];
        if !segment.is_recursive() {
            for (si, seg) in path.iter().enumerate() {
                cur[si] = tail[si + 1] && segment.matches_segment(seg);
            }
        } else if pi + 1 == pattern.len() {
            // Trailing `**` covers every descendant.
            cur[..n].fill(true);
        } else {
            // Interior `**` skips zero or more segments.
            let mut reachable = false;
            for (c, &t) in cur.iter_mut().zip(&tail).rev() {
                reachable |= t;
                *c = reachable;
            }
        }
        tail = cur;
    }

    tail[0]
}

fn split_segments(path: &str) -> Result<Vec<String>, String> {
    let trimmed = path.trim();
    let inner = trimmed.strip_prefix(SEPARATOR).unwrap_or(trimmed);
    let inner = inner.strip_suffix(SEPARATOR).unwrap_or(inner);
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(SEPARATOR)
        .map(|seg| {
            let seg = seg.trim();
            if seg.is_empty() {
                Err("empty path segment".to_string())
            } else {
                Ok(seg.to_string())
            }
        })
        .collect()
}

fn compile_wildcard(segment: &str) -> Result<Regex, String> {
    let body = segment
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]*");
    Regex::new(&format!("^{body}$")).map_err(|e| format!("invalid wildcard '{segment}': {e}"))
}
