//! Value predicates.
//!
//! A [`ValueMatcher`] narrows a path match by the event's value. Evaluation is
//! total: a predicate that returns an error or panics counts as "no match" and
//! never aborts the surrounding query or publish.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::value::Value;

type PredicateFn = dyn Fn(&Value) -> Result<bool, String> + Send + Sync;

/// A cloneable, thread-safe predicate over event values.
///
/// # Examples
///
/// ```
/// use cuehistory::{Value, ValueMatcher};
///
/// let loud = ValueMatcher::new(|v| v.as_float().is_some_and(|x| x > 0.5));
/// assert!(loud.matches(&Value::Float(0.9)));
/// assert!(!loud.matches(&Value::String("quiet".into())));
/// ```
#[derive(Clone)]
pub struct ValueMatcher {
    predicate: Arc<PredicateFn>,
    label: &'static str,
}

impl ValueMatcher {
    /// Wraps an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |v| Ok(predicate(v))),
            label: "fn",
        }
    }

    /// Wraps a fallible predicate. Errors are treated as `false`.
    pub fn fallible<F, E>(predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        Self {
            predicate: Arc::new(move |v| predicate(v).map_err(|e| e.to_string())),
            label: "fallible",
        }
    }

    /// Matches values equal to `expected`.
    #[must_use]
    pub fn equals(expected: Value) -> Self {
        Self {
            predicate: Arc::new(move |v| Ok(*v == expected)),
            label: "equals",
        }
    }

    /// Evaluates the predicate, swallowing errors and panics as non-matches.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)(value))) {
            Ok(Ok(hit)) => hit,
            Ok(Err(reason)) => {
                warn!(matcher = self.label, %reason, "value matcher failed; treating as no match");
                false
            }
            Err(_) => {
                warn!(matcher = self.label, "value matcher panicked; treating as no match");
                false
            }
        }
    }
}

impl fmt::Debug for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueMatcher")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Applies an optional matcher; `None` accepts every value.
#[must_use]
pub fn accepts(matcher: Option<&ValueMatcher>, value: &Value) -> bool {
    matcher.map_or(true, |m| m.matches(value))
}
