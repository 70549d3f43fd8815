//! Best-effort step results.
//!
//! Leaf components (semantic matching, context loading, planning, narrative)
//! never abort the loop. They return `Soft<T>`: `Ok(value)` on the happy path,
//! or `Err(Degraded { fallback, reason })` carrying the value the caller may
//! use instead. The executor decides per step whether a degraded value is
//! acceptable and whether it poisons caching.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// A fallback value plus the reason the real one could not be produced.
#[derive(Debug, Clone)]
pub struct Degraded<T> {
    pub fallback: T,
    pub reason: String,
}

impl<T> Degraded<T> {
    pub fn new(fallback: T, reason: impl Into<String>) -> Self {
        Self {
            fallback,
            reason: reason.into(),
        }
    }
}

pub type Soft<T> = Result<T, Degraded<T>>;

/// Unwraps a soft result, logging the degradation under `step`.
/// Returns the value and whether it was a fallback.
pub fn settle<T>(step: &str, outcome: Soft<T>) -> (T, bool) {
    match outcome {
        Ok(value) => (value, false),
        Err(Degraded { fallback, reason }) => {
            warn!("{step} degraded: {reason}");
            (fallback, true)
        }
    }
}

/// Awaits `fut` for at most `limit`, flattening both the timeout and the
/// inner error into a printable reason.
pub async fn within<T, E, F>(limit: Duration, fut: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
    }
}
