//! Bounded retry of optimistic commits.
//!
//! An attempt re-reads everything it depends on, so a retry after a
//! `VersionConflict` sees the winner's state and either succeeds or fails
//! with the typed precondition error the fresh state implies.

use dealbook_types::{DealbookError, Result};
use tracing::warn;

/// Run `attempt` up to `max_attempts` times while it fails with a
/// retryable error.
///
/// # Errors
/// Non-retryable errors are returned as-is on first occurrence.
/// Exhausting the budget yields `ConcurrencyConflict { attempts }`.
pub fn with_retries<T>(
    operation: &'static str,
    max_attempts: u32,
    mut attempt: impl FnMut() -> Result<T>,
) -> Result<T> {
    for n in 1..=max_attempts {
        match attempt() {
            Err(e) if e.is_retryable() => {
                warn!(operation, attempt = n, max_attempts, error = %e, "Commit conflict, retrying");
            }
            other => return other,
        }
    }
    warn!(operation, max_attempts, "Retry budget exhausted");
    Err(DealbookError::ConcurrencyConflict {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn conflict() -> DealbookError {
        DealbookError::VersionConflict {
            entity: "req".into(),
        }
    }

    #[test]
    fn succeeds_after_transient_conflicts() {
        let calls = Cell::new(0);
        let out = with_retries("test", 5, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(conflict()) } else { Ok(42) }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn typed_errors_are_not_retried() {
        let calls = Cell::new(0);
        let out: Result<()> = with_retries("test", 5, || {
            calls.set(calls.get() + 1);
            Err(DealbookError::Internal("boom".into()))
        });
        assert!(matches!(out, Err(DealbookError::Internal(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn exhaustion_surfaces_attempt_count() {
        let out: Result<()> = with_retries("test", 4, || Err(conflict()));
        assert!(matches!(
            out,
            Err(DealbookError::ConcurrencyConflict { attempts: 4 })
        ));
    }
}
