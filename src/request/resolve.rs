//! Memoised lookups for the heavyweight parts of a request.

use std::fmt;

use once_cell::sync::OnceCell;
use tracing::error;

use crate::domain::error::LookupError;

/// A lazily resolved value attached to a request descriptor.
///
/// Empty until the first resolution attempt. The attempt runs at most once;
/// its outcome (a value, nothing, or a failure) is kept for the lifetime of
/// the descriptor. A failed lookup is logged and reads as absent.
pub struct Resolved<T> {
    cell: OnceCell<Outcome<T>>,
}

enum Outcome<T> {
    Found(T),
    Missing,
    Failed(LookupError),
}

impl<T> Resolved<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Create a cell that already holds `value`, skipping resolution.
    pub fn with_value(value: T) -> Self {
        Self {
            cell: OnceCell::with_value(Outcome::Found(value)),
        }
    }

    /// Resolve through `lookup` on first use and return the memoised value.
    pub fn get_or_resolve<F>(&self, what: &'static str, key: &str, lookup: F) -> Option<&T>
    where
        F: FnOnce() -> Result<Option<T>, LookupError>,
    {
        let outcome = self.cell.get_or_init(|| match lookup() {
            Ok(Some(value)) => Outcome::Found(value),
            Ok(None) => Outcome::Missing,
            Err(err) => {
                error!(what, key, error = %err, "lookup failed, treating as absent");
                Outcome::Failed(err)
            }
        });

        match outcome {
            Outcome::Found(value) => Some(value),
            Outcome::Missing | Outcome::Failed(_) => None,
        }
    }

    /// Value if resolution already happened and found something.
    pub fn get(&self) -> Option<&T> {
        match self.cell.get() {
            Some(Outcome::Found(value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Failure recorded by the resolution attempt, if it failed.
    pub fn failure(&self) -> Option<&LookupError> {
        match self.cell.get() {
            Some(Outcome::Failed(err)) => Some(err),
            _ => None,
        }
    }
}

impl<T> Default for Resolved<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning yields a fresh, unresolved cell; cached lookups belong to one instance.
impl<T> Clone for Resolved<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            None => f.write_str("Unresolved"),
            Some(Outcome::Found(value)) => f.debug_tuple("Found").field(value).finish(),
            Some(Outcome::Missing) => f.write_str("Missing"),
            Some(Outcome::Failed(err)) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn resolves_at_most_once() {
        let calls = Cell::new(0);
        let cell: Resolved<String> = Resolved::new();
        assert!(!cell.is_resolved());

        for _ in 0..3 {
            let value = cell.get_or_resolve("entry", "hello", || {
                calls.set(calls.get() + 1);
                Ok(Some("Hello".to_string()))
            });
            assert_eq!(value.map(String::as_str), Some("Hello"));
        }

        assert_eq!(calls.get(), 1);
        assert!(cell.is_resolved());
    }

    #[test]
    fn failure_is_recorded_and_reads_as_absent() {
        let calls = Cell::new(0);
        let cell: Resolved<String> = Resolved::new();

        for _ in 0..2 {
            let value = cell.get_or_resolve("category", "tech", || {
                calls.set(calls.get() + 1);
                Err(LookupError::backend("store offline"))
            });
            assert!(value.is_none());
        }

        assert_eq!(calls.get(), 1);
        assert!(cell.failure().is_some());
        assert!(cell.get().is_none());
    }

    #[test]
    fn missing_value_is_memoised() {
        let cell: Resolved<u32> = Resolved::new();
        assert!(cell.get_or_resolve("page", "x", || Ok(None)).is_none());
        assert!(
            cell.get_or_resolve("page", "x", || Ok(Some(1)))
                .is_none()
        );
        assert!(cell.failure().is_none());
    }

    #[test]
    fn preset_value_skips_lookup() {
        let cell = Resolved::with_value(7_u32);
        let value = cell.get_or_resolve("page", "x", || panic!("lookup must not run"));
        assert_eq!(value, Some(&7));
    }
}
