//! Locks owned by a single render cache.
//!
//! A panic while a guard is held poisons the lock. The guard is recovered and
//! the cache keeps serving whatever entries the lock holds.

use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tracing::warn;

/// Cache operation that took a lock, reported when recovering from poison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOp {
    Get,
    Put,
    Take,
    Remove,
    Clear,
    Len,
    LastModified,
    MarkUpdated,
}

impl CacheOp {
    fn as_str(self) -> &'static str {
        match self {
            CacheOp::Get => "get",
            CacheOp::Put => "put",
            CacheOp::Take => "take",
            CacheOp::Remove => "remove",
            CacheOp::Clear => "clear",
            CacheOp::Len => "len",
            CacheOp::LastModified => "last_modified",
            CacheOp::MarkUpdated => "mark_updated",
        }
    }
}

/// `RwLock` tagged with the id of the cache that owns it.
pub(crate) struct CacheLock<T> {
    cache: &'static str,
    inner: RwLock<T>,
}

impl<T> CacheLock<T> {
    pub(crate) fn new(cache: &'static str, value: T) -> Self {
        Self {
            cache,
            inner: RwLock::new(value),
        }
    }

    pub(crate) fn read(&self, op: CacheOp) -> RwLockReadGuard<'_, T> {
        self.recover(op, self.inner.read())
    }

    pub(crate) fn write(&self, op: CacheOp) -> RwLockWriteGuard<'_, T> {
        self.recover(op, self.inner.write())
    }

    fn recover<G>(&self, op: CacheOp, result: LockResult<G>) -> G {
        result.unwrap_or_else(|poisoned| {
            warn!(
                cache = self.cache,
                op = op.as_str(),
                "cache lock poisoned by a panicking holder, continuing with current entries"
            );
            counter!("roller_cache_lock_poisoned_total", "cache" => self.cache).increment(1);
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn poisoned_lock_keeps_last_written_value() {
        let lock = CacheLock::new("cache.test", 1_u32);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock.write(CacheOp::Put);
            *guard = 2;
            panic!("writer died");
        }));

        assert_eq!(*lock.read(CacheOp::Get), 2);
        *lock.write(CacheOp::Clear) = 0;
        assert_eq!(*lock.read(CacheOp::Len), 0);
    }

    #[test]
    fn op_names_are_stable() {
        assert_eq!(CacheOp::LastModified.as_str(), "last_modified");
        assert_eq!(CacheOp::Take.as_str(), "take");
    }
}
