//! Rank-ordered locking (spec.md §5): pairs a [`parking_lot::RwLock`] with a fixed rank so that
//! code needing more than one of a [`Session`](crate::session::Session)'s internal locks at once
//! always acquires them in the same order, the standard fix for lock-order-inversion deadlocks.
//! Grounded directly on `k9db::util::IndexedMutex` (`original_source/k9db/util/indexed_mutex.{h,cc}`):
//! same index-then-compare idea, rebuilt around `parking_lot`'s guard types instead of
//! `std::shared_mutex`, and around a `Ranked` trait object instead of a raw pointer so locks
//! guarding different value types can still be sorted into one acquisition order together.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// -------------------------------------------------------------------------------------------------
//
/// An `RwLock<T>` tagged with a fixed acquisition rank.
pub struct RankedLock<T> {
    rank: u32,
    inner: RwLock<T>,
}

impl<T> RankedLock<T> {
    #[must_use]
    pub const fn new(rank: u32, value: T) -> Self {
        Self { rank, inner: RwLock::new(value) }
    }

    #[inline]
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    #[inline]
    #[must_use]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}

/// A lock with a rank, independent of what value type it guards, so locks over different value
/// types can still be sorted together into one consistent acquisition order.
pub trait Ranked {
    fn rank(&self) -> u32;
}

impl<T> Ranked for RankedLock<T> {
    fn rank(&self) -> u32 {
        self.rank
    }
}

/// Sorts `locks` by ascending rank in place. Code that must hold several [`RankedLock`]s at once
/// should acquire them in this order on every thread; acquiring the same pair in different orders
/// on different threads is exactly how lock-order-inversion deadlocks happen.
pub fn lock_order<'a>(locks: &mut [&'a dyn Ranked]) {
    locks.sort_by_key(|lock| lock.rank());
}

// -------------------------------------------------------------------------------------------------
//
// Tests
