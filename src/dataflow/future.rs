//! Consistency barrier: lets a writer block until every downstream view has absorbed its delta.
//! Grounded directly on `original_source/k9db/dataflow/future.{h,cc}`.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

struct Inner {
    counter: AtomicU16,
    consistent: bool,
    resolved: Mutex<bool>,
    condvar: Condvar,
}

// -------------------------------------------------------------------------------------------------
//
/// A future is resolved once every [`Promise`] derived from it has been resolved. Seeded with a
/// counter of 1 in consistent mode (one implicit promise: the caller's own), 0 otherwise (already
/// resolved — `wait` is then a no-op).
#[derive(Clone)]
pub struct Future {
    inner: Arc<Inner>,
}

impl Future {
    #[must_use]
    pub fn new(consistent: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                counter: AtomicU16::new(u16::from(consistent)),
                consistent,
                resolved: Mutex::new(!consistent),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Derives this future's first promise (the caller's own outstanding unit of work).
    #[must_use]
    pub fn promise(&self) -> Promise {
        Promise {
            future: self.clone(),
            resolved: false,
        }
    }

    fn increment(&self) {
        if self.inner.consistent {
            self.inner.counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn decrement(&self) {
        if !self.inner.consistent {
            return;
        }
        if self.inner.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            *self.inner.resolved.lock() = true;
            self.inner.condvar.notify_all();
        }
    }

    /// Blocks the calling thread until every promise derived from this future has resolved.
    pub fn wait(&self) {
        let mut resolved = self.inner.resolved.lock();
        while !*resolved {
            self.inner.condvar.wait(&mut resolved);
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// One outstanding unit of work against a [`Future`]. Must be consumed by [`Self::resolve`];
/// dropping it while unresolved panics if its future is in consistent mode, reproducing the
/// original's "broken promise" fatal check.
pub struct Promise {
    future: Future,
    resolved: bool,
}

impl Promise {
    /// A pre-resolved promise for inconsistent-mode flows that never need to block a writer,
    /// matching `Promise::None` in the source.
    #[must_use]
    pub fn none() -> Self {
        Self {
            future: Future::new(false),
            resolved: true,
        }
    }

    /// Derives a second outstanding promise against the same future (fan-out to multiple
    /// downstream operators): the future is not resolved until every derived promise also
    /// resolves.
    #[must_use]
    pub fn derive(&self) -> Self {
        self.future.increment();
        Self {
            future: self.future.clone(),
            resolved: false,
        }
    }

    pub fn resolve(mut self) {
        self.future.decrement();
        self.resolved = true;
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        if !self.resolved && self.future.inner.consistent && !std::thread::panicking() {
            panic!("broken promise: dropped without being resolved");
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
