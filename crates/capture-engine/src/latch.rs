//! Single-use completion gate.
//!
//! `stop()` has to block until two independent callbacks (capture stopped,
//! writer finalized) have each fired once. The latch starts at a count and
//! releases waiters when it reaches zero.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A count-down latch. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct CompletionLatch {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl CompletionLatch {
    /// Create a latch that opens after `count` calls to [`count_down`](Self::count_down).
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(count), Condvar::new())),
        }
    }

    /// Record one completion. Calls past zero are ignored.
    pub fn count_down(&self) {
        let (lock, cvar) = &*self.inner;
        let mut remaining = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                cvar.notify_all();
            }
        }
    }

    /// Completions still outstanding.
    pub fn remaining(&self) -> usize {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut remaining = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = cvar.wait(remaining).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    /// Returns `true` if the latch opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut remaining = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            remaining = cvar
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// A guard that counts the latch down once when dropped.
    ///
    /// Moving the guard into a completion callback means the latch still
    /// opens if the callback is dropped without ever being called.
    pub fn count_down_on_drop(&self) -> CountDownGuard {
        CountDownGuard {
            latch: self.clone(),
        }
    }
}

/// See [`CompletionLatch::count_down_on_drop`].
#[derive(Debug)]
pub struct CountDownGuard {
    latch: CompletionLatch,
}

impl Drop for CountDownGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
