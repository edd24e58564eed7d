//! Counting limiter for concurrent tool invocations.
//!
//! Transcoding is CPU and disk heavy, so the number of external processes
//! running at once is bounded across all jobs sharing one limiter.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::orchestrator::CancelHandle;

/// How often a blocked caller re-checks cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Bounded pool of invocation slots.
pub struct ToolLimiter {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl ToolLimiter {
    /// Create a limiter with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Block until a slot is free.
    ///
    /// Returns `None` if cancellation is requested while waiting.
    pub fn acquire(&self, cancel: &CancelHandle) -> Option<ToolPermit<'_>> {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            if cancel.is_cancelled() {
                return None;
            }
            self.released.wait_for(&mut in_use, WAIT_SLICE);
        }
        if cancel.is_cancelled() {
            return None;
        }
        *in_use += 1;
        Some(ToolPermit { limiter: self })
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock();
        *in_use = in_use.saturating_sub(1);
        self.released.notify_one();
    }
}

/// A held slot; released on drop.
pub struct ToolPermit<'a> {
    limiter: &'a ToolLimiter,
}

impl Drop for ToolPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn permits_release_on_drop() {
        let limiter = ToolLimiter::new(2);
        let cancel = CancelHandle::new();

        let a = limiter.acquire(&cancel).unwrap();
        let b = limiter.acquire(&cancel).unwrap();
        assert_eq!(limiter.in_use(), 2);

        drop(a);
        assert_eq!(limiter.in_use(), 1);
        drop(b);
        assert_eq!(limiter.in_use(), 0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(ToolLimiter::new(0).capacity(), 1);
    }

    #[test]
    fn cancelled_waiter_gives_up() {
        let limiter = ToolLimiter::new(1);
        let cancel = CancelHandle::new();
        let _held = limiter.acquire(&cancel).unwrap();

        cancel.cancel();
        assert!(limiter.acquire(&cancel).is_none());
    }

    #[test]
    fn never_exceeds_capacity() {
        let limiter = Arc::new(ToolLimiter::new(2));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancelHandle::new();

        thread::scope(|scope| {
            for _ in 0..6 {
                let limiter = Arc::clone(&limiter);
                let peak = Arc::clone(&peak);
                let cancel = cancel.clone();
                scope.spawn(move || {
                    let _permit = limiter.acquire(&cancel).unwrap();
                    peak.fetch_max(limiter.in_use(), Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.in_use(), 0);
    }
}
