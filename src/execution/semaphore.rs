use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A small, blocking counting semaphore bounding the number of files read at once.
pub struct Semaphore {
    permits: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    /// `permits` is clamped to at least one.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits.max(1)),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter is always left consistent, so a poisoned lock is still usable.
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire one permit, blocking until available.
    ///
    /// Returns the time spent waiting (zero if no wait was required).
    pub fn acquire(&self) -> Duration {
        let start = Instant::now();
        let mut waited = false;
        let mut g = self.lock();
        while *g == 0 {
            waited = true;
            g = self.cv.wait(g).unwrap_or_else(PoisonError::into_inner);
        }
        *g -= 1;
        if waited { start.elapsed() } else { Duration::ZERO }
    }

    /// Release one permit.
    pub fn release(&self) {
        let mut g = self.lock();
        *g += 1;
        self.cv.notify_one();
    }

    /// Acquire a permit that is released on drop, so a panicking worker cannot leak it.
    pub fn permit(&self) -> (Permit<'_>, Duration) {
        let waited = self.acquire();
        (Permit { sem: self }, waited)
    }
}

/// RAII guard returned by [`Semaphore::permit`].
pub struct Permit<'a> {
    sem: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}
