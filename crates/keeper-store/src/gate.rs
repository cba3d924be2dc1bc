use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// How long a writer may wait for the exclusive write section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyPolicy {
    /// Give up with [`StoreError::Busy`] after this long.
    pub timeout: Duration,
    /// Sleep between attempts.
    pub retry_interval: Duration,
}

impl Default for BusyPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retry_interval: Duration::from_millis(5),
        }
    }
}

/// Exclusive write section with a bounded busy-wait.
///
/// Wraps the writer-side resource of a store (nothing for the in-memory
/// backend, the open log file for the file backend). Acquisition polls with
/// `try_lock` until the [`BusyPolicy`] timeout elapses instead of blocking
/// indefinitely.
pub struct WriteGate<T> {
    inner: Mutex<T>,
    policy: BusyPolicy,
}

impl<T> WriteGate<T> {
    pub fn new(inner: T, policy: BusyPolicy) -> Self {
        Self {
            inner: Mutex::new(inner),
            policy,
        }
    }

    /// Enter the write section, retrying until the busy timeout.
    pub fn acquire(&self) -> StoreResult<MutexGuard<'_, T>> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            match self.inner.try_lock() {
                Ok(guard) => {
                    if attempts > 0 {
                        debug!(attempts, waited = ?started.elapsed(), "write gate acquired after contention");
                    }
                    return Ok(guard);
                }
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::LockPoisoned),
                Err(TryLockError::WouldBlock) => {
                    if started.elapsed() >= self.policy.timeout {
                        return Err(StoreError::Busy(self.policy.timeout));
                    }
                    attempts += 1;
                    thread::sleep(self.policy.retry_interval);
                }
            }
        }
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }
}
