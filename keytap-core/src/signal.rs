//! One-shot cancellation signal shared by every worker of a race.
//!
//! The signal starts unset and can only ever move to set. The first worker
//! to obtain an assertion sets it; backends block on it as their timeout
//! input, so a device still waiting for a touch stops as soon as another
//! device wins.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic "happened" flag with blocking waits.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    set: Mutex<bool>,
    cond: Condvar,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake every waiter.
    ///
    /// Returns `true` only for the call that performed the transition;
    /// setting an already-set signal is a no-op.
    pub fn set(&self) -> bool {
        let mut set = self.lock();
        if *set {
            return false;
        }
        *set = true;
        self.inner.cond.notify_all();
        true
    }

    pub fn is_set(&self) -> bool {
        *self.lock()
    }

    /// Block until the signal is set.
    pub fn wait(&self) {
        let mut set = self.lock();
        while !*set {
            set = self
                .inner
                .cond
                .wait(set)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the signal is set or `timeout` elapses.
    ///
    /// Returns whether the signal is set. A timeout too large to represent
    /// as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut set = self.lock();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            set = guard;
        }
        *set
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // A bool cannot be left half-written, so a poisoned lock is still usable.
        self.inner.set.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_starts_unset() {
        let signal = CancelSignal::new();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_set_is_idempotent() {
        let signal = CancelSignal::new();
        assert!(signal.set(), "First set should perform the transition");
        assert!(!signal.set(), "Second set should be a no-op");
        assert!(signal.is_set());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancelSignal::new();
        let other = signal.clone();
        other.set();
        assert!(signal.is_set());
    }

    #[test]
    fn test_wait_timeout_expires_when_unset() {
        let signal = CancelSignal::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_timeout_wakes_on_set() {
        let signal = CancelSignal::new();
        let setter = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        let started = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "Waiter should wake as soon as the signal is set"
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_unbounded_wait_timeout_on_set_signal() {
        let signal = CancelSignal::new();
        signal.set();
        assert!(signal.wait_timeout(Duration::MAX));
    }

    #[test]
    fn test_unbounded_wait_timeout_wakes_on_set() {
        let signal = CancelSignal::new();
        let setter = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        assert!(signal.wait_timeout(Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_returns_once_set() {
        let signal = CancelSignal::new();
        let waiter = signal.clone();

        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(10));
        signal.set();
        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_setters_transition_once() {
        let signal = CancelSignal::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    signal.set()
                })
            })
            .collect();

        let transitions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(transitions, 1);
    }
}
