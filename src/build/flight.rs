//! Per-key mutual exclusion for in-flight work.
//!
//! One mutex per active key, created on first use and dropped when the
//! last holder releases, so the registry only ever tracks keys that
//! are actually in flight. Unrelated keys never contend.

use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::lock_api::ArcMutexGuard;
use std::sync::Arc;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Registry of per-key locks.
#[derive(Default)]
pub struct KeyedLocks {
    locks: LockMap,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is exclusively held.
    pub fn lock(&self, key: &str) -> FlightGuard<'_> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_arc();
        FlightGuard {
            key: key.to_string(),
            registry: &self.locks,
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Held exclusive access to one key.
///
/// Dropping releases the lock and retires the registry entry once no
/// other holder or waiter keeps the mutex alive.
pub struct FlightGuard<'a> {
    key: String,
    registry: &'a LockMap,
    guard: Option<ArcMutexGuard<parking_lot::RawMutex, ()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold Arc clones, so a count of one means nobody else
        // can reach this mutex anymore.
        self.registry
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _guard = locks.lock("bundle");
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_do_not_block() {
        let locks = Arc::new(KeyedLocks::new());
        let _held = locks.lock("a");

        let other = Arc::clone(&locks);
        let done = thread::spawn(move || {
            let _guard = other.lock("b");
        });
        done.join().unwrap();
    }

    #[test]
    fn test_registry_retires_idle_keys() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("a");
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);

        // Reacquiring after retirement works.
        let _again = locks.lock("a");
        assert_eq!(locks.active(), 1);
    }
}
