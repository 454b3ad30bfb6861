//! Per-delegation mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Hands out one mutex per delegation id.
///
/// Entries are dropped once nobody holds or waits on them, so the map
/// only grows with concurrently contested ids.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn with_lock<T>(&self, id: Uuid, f: impl FnOnce() -> T) -> T {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };

        let result = {
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only taken and released under the map lock, so the
        // last caller out sees the map as the sole holder.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(entry);
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
        result
    }

    /// Ids currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no id is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_serializes_same_id() {
        let registry = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let id = Uuid::new_v4();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    registry.with_lock(id, || {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_millis(10));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_contended_ids_are_released() {
        let registry = Arc::new(LockRegistry::new());
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let ids = ids.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for round in 0..200 {
                        registry.with_lock(ids[(t + round) % ids.len()], || thread::yield_now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_returns_closure_value() {
        let registry = LockRegistry::new();
        assert_eq!(registry.with_lock(Uuid::nil(), || 7), 7);
        assert_eq!(registry.len(), 0);
    }
}
