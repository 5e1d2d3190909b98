//! Per-video mutual exclusion for load → mutate → save cycles.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry size at which idle locks are dropped before a new one is added.
pub const LOCK_PRUNE_THRESHOLD: usize = 1024;

fn retain_held(locks: &mut HashMap<String, Arc<Mutex<()>>>) {
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
}

/// Registry handing out one mutex per video id.
///
/// Ranges for different videos never contend; writers to the same video run
/// one at a time.
#[derive(Debug, Default)]
pub struct VideoLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VideoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, video_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if locks.len() >= LOCK_PRUNE_THRESHOLD && !locks.contains_key(video_id) {
            retain_held(&mut locks);
        }
        Arc::clone(
            locks
                .entry(video_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Run `f` while holding the lock for `video_id`.
    pub fn with_lock<T>(&self, video_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(video_id);
        let _guard = lock.lock();
        f()
    }

    /// Number of videos that currently have a registered lock.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Forget locks nobody is holding or waiting on; returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        retain_held(&mut locks);
        before - locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_video_is_serialized() {
        let locks = VideoLocks::new();
        let active = AtomicUsize::new(0);
        let max_active = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        locks.with_lock("video", || {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            std::thread::yield_now();
                            active.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                });
            }
        });

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_with_lock_returns_value() {
        let locks = VideoLocks::new();
        assert_eq!(locks.with_lock("a", || 41 + 1), 42);
    }

    #[test]
    fn test_registry_stays_bounded() {
        let locks = VideoLocks::new();
        for i in 0..(LOCK_PRUNE_THRESHOLD * 3) {
            locks.with_lock(&format!("video-{i}"), || ());
        }
        assert!(locks.len() <= LOCK_PRUNE_THRESHOLD);
    }

    #[test]
    fn test_prune_keeps_held_locks() {
        let locks = VideoLocks::new();
        locks.with_lock("held", || {
            locks.with_lock("idle", || ());
            assert_eq!(locks.prune(), 1);
            assert_eq!(locks.len(), 1);
        });
    }

    #[test]
    fn test_prune_drops_idle_locks() {
        let locks = VideoLocks::new();
        locks.with_lock("a", || ());
        locks.with_lock("b", || ());
        assert_eq!(locks.len(), 2);
        assert_eq!(locks.prune(), 2);
        assert!(locks.is_empty());
    }
}
