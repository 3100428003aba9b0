//! Per-key mutual exclusion.
//!
//! Serializes operations that share a key (a publish topic) without ever
//! blocking operations on different keys. Locks are created lazily on first
//! use and removed again once the last holder or waiter is gone, so the map
//! tracks only live keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Keyed lock set. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct KeyLock {
    locks: LockMap,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting behind any current holder of the
    /// same key. Holders of other keys are unaffected.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let handle = {
            let mut map = self.locks.lock().expect("key lock map poisoned");
            map.entry(key.to_owned()).or_default().clone()
        };
        // The await happens outside the map lock; the clone above keeps the
        // entry alive even if the current holder releases meanwhile.
        let permit = handle.clone().lock_owned().await;

        KeyGuard {
            key: key.to_owned(),
            handle,
            permit: Some(permit),
            locks: self.locks.clone(),
        }
    }

    /// Number of keys with a live holder or waiter.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("key lock map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key. Releases on drop.
pub struct KeyGuard {
    key: String,
    handle: Arc<AsyncMutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut map = self.locks.lock().expect("key lock map poisoned");
        // Release first: the owned guard holds its own reference to the
        // lock, which must be gone before the count below means anything.
        self.permit.take();
        if let Some(entry) = map.get(&self.key) {
            // Two references left (the map's and ours) means no holder and
            // no waiter remain; anyone arriving later recreates the entry.
            // A waiter that already cloned the Arc keeps the entry alive, so
            // two lock objects for the same key can never coexist.
            if Arc::ptr_eq(entry, &self.handle) && Arc::strong_count(entry) == 2 {
                map.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::sleep;

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = KeyLock::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let guard = locks.acquire("device/a/pin/set").await;

        let locks2 = locks.clone();
        let tx2 = tx.clone();
        let waiter = tokio::spawn(async move {
            let _guard = locks2.acquire("device/a/pin/set").await;
            tx2.send("second").unwrap();
        });

        sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "second acquire ran under the first");

        tx.send("first").unwrap();
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(rx.recv().await, Some("first"));
        assert_eq!(rx.recv().await, Some("second"));
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let locks = KeyLock::new();
        let _a = locks.acquire("device/a/pin/set").await;

        // Must not wait behind the held key.
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("device/b/pin/set"),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn entries_are_removed_after_release() {
        let locks = KeyLock::new();
        {
            let _guard = locks.acquire("device/a/pin/set").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn key_is_reusable_after_removal() {
        let locks = KeyLock::new();
        drop(locks.acquire("k").await);
        drop(locks.acquire("k").await);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn waiter_keeps_entry_alive() {
        let locks = KeyLock::new();
        let guard = locks.acquire("k").await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = locks2.acquire("k").await;
            locks2.len()
        });

        sleep(Duration::from_millis(20)).await;
        drop(guard);
        // The waiter observed the same entry; the map never held two
        // distinct locks for the key.
        assert_eq!(waiter.await.unwrap(), 1);
    }
}
