//! In-process list store.
//!
//! Lists live in a mutex-guarded map; a [`Notify`] wakes blocked pops when
//! anything is pushed. The pop itself happens under the lock, so concurrent
//! waiters never receive the same value.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::trace;

use super::ListStore;
use crate::error::StoreError;

type Lists = HashMap<String, VecDeque<Vec<u8>>>;

/// [`ListStore`] backed by process memory.
///
/// Share it between queues with an `Arc` to simulate several processes
/// talking to one store.
#[derive(Default)]
pub struct MemoryStore {
    lists: Mutex<Lists>,
    pushed: Notify,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values currently held in list `key`.
    ///
    /// Reads through a poisoned lock: every mutation finishes before the
    /// guard drops, so the map is still consistent.
    pub fn len(&self, key: &str) -> usize {
        let lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        lists.get(key).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    fn lists(&self) -> Result<MutexGuard<'_, Lists>, StoreError> {
        self.lists
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn try_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        let mut lists = self.lists()?;
        let Some(list) = lists.get_mut(key) else {
            return Ok(None);
        };
        let value = list.pop_back();
        if list.is_empty() {
            lists.remove(key);
        }
        Ok(value)
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.ensure_open()?;
        {
            let mut lists = self.lists()?;
            lists.entry(key.to_string()).or_default().push_front(value);
        }
        trace!(key, "pushed");
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

        loop {
            // Register for wake-ups before looking, so a push that lands
            // between the check and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_pop(key)? {
                return Ok(Some(value));
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }
        self.pushed.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_push_pop_fifo() {
        let store = MemoryStore::new();
        store.push("q", b"a".to_vec()).await.unwrap();
        store.push("q", b"b".to_vec()).await.unwrap();
        assert_eq!(store.len("q"), 2);

        let first = store.blocking_pop("q", Duration::from_millis(10)).await;
        let second = store.blocking_pop("q", Duration::from_millis(10)).await;
        assert_eq!(first.unwrap(), Some(b"a".to_vec()));
        assert_eq!(second.unwrap(), Some(b"b".to_vec()));
        assert!(store.is_empty("q"));
    }

    #[tokio::test]
    async fn test_lists_are_independent() {
        let store = MemoryStore::new();
        store.push("q", b"live".to_vec()).await.unwrap();
        store.push("q:dead", b"dead".to_vec()).await.unwrap();

        let dead = store.blocking_pop("q:dead", Duration::from_millis(10)).await;
        assert_eq!(dead.unwrap(), Some(b"dead".to_vec()));
        assert_eq!(store.len("q"), 1);
    }

    #[tokio::test]
    async fn test_pop_times_out_empty() {
        let store = MemoryStore::new();
        let started = std::time::Instant::now();

        let result = store.blocking_pop("q", Duration::from_millis(50)).await;

        assert_eq!(result.unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_blocked_pop_wakes_on_push() {
        let store = Arc::new(MemoryStore::new());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.blocking_pop("q", Duration::ZERO).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.push("q", b"late".to_vec()).await.unwrap();

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.unwrap(), Some(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_pop() {
        let store = Arc::new(MemoryStore::new());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.blocking_pop("q", Duration::ZERO).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.close().await.unwrap();

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(popped, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_calls_after_close_fail() {
        let store = MemoryStore::new();
        store.close().await.unwrap();

        assert!(matches!(
            store.push("q", vec![1]).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.blocking_pop("q", Duration::from_millis(1)).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.close().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_len_survives_poisoned_lock() {
        let store = MemoryStore::new();
        store.push("q", b"a".to_vec()).await.unwrap();
        store.push("q", b"b".to_vec()).await.unwrap();

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.lists.lock().unwrap();
            panic!("poison the lock");
        }));
        assert!(poisoned.is_err());
        assert!(store.lists.is_poisoned());

        assert_eq!(store.len("q"), 2);
        assert!(!store.is_empty("q"));
        assert!(matches!(
            store.push("q", b"c".to_vec()).await,
            Err(StoreError::Backend(_))
        ));
    }
}
