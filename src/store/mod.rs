//! List-store capability the queue is built on.
//!
//! A [`ListStore`] only has to offer three primitives: push onto a named list,
//! blocking pop from the opposite end of that list, and close. Any store with
//! atomic list push/pop semantics can back a [`Queue`](crate::Queue).
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`]: in-process lists, for tests and single-process use
//! - [`RedisStore`]: Redis `LPUSH`/`BRPOP` (feature `redis`)

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

#[async_trait]
pub trait ListStore: Send + Sync {
    /// Pushes `value` onto the head of list `key`.
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Removes and returns the tail of list `key`, waiting up to `timeout`
    /// for one to arrive. `Duration::ZERO` waits forever. `Ok(None)` means
    /// the wait elapsed with the list still empty.
    ///
    /// Each pushed value is handed to exactly one caller.
    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Releases connections held by the store. Later calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
