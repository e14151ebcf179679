//! Redis list store (`LPUSH` / `BRPOP`).
//!
//! Pushes share a single multiplexed connection. A `BRPOP` holds its
//! connection for the whole wait, so every blocking pop checks out a
//! dedicated connection from a small idle pool instead.
//!
//! A multiplexed connection does not reconnect by itself. When a push fails
//! with a connection error the shared connection is dropped and the next
//! push opens a fresh one.

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

use super::ListStore;
use crate::error::{QuedError, StoreError};

const MAX_IDLE_CONNECTIONS: usize = 8;

/// [`ListStore`] backed by a Redis server.
///
/// Records are pushed with `LPUSH` and popped with `BRPOP`, which keeps the
/// lists readable by any other client using the same convention.
pub struct RedisStore {
    client: Client,
    shared: Mutex<Option<MultiplexedConnection>>,
    idle: Mutex<Vec<MultiplexedConnection>>,
    closed: AtomicBool,
    shutdown: Notify,
}

impl RedisStore {
    /// Parses `url` and prepares a client. No connection is made until the
    /// first command.
    ///
    /// # Errors
    ///
    /// [`QuedError::Configuration`] if `url` is not a valid Redis URL.
    pub fn open(url: &str) -> Result<Self, QuedError> {
        let client = Client::open(url)
            .map_err(|e| QuedError::Configuration(format!("invalid Redis URL: {e}")))?;

        Ok(Self {
            client,
            shared: Mutex::new(None),
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn shared(&self) -> Result<MutexGuard<'_, Option<MultiplexedConnection>>, StoreError> {
        self.shared
            .lock()
            .map_err(|_| StoreError::Backend("Redis connection lock poisoned".to_string()))
    }

    async fn shared_connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let cached = self.shared()?.clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        debug!("opening shared Redis connection");
        let conn = self.client.get_multiplexed_async_connection().await?;

        let mut shared = self.shared()?;
        // close() may have run while we were connecting.
        self.ensure_open()?;
        Ok(shared.get_or_insert(conn).clone())
    }

    fn drop_shared_connection(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            if shared.take().is_some() {
                debug!("dropped broken shared Redis connection");
            }
        }
    }

    async fn checkout(&self) -> Result<MultiplexedConnection, StoreError> {
        let pooled = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        match pooled {
            Some(conn) => Ok(conn),
            None => {
                trace!("opening blocking Redis connection");
                Ok(self.client.get_multiplexed_async_connection().await?)
            }
        }
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_CONNECTIONS {
                idle.push(conn);
            }
        }
    }
}

#[async_trait]
impl ListStore for RedisStore {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut conn = self.shared_connection().await?;

        let result: Result<i64, _> = conn.lpush(key, value).await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = StoreError::from(err);
                if matches!(err, StoreError::Connection(_)) {
                    self.drop_shared_connection();
                }
                Err(err)
            }
        }
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        // Register before checking the flag so a close() racing with this
        // call still wakes it.
        let closed = self.shutdown.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        self.ensure_open()?;
        let mut conn = self.checkout().await?;

        // Redis reads a zero timeout as "block forever".
        let mut cmd = ::redis::cmd("BRPOP");
        cmd.arg(key).arg(timeout.as_secs_f64());
        let query = async {
            let reply: Option<(String, Vec<u8>)> = cmd.query_async(&mut conn).await?;
            Ok::<_, StoreError>(reply)
        };

        let reply = tokio::select! {
            _ = &mut closed => return Err(StoreError::Closed),
            reply = query => reply?,
        };

        // Only healthy connections make it back into the pool.
        self.checkin(conn);
        Ok(reply.map(|(_, value)| value))
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }
        if let Ok(mut shared) = self.shared.lock() {
            shared.take();
        }
        if let Ok(mut idle) = self.idle.lock() {
            idle.clear();
        }
        self.shutdown.notify_waiters();
        debug!("Redis store closed");
        Ok(())
    }
}
