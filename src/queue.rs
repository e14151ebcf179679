use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{QuedError, Result, StoreError},
    message::Message,
    store::ListStore,
};

/// A named queue with a bounded retry budget and a dead-letter list.
///
/// `Queue` pushes JSON-encoded [`Message`]s onto a live list called `name`
/// and pops them from the other end, so each list is FIFO. Messages whose
/// retries run out are moved to `<name>:dead`.
///
/// Delivery is at-least-once while consumers stay alive. There is no
/// visibility timeout: a message popped by a consumer that then dies before
/// calling [`retry`](Self::retry) or [`fail`](Self::fail) is gone.
///
/// Cloning is cheap and every clone talks to the same store.
///
/// # Examples
///
/// ```no_run
/// use qued::Queue;
/// use serde_json::json;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), qued::QuedError> {
///     let queue = Queue::connect("orders", "redis://localhost:6379", 3)?;
///
///     let id = queue.enqueue(Some("order.created"), &json!({"id": 42})).await?;
///     println!("Enqueued {}", id);
///
///     if let Some(mut message) = queue.dequeue(Duration::from_secs(1)).await? {
///         // Processing failed, give it another go later.
///         queue.retry(&mut message).await?;
///     }
///
///     queue.close().await
/// }
/// ```
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn ListStore>,
    name: String,
    dead_name: String,
    max_tries: u32,
}

/// Which way [`Queue::retry`] routed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Pushed back onto the live list for another delivery.
    Requeued,
    /// Retry budget exhausted, moved to the dead-letter list.
    DeadLettered,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("dead_name", &self.dead_name)
            .field("max_tries", &self.max_tries)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Opens a queue on the Redis server at `url`.
    ///
    /// No connection is made until the first operation.
    ///
    /// # Errors
    ///
    /// [`QuedError::Configuration`] if `url` is not a valid Redis URL, `name`
    /// is empty or `max_tries` is zero.
    #[cfg(feature = "redis")]
    pub fn connect(name: impl Into<String>, url: &str, max_tries: u32) -> Result<Self> {
        let store = crate::store::RedisStore::open(url)?;
        Self::with_store(name, Arc::new(store), max_tries)
    }

    /// Opens a queue on an existing store handle.
    ///
    /// # Errors
    ///
    /// [`QuedError::Configuration`] if `name` is empty or `max_tries` is zero.
    pub fn with_store(
        name: impl Into<String>,
        store: Arc<dyn ListStore>,
        max_tries: u32,
    ) -> Result<Self> {
        let config = Config {
            name: name.into(),
            max_tries,
            ..Config::default()
        };
        Self::with_config(&config, store)
    }

    /// Opens a queue using the name and retry budget from `config`.
    pub fn with_config(config: &Config, store: Arc<dyn ListStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            name: config.name.clone(),
            dead_name: config.dead_letter_name(),
            max_tries: config.max_tries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the dead-letter list, always `<name>:dead`.
    pub fn dead_letter_name(&self) -> &str {
        &self.dead_name
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Adds a new message to the live list and returns its id.
    ///
    /// # Errors
    ///
    /// * [`QuedError::Serialization`] if `payload` cannot be turned into JSON
    /// * [`QuedError::Store`] if the push fails
    pub async fn enqueue<T>(&self, kind: Option<&str>, payload: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)?;
        let message = Message::new(kind, payload);
        self.push(&self.name, &message).await?;

        debug!(queue = %self.name, message_id = %message.id, "enqueued");
        Ok(message.id)
    }

    /// Pops the oldest message from the live list, waiting up to `timeout`.
    ///
    /// `Duration::ZERO` waits until a message arrives. `Ok(None)` means the
    /// wait elapsed with nothing to do; it is not an error.
    ///
    /// # Errors
    ///
    /// * [`QuedError::Deserialization`] if the popped record is not a valid
    ///   message. The record is already off the list at that point; its bytes
    ///   are carried in the error.
    /// * [`QuedError::Store`] on connection failure
    pub async fn dequeue(&self, timeout: Duration) -> Result<Option<Message>> {
        self.pop(&self.name, timeout).await
    }

    /// Counts one more attempt and moves `message` to the dead-letter list.
    ///
    /// On error `message` is left untouched, so the call can be repeated.
    pub async fn fail(&self, message: &mut Message) -> Result<()> {
        self.push_attempt(&self.dead_name, message).await?;

        info!(
            queue = %self.name,
            message_id = %message.id,
            attempts = message.attempts,
            "message dead-lettered"
        );
        Ok(())
    }

    /// Counts one more attempt and either puts `message` back on the live
    /// list or, once `attempts >= max_tries`, dead-letters it.
    ///
    /// With `max_tries = N` a message is delivered at most N times: the Nth
    /// retry call sends it to the dead-letter list. On error `message` is
    /// left untouched.
    pub async fn retry(&self, message: &mut Message) -> Result<RetryOutcome> {
        if message.attempts.saturating_add(1) >= self.max_tries {
            self.fail(message).await?;
            return Ok(RetryOutcome::DeadLettered);
        }

        self.push_attempt(&self.name, message).await?;

        debug!(
            queue = %self.name,
            message_id = %message.id,
            attempts = message.attempts,
            "requeued"
        );
        Ok(RetryOutcome::Requeued)
    }

    /// Pops the oldest message from the dead-letter list. Same contract as
    /// [`dequeue`](Self::dequeue).
    ///
    /// Attempts are left as they are; re-enqueueing a dead letter with a
    /// fresh budget is up to the caller.
    pub async fn dead_letter(&self, timeout: Duration) -> Result<Option<Message>> {
        self.pop(&self.dead_name, timeout).await
    }

    /// Releases the store connection. Every clone of this queue shares the
    /// store, so they all stop working too.
    pub async fn close(self) -> Result<()> {
        self.store.close().await.map_err(|e| match e {
            StoreError::Closed => QuedError::Closed,
            other => other.into(),
        })?;
        debug!(queue = %self.name, "closed");
        Ok(())
    }

    async fn push(&self, key: &str, message: &Message) -> Result<()> {
        let data = message.encode()?;
        self.store.push(key, data).await?;
        Ok(())
    }

    async fn push_attempt(&self, key: &str, message: &mut Message) -> Result<()> {
        let previous = message.attempts;
        message.attempts = previous.saturating_add(1);
        if let Err(err) = self.push(key, message).await {
            message.attempts = previous;
            return Err(err);
        }
        Ok(())
    }

    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<Message>> {
        let Some(raw) = self.store.blocking_pop(key, timeout).await? else {
            return Ok(None);
        };

        match Message::decode(raw) {
            Ok(message) => {
                debug!(
                    list = key,
                    message_id = %message.id,
                    attempts = message.attempts,
                    "popped"
                );
                Ok(Some(message))
            }
            Err(err) => {
                warn!(list = key, error = %err, "undecodable record popped");
                Err(err)
            }
        }
    }
}
