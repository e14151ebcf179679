//! Consumer loop on top of [`Queue`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::{QuedError, Result},
    message::Message,
    queue::{Queue, RetryOutcome},
    retry::RetryStrategy,
};

/// Pulls messages off a [`Queue`] and hands them to a handler until told to
/// stop.
///
/// A handler returning `Ok` consumes the message. Returning `Err` sends it
/// through [`Queue::retry`], so it comes back later or ends up dead-lettered.
/// Store outages are absorbed with exponential backoff up to `max_retries`
/// consecutive failures.
///
/// # Examples
///
/// ```no_run
/// use qued::{Queue, Worker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), qued::QuedError> {
///     let queue = Queue::connect("emails", "redis://localhost:6379", 3)?;
///     let worker = Worker::new(queue);
///
///     let stats = worker
///         .run(
///             |message| async move {
///                 println!("sending {}", message.payload);
///                 Ok::<_, String>(())
///             },
///             async {
///                 let _ = tokio::signal::ctrl_c().await;
///             },
///         )
///         .await?;
///
///     println!("processed {}", stats.processed);
///     Ok(())
/// }
/// ```
pub struct Worker {
    queue: Queue,
    poll_timeout: Duration,
    retry: RetryStrategy,
}

/// Counters returned by [`Worker::run`] on shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    /// Records that could not be decoded and were dropped.
    pub discarded: u64,
}

impl Worker {
    pub fn new(queue: Queue) -> Self {
        Self::from_config(queue, &Config::default())
    }

    /// Takes `poll_timeout`, `max_retries` and `retry_delay` from `config`.
    pub fn from_config(queue: Queue, config: &Config) -> Self {
        Self {
            queue,
            poll_timeout: config.poll_timeout,
            retry: RetryStrategy::new(config.max_retries, config.retry_delay),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Runs until `shutdown` resolves or the store stays unreachable.
    ///
    /// `shutdown` is only observed while waiting for the next message; a
    /// handler that is already running is allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns the last store error once backoff is exhausted, or any
    /// non-retryable error other than an undecodable record.
    ///
    /// If handing a failed message back to the queue fails, that message is
    /// lost: it has already left the list and is not pushed anywhere else.
    /// Its id is logged at `error` level before the error is returned.
    pub async fn run<H, Fut, E, S>(&self, mut handler: H, shutdown: S) -> Result<WorkerStats>
    where
        H: FnMut(Message) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Display,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();
        info!(queue = %self.queue.name(), "worker started");

        loop {
            let next = tokio::select! {
                _ = &mut shutdown => {
                    info!(queue = %self.queue.name(), ?stats, "worker stopped");
                    return Ok(stats);
                }
                next = self.retry.execute(|| self.queue.dequeue(self.poll_timeout)) => next,
            };

            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err @ QuedError::Deserialization { .. }) => {
                    error!(queue = %self.queue.name(), error = %err, "dropping poison message");
                    stats.discarded += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let message_id = message.id.clone();
            match handler(message.clone()).await {
                Ok(()) => stats.processed += 1,
                Err(reason) => {
                    warn!(
                        queue = %self.queue.name(),
                        message_id = %message_id,
                        attempts = message.attempts,
                        error = %reason,
                        "handler failed"
                    );
                    match self.hand_back(&message).await {
                        Ok(RetryOutcome::Requeued) => stats.retried += 1,
                        Ok(RetryOutcome::DeadLettered) => stats.dead_lettered += 1,
                        Err(err) => {
                            error!(
                                queue = %self.queue.name(),
                                message_id = %message_id,
                                attempts = message.attempts,
                                error = %err,
                                "could not hand message back, message lost"
                            );
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    async fn hand_back(&self, message: &Message) -> Result<RetryOutcome> {
        self.retry
            .execute(|| {
                let mut message = message.clone();
                async move { self.queue.retry(&mut message).await }
            })
            .await
    }
}
