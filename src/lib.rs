//! # qued
//!
//! A minimal message queue on top of a list-structured key-value store such as
//! Redis. Producers enqueue JSON messages onto a named list; consumers block
//! on the other end, and failed messages are retried a bounded number of times
//! before being routed to a dead-letter list.
//!
//! ## Quick Start
//!
//! ```no_run
//! use qued::{Queue, RetryOutcome};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = Queue::connect("orders", "redis://localhost:6379", 3)?;
//!
//!     // Producer side
//!     let id = queue.enqueue(Some("order.created"), &json!({"id": 42})).await?;
//!     println!("Enqueued message with ID: {}", id);
//!
//!     // Consumer side
//!     while let Some(mut message) = queue.dequeue(Duration::from_secs(1)).await? {
//!         if process(&message).is_err() {
//!             if queue.retry(&mut message).await? == RetryOutcome::DeadLettered {
//!                 println!("{} gave up after {} attempts", message.id, message.attempts);
//!             }
//!         }
//!     }
//!
//!     queue.close().await?;
//!     Ok(())
//! }
//! # fn process(_: &qued::Message) -> Result<(), ()> { Ok(()) }
//! ```
//!
//! ## Delivery model
//!
//! - Lists are FIFO: records are pushed on one end and popped from the other.
//!   Retried messages go to the back of the line like new ones.
//! - Each record is popped by exactly one consumer.
//! - A queue with `max_tries = N` delivers a message at most N times; the Nth
//!   [`Queue::retry`] moves it to `<name>:dead`.
//! - There is no visibility timeout. A consumer that crashes between
//!   [`Queue::dequeue`] and [`Queue::retry`]/[`Queue::fail`] loses the
//!   message.
//! - [`Worker::run`] stops with an error if a failed message cannot be handed
//!   back to the store. That message is lost; its id is logged at `error`.
//! - Dead letters never expire and are never retried automatically. Read them
//!   with [`Queue::dead_letter`] and decide what to do.
//!
//! ## Stores
//!
//! Anything implementing [`ListStore`] can back a queue. [`RedisStore`]
//! (feature `redis`, on by default) is interoperable with other clients that
//! use `LPUSH`/`BRPOP` on the same keys; [`MemoryStore`] keeps everything in
//! process.
//!
//! ## Configuration
//!
//! ```no_run
//! use qued::{ConfigBuilder, Queue, RedisStore, Worker};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), qued::QuedError> {
//! let config = ConfigBuilder::new()
//!     .name("emails")
//!     .url("redis://queue.example.com:6379")
//!     .max_tries(5)
//!     .poll_timeout_ms(2_000)
//!     .build();
//!
//! let store = Arc::new(RedisStore::open(&config.url)?);
//! let queue = Queue::with_config(&config, store)?;
//! let worker = Worker::from_config(queue, &config);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod queue;
mod retry;
pub mod store;
pub mod worker;

pub use config::{Config, ConfigBuilder};
pub use error::{QuedError, Result, StoreError};
pub use message::Message;
pub use queue::{Queue, RetryOutcome};
pub use store::{ListStore, MemoryStore};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use worker::{Worker, WorkerStats};
