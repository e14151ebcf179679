use qued::{ListStore, MemoryStore, Message, QuedError, Queue, RetryOutcome};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

const SHORT: Duration = Duration::from_millis(20);

fn orders(max_tries: u32) -> (Queue, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let queue = Queue::with_store("orders", store.clone(), max_tries).unwrap();
    (queue, store)
}

#[tokio::test]
async fn test_enqueue_dequeue_preserves_fields() {
    let (queue, _) = orders(3);
    let payload = json!({"id": 42, "items": ["a", "b"], "total": 9.5, "gift": false});

    let id = assert_ok!(queue.enqueue(Some("order.created"), &payload).await);
    let message = queue.dequeue(SHORT).await.unwrap().unwrap();

    assert_eq!(message.id, id);
    assert_eq!(message.kind.as_deref(), Some("order.created"));
    assert_eq!(message.payload, payload);
    assert_eq!(message.attempts, 0);
    assert!(message.created_at_utc().is_some());
}

#[tokio::test]
async fn test_enqueue_without_kind() {
    let (queue, _) = orders(3);
    queue.enqueue(None, &[1, 2, 3]).await.unwrap();

    let message = queue.dequeue(SHORT).await.unwrap().unwrap();
    assert_eq!(message.kind, None);
    assert_eq!(message.payload, json!([1, 2, 3]));
}

#[tokio::test]
async fn test_encoding_is_stable_for_live_and_dead_records() {
    let (queue, store) = orders(1);
    queue.enqueue(Some("x"), &json!({"k": "v"})).await.unwrap();

    let raw = store.blocking_pop("orders", SHORT).await.unwrap().unwrap();
    let live = Message::decode(raw.clone()).unwrap();
    assert_eq!(live.encode().unwrap(), raw);

    let mut message = live.clone();
    queue.fail(&mut message).await.unwrap();
    let raw = store.blocking_pop("orders:dead", SHORT).await.unwrap().unwrap();
    let dead = Message::decode(raw.clone()).unwrap();
    assert_eq!(dead.encode().unwrap(), raw);
    assert_eq!(dead, message);
}

#[tokio::test]
async fn test_retry_budget_boundary() {
    for max_tries in 1..=5u32 {
        let (queue, store) = orders(max_tries);
        queue.enqueue(None, "job").await.unwrap();

        // N-1 retries keep the message live.
        for expected in 1..max_tries {
            let mut message = queue.dequeue(SHORT).await.unwrap().unwrap();
            let outcome = queue.retry(&mut message).await.unwrap();
            assert_eq!(outcome, RetryOutcome::Requeued);
            assert_eq!(message.attempts, expected);
            assert_eq!(store.len("orders"), 1);
        }

        // The Nth dead-letters it.
        let mut message = queue.dequeue(SHORT).await.unwrap().unwrap();
        let outcome = queue.retry(&mut message).await.unwrap();
        assert_eq!(outcome, RetryOutcome::DeadLettered);
        assert!(queue.dequeue(SHORT).await.unwrap().is_none());
        assert_eq!(store.len("orders:dead"), 1);
    }
}

#[tokio::test]
async fn test_fifo_order() {
    let (queue, _) = orders(3);
    let a = queue.enqueue(None, "A").await.unwrap();
    let b = queue.enqueue(None, "B").await.unwrap();

    assert_eq!(queue.dequeue(SHORT).await.unwrap().unwrap().id, a);
    assert_eq!(queue.dequeue(SHORT).await.unwrap().unwrap().id, b);
}

#[tokio::test]
async fn test_retried_message_goes_to_back() {
    let (queue, _) = orders(3);
    let a = queue.enqueue(None, "A").await.unwrap();
    let b = queue.enqueue(None, "B").await.unwrap();

    let mut first = queue.dequeue(SHORT).await.unwrap().unwrap();
    assert_eq!(first.id, a);
    queue.retry(&mut first).await.unwrap();

    assert_eq!(queue.dequeue(SHORT).await.unwrap().unwrap().id, b);
    assert_eq!(queue.dequeue(SHORT).await.unwrap().unwrap().id, a);
}

#[tokio::test]
async fn test_empty_lists_time_out_without_error() {
    let (queue, _) = orders(3);
    let timeout = Duration::from_millis(100);

    let started = Instant::now();
    let live = assert_ok!(queue.dequeue(timeout).await);
    let live_elapsed = started.elapsed();
    assert!(live.is_none());
    assert!(live_elapsed >= timeout);
    assert!(live_elapsed < timeout + Duration::from_millis(500));

    let started = Instant::now();
    let dead = assert_ok!(queue.dead_letter(timeout).await);
    assert!(dead.is_none());
    assert!(started.elapsed() >= timeout);
}

#[tokio::test]
async fn test_zero_timeout_blocks_until_message() {
    let (queue, _) = orders(3);

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue(Duration::ZERO).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!consumer.is_finished());

    let id = queue.enqueue(None, "late").await.unwrap();
    let message = tokio::time::timeout(Duration::from_secs(1), consumer)
        .await
        .unwrap()
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(message.id, id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dequeue_delivers_each_message_once() {
    const MESSAGES: usize = 50;
    const CONSUMERS: usize = 64;

    let (queue, _) = orders(3);

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_millis(500)).await })
        })
        .collect();

    let producers: Vec<_> = (0..MESSAGES)
        .map(|i| {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(None, &i).await })
        })
        .collect();

    let mut sent = HashSet::new();
    for producer in producers {
        sent.insert(producer.await.unwrap().unwrap());
    }

    let mut received = Vec::new();
    for consumer in consumers {
        if let Some(message) = consumer.await.unwrap().unwrap() {
            received.push(message.id);
        }
    }

    let unique: HashSet<_> = received.iter().cloned().collect();
    assert_eq!(received.len(), MESSAGES, "no message lost");
    assert_eq!(unique.len(), MESSAGES, "no message duplicated");
    assert_eq!(unique, sent);
}

#[tokio::test]
async fn test_orders_scenario() {
    let (queue, store) = orders(3);

    let x = queue
        .enqueue(Some("order.created"), &json!({"id": 42}))
        .await
        .unwrap();

    let mut message = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(message.id, x);
    assert_eq!(message.attempts, 0);

    assert_eq!(queue.retry(&mut message).await.unwrap(), RetryOutcome::Requeued);
    assert_eq!(message.attempts, 1);

    let mut message = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(message.id, x);
    assert_eq!(message.attempts, 1);

    assert_eq!(queue.retry(&mut message).await.unwrap(), RetryOutcome::Requeued);
    let mut message = queue.dequeue(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(message.attempts, 2);

    assert_eq!(
        queue.retry(&mut message).await.unwrap(),
        RetryOutcome::DeadLettered
    );
    assert_eq!(message.attempts, 3);
    assert!(store.is_empty("orders"));

    let dead = queue.dead_letter(Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(dead.id, x);
    assert_eq!(dead.attempts, 3);
    assert_eq!(dead.payload, json!({"id": 42}));
}

#[tokio::test]
async fn test_reenqueue_dead_letter_gets_fresh_identity() {
    let (queue, _) = orders(1);
    let original = queue.enqueue(Some("job"), "payload").await.unwrap();
    let mut message = queue.dequeue(SHORT).await.unwrap().unwrap();
    queue.retry(&mut message).await.unwrap();

    let dead = queue.dead_letter(SHORT).await.unwrap().unwrap();
    let again = queue
        .enqueue(dead.kind.as_deref(), &dead.payload)
        .await
        .unwrap();

    let revived = queue.dequeue(SHORT).await.unwrap().unwrap();
    assert_ne!(again, original);
    assert_eq!(revived.id, again);
    assert_eq!(revived.attempts, 0);
    assert_eq!(revived.payload, json!("payload"));
}

#[tokio::test]
async fn test_queues_sharing_a_store_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let orders = Queue::with_store("orders", store.clone(), 3).unwrap();
    let emails = Queue::with_store("emails", store.clone(), 3).unwrap();

    orders.enqueue(None, "order").await.unwrap();

    assert!(emails.dequeue(SHORT).await.unwrap().is_none());
    assert!(orders.dequeue(SHORT).await.unwrap().is_some());
}

#[tokio::test]
async fn test_poison_record_is_reported_with_bytes() {
    let (queue, store) = orders(3);
    store.push("orders", b"\x00\x01".to_vec()).await.unwrap();

    let err = assert_err!(queue.dequeue(SHORT).await);
    assert!(matches!(err, QuedError::Deserialization { .. }));
    assert_eq!(err.raw_message(), Some(&b"\x00\x01"[..]));
}

#[tokio::test]
async fn test_close() {
    let (queue, _) = orders(3);
    let handle = queue.clone();

    assert_ok!(queue.close().await);
    assert_err!(handle.dequeue(SHORT).await);
}

#[cfg(test)]
mod config_tests {
    use qued::{ConfigBuilder, MemoryStore, QuedError, Queue};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .name("payments")
            .url("redis://cache:6380/2")
            .max_tries(7)
            .poll_timeout(Duration::from_secs(1))
            .max_retries(2)
            .retry_delay(Duration::from_millis(250))
            .build();

        assert_eq!(config.name, "payments");
        assert_eq!(config.url, "redis://cache:6380/2");
        assert_eq!(config.max_tries, 7);
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(250));

        let queue = Queue::with_config(&config, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(queue.dead_letter_name(), "payments:dead");
        assert_eq!(queue.max_tries(), 7);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConfigBuilder::new().max_tries(0).build();
        let result = Queue::with_config(&config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(QuedError::Configuration(_))));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_connect_rejects_bad_url() {
        let result = Queue::connect("orders", "definitely not a url", 3);
        assert!(matches!(result, Err(QuedError::Configuration(_))));
    }
}
