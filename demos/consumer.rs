use qued::{ConfigBuilder, Message, Queue, RedisStore, Worker};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ConfigBuilder::new()
        .name("my-queue")
        .url(std::env::var("QUED_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()))
        .max_tries(3)
        .poll_timeout(Duration::from_secs(2))
        .max_retries(5)
        .retry_delay_ms(200)
        .build();

    let store = Arc::new(RedisStore::open(&config.url)?);
    let queue = Queue::with_config(&config, store)?;
    let worker = Worker::from_config(queue.clone(), &config);

    println!("Starting worker on {}, press Ctrl-C to stop...", queue.name());

    let stats = worker
        .run(process_message, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!(
        "Processed {}, retried {}, dead-lettered {}, discarded {}",
        stats.processed, stats.retried, stats.dead_lettered, stats.discarded
    );

    queue.close().await?;
    Ok(())
}

async fn process_message(message: Message) -> Result<(), String> {
    println!(
        "Processing {} (attempt {}): {}",
        message.id,
        message.attempts + 1,
        message.payload
    );
    sleep(Duration::from_millis(100)).await;

    if message.payload.to_string().contains("error") {
        Err("payload contains 'error'".to_string())
    } else {
        Ok(())
    }
}
