use qued::Queue;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Drains `my-queue:dead`. Pass `--requeue` to enqueue each dead letter again
/// as a brand-new message with a fresh retry budget.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let requeue = std::env::args().any(|arg| arg == "--requeue");
    let url = std::env::var("QUED_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
    let queue = Queue::connect("my-queue", &url, 3)?;

    let mut count = 0;
    while let Some(message) = queue.dead_letter(Duration::from_secs(1)).await? {
        count += 1;
        println!(
            "Dead letter {} [{}] created {} after {} attempts: {}",
            message.id,
            message.kind.as_deref().unwrap_or("-"),
            message.created_at,
            message.attempts,
            message.payload
        );

        if requeue {
            let id = queue
                .enqueue(message.kind.as_deref(), &message.payload)
                .await?;
            println!("  requeued as {}", id);
        }
    }

    println!("{} dead letter(s) drained from {}", count, queue.dead_letter_name());
    queue.close().await?;
    Ok(())
}
