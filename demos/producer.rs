use qued::Queue;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let url = std::env::var("QUED_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
    let queue = Queue::connect("my-queue", &url, 3)?;

    let id = queue
        .enqueue(
            Some("user.created"),
            &json!({
                "name": "John Doe",
                "email": "john.doe@example.com",
            }),
        )
        .await?;
    println!("Enqueued message with ID: {}", id);

    // Anything containing "error" is rejected by the consumer demo.
    let id = queue
        .enqueue(Some("user.created"), &json!({"name": "error"}))
        .await?;
    println!("Enqueued failing message with ID: {}", id);

    queue.close().await?;
    Ok(())
}
