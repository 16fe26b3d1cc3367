use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use ollama_kit::types::chat::ChatRequest;
use ollama_kit::types::Message;
use ollama_kit::{OllamaClient, RetryPolicy};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let client = OllamaClient::builder()
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(60))
        .retry_policy(RetryPolicy::default().max_attempts(5))
        .build()?;

    let request = ChatRequest::new("llama3.2")
        .message(Message::user("Tell me a story about a Rust programmer."));

    // Give up on the story after 30 seconds; the connection is released right away.
    let token = CancellationToken::new();
    let deadline = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        deadline.cancel();
    });

    let mut stream = client.chat_stream(request).await?.with_cancellation(token);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{}", chunk.message.content);
        std::io::stdout().flush()?;
        if chunk.done {
            if let Some(tps) = chunk.metrics.tokens_per_second() {
                println!("\n\n[{:.1} tokens/s]", tps);
            }
        }
    }
    println!("\n[{:?}]", stream.state());

    Ok(())
}
