use futures::StreamExt;
use ollama_kit::types::PullModelRequest;
use ollama_kit::OllamaClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = OllamaClient::builder().build()?;

    let mut progress = client
        .pull_model_stream(PullModelRequest::new("llama3.2"))
        .await?;

    while let Some(update) = progress.next().await {
        let update = update?;
        match update.fraction() {
            Some(fraction) => println!("{} {:>5.1}%", update.status, fraction * 100.0),
            None => println!("{}", update.status),
        }
    }

    Ok(())
}
