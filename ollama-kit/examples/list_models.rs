use ollama_kit::OllamaClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = OllamaClient::builder().build()?;

    let version = client.version().await?;
    println!("Ollama {}", version.version);

    let response = client.list_models().await?;
    for model in response.models {
        println!("{} ({} bytes)", model.name, model.size);
    }

    let running = client.list_running_models().await?;
    for model in running.models {
        println!("running: {} until {}", model.name, model.expires_at);
    }

    Ok(())
}
