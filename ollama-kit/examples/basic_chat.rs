use ollama_kit::types::chat::ChatRequest;
use ollama_kit::types::{Message, Options};
use ollama_kit::{Error, OllamaClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = OllamaClient::builder().build()?;

    let request = ChatRequest::new("llama3.2")
        .message(Message::user("What is the capital of France?"))
        .options(Options::new().temperature(0.2));

    match client.chat(request).await {
        Ok(response) => println!("Response: {}", response.message.content),
        Err(Error::NotFound { resource, .. }) => {
            eprintln!("Model {resource} is not available locally, pull it first")
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
