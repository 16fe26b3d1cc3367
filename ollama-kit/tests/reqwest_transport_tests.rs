use std::time::Duration;

use futures::StreamExt;
use mockito::Matcher;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use ollama_kit::parser::StreamState;
use ollama_kit::types::chat::{ChatRequest, Message};
use ollama_kit::types::generate::GenerateRequest;
use ollama_kit::types::PullModelRequest;
use ollama_kit::{Error, ErrorKind, OllamaClient, Result, RetryPolicy};

fn client_for(server: &mockito::ServerGuard) -> Result<OllamaClient> {
    OllamaClient::builder()
        .base_url(server.url())
        .retry_policy(RetryPolicy::none())
        .build()
}

#[tokio::test]
async fn test_chat_over_http() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJsonString(
            r#"{"model":"llama3.2","stream":false}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"model":"llama3.2","message":{"role":"assistant","content":"hi"},"done":true}"#)
        .create_async()
        .await;

    let client = client_for(&server)?;
    let response = client
        .chat(ChatRequest::new("llama3.2").message(Message::user("hello")))
        .await?;

    assert_eq!(response.message.content, "hi");
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_api_key_is_sent_as_bearer_token() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/version")
        .match_header("authorization", "Bearer secret-key")
        .with_status(200)
        .with_body(r#"{"version":"0.5.7"}"#)
        .create_async()
        .await;

    let client = OllamaClient::builder()
        .base_url(server.url())
        .api_key("secret-key")
        .build()?;

    assert_eq!(client.version().await?.version, "0.5.7");
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_error_statuses_are_classified() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/show")
        .with_status(404)
        .with_body(r#"{"error":"model 'nope' not found"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/tags")
        .with_status(500)
        .with_body("internal failure")
        .create_async()
        .await;

    let client = client_for(&server)?;

    let err = client
        .show_model(ollama_kit::types::ShowModelRequest::new("nope"))
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::NotFound { resource, .. } if resource == "nope"));

    let err = client.list_models().await.unwrap_err();
    assert!(matches!(&err, Error::Http { status: 500, message, .. } if message == "internal failure"));

    Ok(())
}

#[tokio::test]
async fn test_streaming_over_http() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = [
        r#"{"status":"pulling manifest"}"#,
        r#"{"status":"pulling","digest":"sha256:abc","total":100,"completed":40}"#,
        r#"{"status":"success"}"#,
    ]
    .join("\n");
    let mock = server
        .mock("POST", "/api/pull")
        .match_body(Matcher::PartialJsonString(r#"{"stream":true}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server)?;
    let mut stream = client
        .pull_model_stream(PullModelRequest::new("llama3.2"))
        .await?;

    let mut statuses = Vec::new();
    let mut fractions = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event?;
        fractions.push(event.fraction());
        statuses.push(event.status);
    }

    assert_eq!(statuses, ["pulling manifest", "pulling", "success"]);
    assert_eq!(fractions, [None, Some(0.4), None]);
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() -> Result<()> {
    // Bind and drop a listener to get a port nothing is listening on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let client = OllamaClient::builder()
        .base_url(format!("127.0.0.1:{port}"))
        .retry_policy(RetryPolicy::none())
        .build()?;

    let err = client.version().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_transient());

    Ok(())
}

#[tokio::test]
async fn test_request_timeout() -> Result<()> {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = OllamaClient::builder()
        .base_url(format!("http://{addr}"))
        .request_timeout(Duration::from_millis(200))
        .retry_policy(RetryPolicy::none())
        .build()?;

    let err = client.version().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_stalled_stream_hits_read_timeout() -> Result<()> {
    // Sends the headers and one record, then goes quiet with the socket open.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let line = "{\"model\":\"llama3.2\",\"response\":\"Hel\",\"done\":false}\n";
        let reply = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{line}\r\n",
            line.len()
        );
        socket.write_all(reply.as_bytes()).await.expect("write reply");
        socket.flush().await.expect("flush");
        std::future::pending::<()>().await;
    });

    let client = OllamaClient::builder()
        .base_url(format!("http://{addr}"))
        .read_timeout(Duration::from_millis(200))
        .retry_policy(RetryPolicy::none())
        .build()?;

    let mut stream = client
        .generate_stream(GenerateRequest::new("llama3.2", "Hello"))
        .await?;

    let first = stream.next().await.expect("first record")?;
    assert_eq!(first.response, "Hel");
    assert!(!first.done);

    let err = stream
        .next()
        .await
        .expect("timeout item")
        .expect_err("stalled body should time out");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(stream.state(), StreamState::Failed);
    assert!(stream.next().await.is_none());

    server.abort();
    Ok(())
}

#[tokio::test]
async fn test_reqwest_404_does_not_guess_resource_from_url() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/chat")
        .with_status(404)
        .create_async()
        .await;

    let reqwest_err = reqwest::get(format!("{}/api/chat", server.url()))
        .await
        .expect("response")
        .error_for_status()
        .expect_err("404 status");

    let err = Error::from(reqwest_err);
    match err {
        Error::NotFound { resource, .. } => assert_eq!(resource, "unknown resource"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_base_url() {
    let err = OllamaClient::builder()
        .base_url("http://[::1")
        .build()
        .err()
        .expect("expected an error");
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
