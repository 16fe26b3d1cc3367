use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use ollama_kit::parser::{NdjsonDecoder, StreamRecord, StreamState};
use ollama_kit::{Error, ErrorKind, Result};

#[derive(Debug, Deserialize, PartialEq)]
struct MockRecord {
    id: u32,
    #[serde(default)]
    content: String,
    #[serde(default)]
    done: bool,
}

impl StreamRecord for MockRecord {
    fn is_done(&self) -> bool {
        self.done
    }
}

// Helper function to create a stream from a vector of byte chunks
fn create_byte_stream(
    chunks: Vec<String>,
) -> impl futures::Stream<Item = Result<Bytes>> + Send + Unpin + 'static {
    stream::iter(chunks.into_iter().map(|s| Ok(Bytes::from(s))))
}

fn decoder(
    chunks: Vec<String>,
) -> NdjsonDecoder<impl futures::Stream<Item = Result<Bytes>> + Send + Unpin, MockRecord> {
    NdjsonDecoder::new(create_byte_stream(chunks))
}

fn five_records() -> String {
    let mut body = String::new();
    for id in 1..=5 {
        let done = id == 5;
        body.push_str(&format!(
            "{{\"id\":{id},\"content\":\"part {id}\",\"done\":{done}}}\n"
        ));
    }
    body
}

async fn collect_ids(
    mut decoder: NdjsonDecoder<impl futures::Stream<Item = Result<Bytes>> + Send + Unpin, MockRecord>,
) -> Vec<u32> {
    let mut ids = Vec::new();
    while let Some(record) = decoder.next().await {
        ids.push(record.expect("unexpected error").id);
    }
    assert_eq!(decoder.state(), StreamState::Done);
    ids
}

#[tokio::test]
async fn test_single_terminal_record() {
    let mut decoder = decoder(vec![r#"{"id":1,"content":"hi","done":true}"#.to_string() + "\n"]);

    let record = decoder.next().await.unwrap().unwrap();
    assert_eq!(record.content, "hi");
    assert!(record.done);
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Done);
}

#[tokio::test]
async fn test_records_are_independent_of_chunking() {
    let body = five_records();
    let expected = vec![1, 2, 3, 4, 5];

    // One chunk per line.
    let per_line = body.lines().map(|l| format!("{l}\n")).collect();
    assert_eq!(collect_ids(decoder(per_line)).await, expected);

    // The whole body at once.
    assert_eq!(collect_ids(decoder(vec![body.clone()])).await, expected);

    // One byte at a time.
    let per_byte = body.chars().map(|c| c.to_string()).collect();
    assert_eq!(collect_ids(decoder(per_byte)).await, expected);

    // Uneven splits that cut through lines and through the newlines themselves.
    let mut uneven = Vec::new();
    let mut rest = body.as_str();
    let mut size = 7;
    while !rest.is_empty() {
        let cut = size.min(rest.len());
        uneven.push(rest[..cut].to_string());
        rest = &rest[cut..];
        size = size * 2 % 31 + 1;
    }
    assert_eq!(collect_ids(decoder(uneven)).await, expected);
}

#[tokio::test]
async fn test_malformed_line_fails_fast() {
    let chunks = vec![
        "{\"id\":1}\n{\"id\":2}\n".to_string(),
        "{\"id\":3}\n".to_string(),
        "{\"id\":4,\"content\":\n".to_string(),
        "{\"id\":5}\n{\"id\":6,\"done\":true}\n".to_string(),
    ];
    let mut decoder = decoder(chunks);

    for expected in 1..=3 {
        assert_eq!(decoder.next().await.unwrap().unwrap().id, expected);
    }

    match decoder.next().await {
        Some(Err(Error::Serialization { line, .. })) => {
            assert_eq!(line.as_deref(), Some("{\"id\":4,\"content\":"));
        }
        other => panic!("Expected Serialization error, got {:?}", other),
    }

    // Nothing after the failure, not even the valid lines behind it.
    assert!(decoder.next().await.is_none());
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Failed);
}

#[tokio::test]
async fn test_blank_lines_are_skipped() {
    let chunks = vec![
        "\n\n{\"id\":1}\n".to_string(),
        "   \n\r\n".to_string(),
        "{\"id\":2,\"done\":true}\r\n\n".to_string(),
    ];
    assert_eq!(collect_ids(decoder(chunks)).await, vec![1, 2]);
}

#[tokio::test]
async fn test_nothing_is_read_after_terminal_record() {
    let chunks = vec![
        "{\"id\":1}\n{\"id\":2,\"done\":true}\n".to_string(),
        "{\"id\":3}\n".to_string(),
        "this is not json\n".to_string(),
    ];
    assert_eq!(collect_ids(decoder(chunks)).await, vec![1, 2]);
}

#[tokio::test]
async fn test_unterminated_last_line_is_decoded() {
    let chunks = vec![
        "{\"id\":1}\n".to_string(),
        "{\"id\":2,\"done\":true}".to_string(),
    ];
    assert_eq!(collect_ids(decoder(chunks)).await, vec![1, 2]);
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    let chunks = vec![
        "{\"id\":1,\"model\":\"llama3.2\",\"created_at\":\"2024-01-01T00:00:00Z\",\"done\":true}\n"
            .to_string(),
    ];
    assert_eq!(collect_ids(decoder(chunks)).await, vec![1]);
}

#[tokio::test]
async fn test_in_band_error_line() {
    let chunks = vec![
        "{\"id\":1}\n".to_string(),
        "{\"error\":\"an error was encountered while running the model\"}\n".to_string(),
        "{\"id\":2,\"done\":true}\n".to_string(),
    ];
    let mut decoder = decoder(chunks);

    assert_eq!(decoder.next().await.unwrap().unwrap().id, 1);
    let err = decoder.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert_eq!(err.message(), "an error was encountered while running the model");
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Failed);
}

#[tokio::test]
async fn test_in_band_unsupported_error_line() {
    let chunks = vec!["{\"error\":\"llama2 Does Not Support thinking\"}\n".to_string()];
    let mut decoder = decoder(chunks);

    let err = decoder.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[tokio::test]
async fn test_premature_end_is_a_network_error() {
    let chunks = vec!["{\"id\":1}\n{\"id\":2}\n".to_string()];
    let mut decoder = decoder(chunks);

    assert_eq!(decoder.next().await.unwrap().unwrap().id, 1);
    assert_eq!(decoder.next().await.unwrap().unwrap().id, 2);
    let err = decoder.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Failed);
}

#[tokio::test]
async fn test_transport_error_mid_stream_ends_the_stream() {
    let chunks: Vec<Result<Bytes>> = vec![
        Ok(Bytes::from("{\"id\":1}\n")),
        Err(Error::network("connection reset by peer")),
        Ok(Bytes::from("{\"id\":2,\"done\":true}\n")),
    ];
    let mut decoder: NdjsonDecoder<_, MockRecord> = NdjsonDecoder::new(stream::iter(chunks));

    assert_eq!(decoder.next().await.unwrap().unwrap().id, 1);
    let err = decoder.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(decoder.next().await.is_none());
}

#[tokio::test]
async fn test_cancellation_before_first_record() {
    let token = CancellationToken::new();
    let mut decoder = decoder(vec![five_records()]).with_cancellation(token.clone());

    token.cancel();
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Cancelled);
}

#[tokio::test]
async fn test_cancellation_releases_the_body() {
    let (tx, rx) = mpsc::unbounded::<Result<Bytes>>();
    let token = CancellationToken::new();
    let mut decoder: NdjsonDecoder<_, MockRecord> =
        NdjsonDecoder::new(rx).with_cancellation(token.clone());

    tx.unbounded_send(Ok(Bytes::from("{\"id\":1,\"content\":\"a\"}\n")))
        .unwrap();
    assert_eq!(decoder.next().await.unwrap().unwrap().content, "a");

    token.cancel();
    assert!(decoder.next().await.is_none());
    assert_eq!(decoder.state(), StreamState::Cancelled);

    // The receiving half was dropped along with the body.
    assert!(tx.is_closed());
    assert!(decoder.next().await.is_none());
}
