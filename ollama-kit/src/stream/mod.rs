//! Typed record streams returned by the streaming operations of
//! [`OllamaClient`](crate::OllamaClient).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::parser::{NdjsonDecoder, StreamRecord, StreamState};
use crate::types::chat::ChatResponse;
use crate::types::generate::GenerateResponse;
use crate::types::{ByteStream, ProgressResponse};
use crate::Result;

/// A lazy, finite, non-restartable sequence of records from one streaming call.
///
/// The stream ends after the terminal record or the first error. It can be stopped
/// early by dropping it or through [`with_cancellation`](Self::with_cancellation);
/// either way the underlying connection is released.
pub struct ResponseStream<T> {
    inner: NdjsonDecoder<ByteStream, T>,
}

/// Chunks of a streamed chat completion.
pub type ChatStream = ResponseStream<ChatResponse>;

/// Chunks of a streamed text generation.
pub type GenerateStream = ResponseStream<GenerateResponse>;

/// Status updates of a pull, push or create operation.
pub type ProgressStream = ResponseStream<ProgressResponse>;

impl<T: StreamRecord> ResponseStream<T> {
    pub fn from_bytes_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        let stream: ByteStream = Box::pin(stream);
        Self {
            inner: NdjsonDecoder::new(stream),
        }
    }

    /// Stops the stream, without yielding anything further, once `token` is cancelled.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            inner: self.inner.with_cancellation(token),
        }
    }

    pub fn state(&self) -> StreamState {
        self.inner.state()
    }
}

impl<T: StreamRecord> Stream for ResponseStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl ChatStream {
    /// Drains the stream into a single response whose message content (and thinking)
    /// is the concatenation of every chunk, and whose metadata is the last chunk's.
    ///
    /// If the stream is cancelled, whatever arrived so far is returned with
    /// `done == false`.
    pub async fn collect_message(mut self) -> Result<ChatResponse> {
        let mut collected = ChatResponse::default();
        let mut content = String::new();
        let mut thinking = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            content.push_str(&chunk.message.content);
            if let Some(t) = &chunk.message.thinking {
                thinking.push_str(t);
            }
            tool_calls.extend(chunk.message.tool_calls.iter().cloned());
            collected = chunk;
        }

        collected.message.content = content;
        collected.message.thinking = (!thinking.is_empty()).then_some(thinking);
        collected.message.tool_calls = tool_calls;
        Ok(collected)
    }
}

impl GenerateStream {
    /// Drains the stream into a single response whose `response` text is the
    /// concatenation of every chunk.
    pub async fn collect_text(mut self) -> Result<GenerateResponse> {
        let mut collected = GenerateResponse::default();
        let mut response = String::new();
        let mut thinking = String::new();

        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            response.push_str(&chunk.response);
            if let Some(t) = &chunk.thinking {
                thinking.push_str(t);
            }
            collected = chunk;
        }

        collected.response = response;
        collected.thinking = (!thinking.is_empty()).then_some(thinking);
        Ok(collected)
    }
}
