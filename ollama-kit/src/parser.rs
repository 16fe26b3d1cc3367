//! Newline-delimited JSON decoding of streaming responses.
//!
//! Every non-blank line of the body is one JSON record. The decoder is fail-fast:
//! a line that does not decode ends the stream with [`Error::Serialization`], since
//! carrying on after a desynchronised chunk could silently corrupt whatever the
//! consumer is accumulating.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::errors::classify_message;
use crate::{Error, Result};

/// A record that can appear on a streaming endpoint.
pub trait StreamRecord: DeserializeOwned {
    /// `true` for the terminal record; nothing is read after it.
    fn is_done(&self) -> bool;
}

/// Where a streaming call is once its connection has been established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Records may still arrive.
    Streaming,
    /// The terminal record was yielded.
    Done,
    /// An error was yielded; nothing follows it.
    Failed,
    /// The attached cancellation token fired.
    Cancelled,
}

/// An in-band error reported by the server in place of a record.
#[derive(Deserialize)]
struct ErrorLine {
    error: String,
}

/// Generic newline-delimited JSON streaming decoder.
///
/// - `S` is the underlying stream that yields `Result<Bytes>`
/// - `T` is the record type expected on every line
///
/// Records are yielded in wire order whatever the chunking of `S`. After the terminal
/// record, an error, or cancellation, the inner stream is dropped (releasing the
/// connection) and the decoder only ever yields `None`.
pub struct NdjsonDecoder<S, T> {
    inner: Option<S>,
    buffer: Vec<u8>,
    state: StreamState,
    cancellation: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<S, T> NdjsonDecoder<S, T>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
    T: StreamRecord,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: Some(stream),
            buffer: Vec::new(),
            state: StreamState::Streaming,
            cancellation: None,
            _marker: PhantomData,
        }
    }

    /// Stops the stream as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(Box::pin(token.cancelled_owned()));
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn finish(&mut self, state: StreamState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(?state, "ndjson stream finished");

        self.state = state;
        self.inner = None;
        self.buffer = Vec::new();
        self.cancellation = None;
    }

    /// Takes the next complete, non-blank line out of the buffer.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
            let line_bytes = self.buffer.drain(..=newline_pos).collect::<Vec<u8>>();
            let line = trim_whitespace(&line_bytes);

            if line.is_empty() {
                continue;
            }
            return Some(line.to_vec());
        }
    }

    fn decode(line: &[u8]) -> Result<T> {
        if contains(line, b"\"error\"") {
            if let Ok(err) = serde_json::from_slice::<ErrorLine>(line) {
                return Err(classify_message(err.error));
            }
        }
        serde_json::from_slice::<T>(line).map_err(|e| Error::decode_failure(e, line))
    }

    fn emit(&mut self, line: &[u8]) -> Poll<Option<Result<T>>> {
        match Self::decode(line) {
            Ok(record) => {
                if record.is_done() {
                    self.finish(StreamState::Done);
                }
                Poll::Ready(Some(Ok(record)))
            }
            Err(err) => {
                self.finish(StreamState::Failed);
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl<S, T> Stream for NdjsonDecoder<S, T>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
    T: StreamRecord,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Every field is Unpin, so mutating through `get_mut` is fine.
        let this = self.get_mut();

        loop {
            if this.state != StreamState::Streaming {
                return Poll::Ready(None);
            }

            if let Some(cancelled) = this.cancellation.as_mut() {
                if cancelled.as_mut().poll(cx).is_ready() {
                    this.finish(StreamState::Cancelled);
                    return Poll::Ready(None);
                }
            }

            if let Some(line) = this.next_line() {
                return this.emit(&line);
            }

            let Some(inner) = this.inner.as_mut() else {
                // Body exhausted without a terminal record.
                this.finish(StreamState::Failed);
                return Poll::Ready(Some(Err(Error::network(
                    "stream ended before the final record",
                ))));
            };

            match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finish(StreamState::Failed);
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    // An unterminated last line still counts as a line.
                    if !trim_whitespace(&this.buffer).is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &bytes[start..end]
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
