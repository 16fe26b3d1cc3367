use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "tracing")]
use tracing::instrument;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream;
use futures::StreamExt;

use crate::transport::Transport;
use crate::types::{HttpRequest, HttpResponse, StreamingHttpResponse};
use crate::{Error, Result};

/// One canned outcome of a [`MockTransport`] call.
enum MockReply {
    Response {
        status: u16,
        chunks: Vec<Bytes>,
    },
    Fault(Error),
}

/// A mock implementation of the [`Transport`] trait for testing purposes.
///
/// Replies are queued up front and handed out in order, one per call, whichever
/// method is called: a streaming call receives the configured chunks as-is, a
/// non-streaming call receives them concatenated. Every request is recorded so tests
/// can inspect what the client actually sent.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a new, empty [`MockTransport`].
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, reply: MockReply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// Queues a response with the given status and body.
    pub fn with_response(self, status: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let chunks = if body.is_empty() { Vec::new() } else { vec![body] };
        self.push(MockReply::Response { status, chunks })
    }

    /// Queues a `200 OK` response with a JSON body.
    pub fn with_json(self, body: impl Into<String>) -> Self {
        self.with_response(200, body.into())
    }

    /// Queues a response with the given status and no body.
    pub fn with_empty(self, status: u16) -> Self {
        self.push(MockReply::Response {
            status,
            chunks: Vec::new(),
        })
    }

    /// Queues a `200 OK` newline-delimited response, one chunk per line.
    pub fn with_stream_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chunks = lines
            .into_iter()
            .map(|line| Bytes::from(format!("{}\n", line.as_ref())))
            .collect();
        self.push(MockReply::Response {
            status: 200,
            chunks,
        })
    }

    /// Queues a response whose body arrives exactly in the given chunks.
    pub fn with_stream_chunks(self, status: u16, chunks: Vec<Bytes>) -> Self {
        self.push(MockReply::Response { status, chunks })
    }

    /// Queues a transport-level fault, as if the request never got a response.
    pub fn with_fault(self, error: Error) -> Self {
        self.push(MockReply::Fault(error))
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_reply(&self, request: HttpRequest) -> Result<(u16, Vec<Bytes>)> {
        lock(&self.requests).push(request);
        match lock(&self.replies).pop_front() {
            Some(MockReply::Response { status, chunks }) => Ok((status, chunks)),
            Some(MockReply::Fault(error)) => Err(error),
            None => Err(Error::network("no mock response configured")),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    #[cfg_attr(feature = "tracing", instrument(skip(self, request)))]
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (status, chunks) = self.next_reply(request)?;
        let body = chunks
            .into_iter()
            .fold(BytesMut::new(), |mut acc, chunk| {
                acc.extend_from_slice(&chunk);
                acc
            })
            .freeze();
        Ok(HttpResponse::new(status, (!body.is_empty()).then_some(body)))
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request)))]
    async fn send_http_stream_request(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingHttpResponse> {
        let (status, chunks) = self.next_reply(request)?;
        let body = stream::iter(chunks.into_iter().map(Ok::<Bytes, Error>)).boxed();
        Ok(StreamingHttpResponse::new(status, body))
    }
}
