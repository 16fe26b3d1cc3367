use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::errors::classify_response;
use crate::{Error, Result};

/// A body delivered incrementally, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Largest error body drained from a failed streaming response before classifying it.
const MAX_ERROR_BODY: usize = 64 * 1024;

#[derive(Default, Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub verb: HttpVerb,
    pub body: Option<serde_json::Value>,
    /// Overrides the transport's total request timeout for this call only.
    pub timeout: Option<Duration>,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    #[default]
    GET,
    POST,
    DELETE,
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Option<Bytes>,
}

/// A response whose body has not been read yet.
pub struct StreamingHttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(mut self) -> Self {
        self.verb = HttpVerb::GET;
        self
    }

    pub fn post(mut self) -> Self {
        self.verb = HttpVerb::POST;
        self
    }

    pub fn delete(mut self) -> Self {
        self.verb = HttpVerb::DELETE;
        self
    }

    pub fn body<T: Serialize>(mut self, body: T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl HttpResponse {
    pub fn new(status: u16, body: Option<Bytes>) -> Self {
        Self { status, body }
    }

    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, Some(body.into()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classifies a non-success response into an [`Error`].
    pub fn into_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(classify_response(self.status, self.body.as_deref()))
        }
    }

    /// The body of a successful response that is expected to carry one.
    pub fn into_body(self) -> Result<Bytes> {
        self.body
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::serialization("Missing response body"))
    }
}

impl StreamingHttpResponse {
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Hands back the body of a successful response.
    ///
    /// On a non-success status the (error) body is drained, up to a limit, and
    /// classified before any record is decoded.
    pub async fn into_success(self) -> Result<ByteStream> {
        if self.is_success() {
            return Ok(self.body);
        }

        let mut body = self.body;
        let mut buffer = BytesMut::new();
        let mut read_fault = None;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    if buffer.len() >= MAX_ERROR_BODY {
                        break;
                    }
                }
                Err(err) => {
                    read_fault = Some(err);
                    break;
                }
            }
        }

        let body = (!buffer.is_empty()).then_some(&buffer[..]);
        let classified = classify_response(self.status, body);
        Err(match read_fault {
            // The status decides the variant. The broken read stays attached.
            Some(fault) => classified.with_source(fault),
            None => classified,
        })
    }
}
