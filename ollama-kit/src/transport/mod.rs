use async_trait::async_trait;

use crate::types::{HttpRequest, HttpResponse, StreamingHttpResponse};
use crate::Result;

mod mock_transport;
mod reqwest_transport;

pub use mock_transport::MockTransport;
pub use reqwest_transport::{ReqwestTransport, TransportConfig};

/// The raw HTTP layer under [`OllamaClient`](crate::OllamaClient).
///
/// Implementations report non-success statuses as ordinary responses; the client
/// classifies them. Faults below HTTP (connection, timeout, body read) must already be
/// mapped into [`Error`](crate::Error).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and buffers the whole response body.
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Sends a request and returns as soon as the status is known, leaving the body
    /// to be read incrementally.
    async fn send_http_stream_request(&self, request: HttpRequest)
        -> Result<StreamingHttpResponse>;
}
