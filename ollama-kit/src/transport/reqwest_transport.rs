use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};

use crate::transport::Transport;
use crate::types::{HttpRequest, HttpResponse, HttpVerb, StreamingHttpResponse};
use crate::{Error, Result};

/// Connection settings for a [`ReqwestTransport`].
///
/// Each timeout is independent; `None` leaves it unbounded.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    /// Budget for establishing the TCP/TLS connection.
    pub connect_timeout: Option<Duration>,
    /// Budget for each individual read of the response body.
    pub read_timeout: Option<Duration>,
    /// Budget for the whole request, body included. Streaming calls usually leave
    /// this unset and rely on `read_timeout` instead.
    pub request_timeout: Option<Duration>,
}

impl TransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            connect_timeout: None,
            read_timeout: None,
            request_timeout: None,
        }
    }
}

/// A [`Transport`] implementation that uses the `reqwest` crate for making HTTP requests.
///
/// This is the default transport used by [`OllamaClient`](crate::OllamaClient) if no custom transport
/// is provided. The underlying connection pool is shared by every call made through it.
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ReqwestTransport {
    /// Creates a new `ReqwestTransport` with no timeouts.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the `reqwest` client cannot be built.
    pub fn new(base_url: Url, api_key: Option<String>) -> Result<Self> {
        Self::with_config(TransportConfig {
            api_key,
            ..TransportConfig::new(base_url)
        })
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url,
            api_key: config.api_key,
        })
    }

    /// Helper to build and send a reqwest request, handling common logic.
    async fn build_and_send_request(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let url = self.base_url.join(&request.url).map_err(|e| {
            Error::invalid_request(format!("Invalid request URL {}: {}", request.url, e))
                .with_source(e)
        })?;

        let mut request_builder = match request.verb {
            HttpVerb::GET => self.client.get(url),
            HttpVerb::POST => self.client.post(url),
            HttpVerb::DELETE => self.client.delete(url),
        };

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        if let Some(body) = request.body {
            request_builder = request_builder.json(&body);
        }

        if let Some(timeout) = request.timeout {
            request_builder = request_builder.timeout(timeout);
        }

        Ok(request_builder.send().await?)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    /// Sends a non-streaming HTTP request using `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns a [`Network`](Error::Network), [`Timeout`](Error::Timeout) or
    /// [`Serialization`](Error::Serialization) error if the request fails or the
    /// response cannot be read.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(url = %request.url)))]
    async fn send_http_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.build_and_send_request(request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse {
            status,
            body: (!body.is_empty()).then_some(body),
        })
    }

    /// Sends a streaming HTTP request using `reqwest` and hands back the body as a
    /// stream of chunks.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(url = %request.url)))]
    async fn send_http_stream_request(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingHttpResponse> {
        let response = self.build_and_send_request(request).await?;
        let status = response.status().as_u16();
        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(Error::from))
            .boxed();
        Ok(StreamingHttpResponse::new(status, stream))
    }
}
