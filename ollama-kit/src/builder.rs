use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

use reqwest::Url;

use crate::transport::{ReqwestTransport, Transport, TransportConfig};
use crate::types::Options;
use crate::{Error, OllamaClient, Result, RetryPolicy};

/// Used when neither the builder nor `OLLAMA_HOST` provide a base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// A builder for constructing an [`OllamaClient`].
///
/// - Uses either `OLLAMA_HOST` environment variable or `http://localhost:11434`.
/// - Uses either `OLLAMA_API_KEY` environment variable or nothing.
/// - Retries transient failures with [`RetryPolicy::default`] (3 attempts, 500ms, x2).
/// - Sets no timeouts unless asked to.
/// - Uses `reqwest`-based transport by default - [`ReqwestTransport`].
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    default_options: Options,
    transport: Option<Arc<dyn Transport + Send + Sync>>,
}

impl OllamaClientBuilder {
    /// Creates a new [`OllamaClientBuilder`]. This method is called by [`OllamaClient::builder`]
    pub(crate) fn new() -> Self {
        OllamaClientBuilder {
            base_url: None,
            api_key: None,
            connect_timeout: None,
            read_timeout: None,
            request_timeout: None,
            retry_policy: RetryPolicy::default(),
            default_options: Options::default(),
            transport: None,
        }
    }

    /// Sets the base URL for the Ollama API.
    ///
    /// If not set, the builder will try to read from the `OLLAMA_HOST` environment variable,
    /// defaulting to `http://localhost:11434` if the environment variable is not found.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key for authentication with the Ollama API.
    ///
    /// If not set, the builder will try to read from the `OLLAMA_API_KEY` environment variable.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Limits how long a single read of the response body may take.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Limits the total duration of a request, including reading the whole body.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Options applied to every chat, generate and embed call. Fields set on a
    /// request take precedence.
    pub fn default_options(mut self, options: Options) -> Self {
        self.default_options = options;
        self
    }

    /// Sets a custom transport implementation for the client.
    ///
    /// This allows for using different HTTP clients or mock implementations for testing.
    /// The base URL, API key and timeouts of this builder are then ignored.
    ///
    /// For testing, you can use [`MockTransport`](crate::transport::MockTransport)
    /// or your own mock [`Transport`] implementations.
    pub fn transport(mut self, transport: Arc<dyn Transport + Send + Sync>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the [`OllamaClient`] with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::InvalidRequest`] if the base URL is invalid or if the
    /// underlying HTTP client cannot be initialised.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub fn build(self) -> Result<OllamaClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self
                    .base_url
                    .or_else(|| std::env::var("OLLAMA_HOST").ok())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                let api_key = self
                    .api_key
                    .or_else(|| std::env::var("OLLAMA_API_KEY").ok());

                let config = TransportConfig {
                    base_url: parse_host(&base_url)?,
                    api_key,
                    connect_timeout: self.connect_timeout,
                    read_timeout: self.read_timeout,
                    request_timeout: self.request_timeout,
                };
                Arc::new(ReqwestTransport::with_config(config)?)
            }
        };

        Ok(OllamaClient {
            transport,
            retry_policy: self.retry_policy,
            default_options: self.default_options,
            timeout: None,
        })
    }
}

/// Port assumed for a bare `OLLAMA_HOST` value such as `0.0.0.0`.
pub const DEFAULT_PORT: u16 = 11434;

/// Parses a base URL the way `OLLAMA_HOST` is interpreted.
///
/// Full URLs are taken as they are, so `http://example.com` keeps port 80. A bare
/// `host` or `host:port` gets the `http` scheme and, without an explicit port,
/// [`DEFAULT_PORT`].
pub fn parse_host(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.contains("://") {
        return Url::parse(raw).map_err(|e| invalid_base_url(raw, &e).with_source(e));
    }

    let mut url = Url::parse(&format!("http://{raw}"))
        .map_err(|e| invalid_base_url(raw, &e).with_source(e))?;
    if !has_explicit_port(raw) {
        url.set_port(Some(DEFAULT_PORT))
            .map_err(|_| invalid_base_url(raw, "host cannot carry a port"))?;
    }
    Ok(url)
}

fn invalid_base_url(raw: &str, reason: impl std::fmt::Display) -> Error {
    Error::invalid_request(format!("Invalid base URL {raw}: {reason}"))
}

fn has_explicit_port(raw: &str) -> bool {
    let authority = raw.split('/').next().unwrap_or(raw);
    authority
        .rsplit_once(':')
        .is_some_and(|(host, port)| {
            !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!host.contains(':') || host.ends_with(']'))
        })
}
