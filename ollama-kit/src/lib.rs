//! A resilient client for the Ollama HTTP API.
//!
//! Every operation either returns a typed value (or a typed [`stream::ResponseStream`])
//! or fails with exactly one classified [`Error`]. Transient failures are retried with
//! exponential backoff according to a [`RetryPolicy`]; streaming calls are only ever
//! retried while connecting, never once records have started to flow.

use std::sync::Arc;
use std::time::Duration;

use self::transport::Transport;
use self::types::Options;

pub mod builder;
pub mod client;
pub mod errors;
pub mod parser;
pub mod retry;
pub mod stream;
pub mod transport;
pub mod types;

pub use errors::{classify_response, map_fault, BoxError, Error, ErrorKind, Result};
pub use retry::{retry, RetryPolicy};

/// The entry point of the SDK. Cheap to clone; clones share the same transport
/// (and so the same connection pool).
#[derive(Clone)]
pub struct OllamaClient {
    transport: Arc<dyn Transport + Send + Sync>,
    retry_policy: RetryPolicy,
    default_options: Options,
    timeout: Option<Duration>,
}
