//! The classified error taxonomy shared by every layer of the client.
//!
//! Faults are classified exactly once, as close to their origin as possible:
//! non-success HTTP responses go through [`classify_response`], low-level transport
//! faults go through [`map_fault`] (or the equivalent `From` conversions). Once an
//! [`Error`] exists it is only ever passed through, never re-classified.

use std::error::Error as StdError;
use std::io;

use serde::Deserialize;
use thiserror::Error;

/// A boxed, thread-safe error used as the wrapped cause of an [`Error`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

const MISSING_BODY_MESSAGE: &str = "no error message returned by server";
const UNKNOWN_RESOURCE: &str = "unknown resource";
const UNSUPPORTED_MARKER: &str = "does not support";

/// Every failure surfaced by the client is exactly one of these variants.
///
/// Callers are expected to match on the variant (or on [`Error::kind`]) rather than
/// on raw status codes.
#[derive(Error, Debug)]
pub enum Error {
    /// The server could not be reached, or the connection broke mid-request.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A connect, read or total-request timeout elapsed.
    #[error("Request timed out: {message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A body or stream line could not be encoded or decoded.
    ///
    /// `line` holds the offending raw payload when one is available.
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        line: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// The request was rejected before or by the server as malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The requested resource (usually a model) does not exist.
    #[error("Not found: {resource} ({message})")]
    NotFound {
        resource: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The model or server does not support the requested operation.
    #[error("Unsupported operation: {reason}")]
    Unsupported {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A fault nothing else recognised.
    #[error("Unknown error: {message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// A payload-free view of [`Error`], handy for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Serialization,
    InvalidRequest,
    NotFound,
    Unsupported,
    Http,
    Unknown,
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
            source: None,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
            line: None,
            source: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Error::Unsupported {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
            source: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`Error::Serialization`] for a payload that failed to decode,
    /// keeping the raw payload for diagnostics.
    pub fn decode_failure(err: serde_json::Error, raw: &[u8]) -> Self {
        Error::Serialization {
            message: err.to_string(),
            line: Some(String::from_utf8_lossy(raw).into_owned()),
            source: Some(Box::new(err)),
        }
    }

    /// Attaches a wrapped cause, replacing any previous one.
    pub fn with_source(mut self, cause: impl Into<BoxError>) -> Self {
        let cause = Some(cause.into());
        match &mut self {
            Error::Network { source, .. }
            | Error::Timeout { source, .. }
            | Error::Serialization { source, .. }
            | Error::InvalidRequest { source, .. }
            | Error::NotFound { source, .. }
            | Error::Unsupported { source, .. }
            | Error::Http { source, .. }
            | Error::Unknown { source, .. } => *source = cause,
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Serialization { .. } => ErrorKind::Serialization,
            Error::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Http { .. } => ErrorKind::Http,
            Error::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The human-readable message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Network { message, .. }
            | Error::Timeout { message, .. }
            | Error::Serialization { message, .. }
            | Error::InvalidRequest { message, .. }
            | Error::NotFound { message, .. }
            | Error::Http { message, .. }
            | Error::Unknown { message, .. } => message,
            Error::Unsupported { reason, .. } => reason,
        }
    }

    /// Permanent errors are never retried: repeating the call cannot change the outcome.
    pub fn is_permanent(&self) -> bool {
        match self {
            Error::InvalidRequest { .. }
            | Error::NotFound { .. }
            | Error::Serialization { .. }
            | Error::Unsupported { .. } => true,
            Error::Http { status, .. } => (400..500).contains(status),
            Error::Network { .. } | Error::Timeout { .. } | Error::Unknown { .. } => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        !self.is_permanent()
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Turns a non-success HTTP response into exactly one [`Error`].
///
/// The body may be a `{"error": "..."}` envelope, plain text, or absent. A message
/// containing "does not support" (any case) always yields [`Error::Unsupported`],
/// whatever the status. This function never fails: a status it has no rule for
/// degrades to [`Error::Unknown`] with the message kept.
pub fn classify_response(status: u16, body: Option<&[u8]>) -> Error {
    let message = resolve_message(body);

    if mentions_unsupported(&message) {
        return Error::unsupported(message);
    }

    match status {
        404 => {
            let resource = extract_resource_name(body, &message);
            Error::not_found(resource, message)
        }
        400 => Error::invalid_request(message),
        200..=299 => Error::unknown(message),
        _ => Error::http(status, message),
    }
}

/// Classifies an error reported in-band, e.g. an `{"error": ...}` line in a stream.
pub(crate) fn classify_message(message: impl Into<String>) -> Error {
    let message = message.into();
    if mentions_unsupported(&message) {
        Error::unsupported(message)
    } else {
        Error::unknown(message)
    }
}

fn resolve_message(body: Option<&[u8]>) -> String {
    let Some(body) = body.filter(|b| !b.iter().all(u8::is_ascii_whitespace)) else {
        return MISSING_BODY_MESSAGE.to_string();
    };

    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.trim().is_empty() => envelope.error,
        Ok(_) => MISSING_BODY_MESSAGE.to_string(),
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn mentions_unsupported(message: &str) -> bool {
    message.to_lowercase().contains(UNSUPPORTED_MARKER)
}

/// Best-effort extraction of the missing resource's name from a 404 response.
fn extract_resource_name(body: Option<&[u8]>, message: &str) -> String {
    if let Some(value) = body.and_then(|b| serde_json::from_slice::<serde_json::Value>(b).ok()) {
        for field in ["model", "name"] {
            if let Some(name) = value.get(field).and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    if let Some(name) = first_quoted(message) {
        return name.to_string();
    }

    // Only the `model <name> not found` shape names the resource.
    let words: Vec<&str> = message.split_whitespace().collect();
    for window in words.windows(4) {
        if let [model, name, not, found] = window {
            let found = found.trim_end_matches(|c: char| matches!(c, ',' | '.' | ':' | ';'));
            if model.eq_ignore_ascii_case("model")
                && not.eq_ignore_ascii_case("not")
                && found.eq_ignore_ascii_case("found")
            {
                let name = name.trim_matches(|c: char| matches!(c, ',' | '.' | ':' | ';'));
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    UNKNOWN_RESOURCE.to_string()
}

fn first_quoted(message: &str) -> Option<&str> {
    let (start, quote) = message.char_indices().find(|(_, c)| *c == '"' || *c == '\'')?;
    let rest = &message[start + 1..];
    let end = rest.find(quote)?;
    Some(&rest[..end]).filter(|s| !s.is_empty())
}

/// Maps an arbitrary low-level fault into the taxonomy.
///
/// An already classified [`Error`] passes through unchanged.
pub fn map_fault(fault: BoxError) -> Error {
    let fault = match fault.downcast::<Error>() {
        Ok(err) => return *err,
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<reqwest::Error>() {
        Ok(err) => return Error::from(*err),
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<serde_json::Error>() {
        Ok(err) => return Error::from(*err),
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<io::Error>() {
        Ok(err) => return Error::from(*err),
        Err(fault) => fault,
    };
    let fault = match fault.downcast::<tokio::time::error::Elapsed>() {
        Ok(err) => return Error::timeout(err.to_string()).with_source(err),
        Err(fault) => fault,
    };

    Error::Unknown {
        message: fault.to_string(),
        source: Some(fault),
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();

        let classified = if err.is_timeout() {
            Error::timeout(message)
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                // The URL names the endpoint, not the missing model.
                404 => Error::not_found(UNKNOWN_RESOURCE, message),
                400..=499 => Error::invalid_request(message),
                code => Error::http(code, message),
            }
        } else if err.is_decode() {
            Error::serialization(message)
        } else if err.is_builder() {
            Error::invalid_request(message)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Error::network(message)
        } else {
            Error::unknown(message)
        };

        classified.with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string()).with_source(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind as Kind;

        let message = err.to_string();
        let classified = match err.kind() {
            Kind::TimedOut => Error::timeout(message),
            Kind::ConnectionRefused
            | Kind::ConnectionReset
            | Kind::ConnectionAborted
            | Kind::NotConnected
            | Kind::BrokenPipe
            | Kind::AddrInUse
            | Kind::AddrNotAvailable
            | Kind::UnexpectedEof => Error::network(message),
            Kind::InvalidData => Error::serialization(message),
            _ => Error::unknown(message),
        };
        classified.with_source(err)
    }
}
