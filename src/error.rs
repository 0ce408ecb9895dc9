//! Error types for SendPatch API calls.
//!
//! Every failed call produces exactly one [`Error`]. Responses with a non-2xx
//! status become [`Error::Api`], whose [`ApiError`] payload is shared by every
//! HTTP-originated failure and tagged with an [`ApiErrorKind`] picked from the
//! exact status code.

use crate::rate_limit::RateLimitInfo;
use http::StatusCode;
use serde_json::Value;
use std::fmt;

/// The main error type for SendPatch API calls.
///
/// # Examples
///
/// ```no_run
/// use sendpatch::{ApiErrorKind, Error, SendEmailRequest, SendPatch};
///
/// # async fn example() -> Result<(), Error> {
/// let sendpatch = SendPatch::new("sp_live_key")?;
/// let request = SendEmailRequest::new("hello@example.com", "user@example.com", "Hi")
///     .text("Hello there");
///
/// match sendpatch.emails().send(&request).await {
///     Ok(sent) => println!("Queued {}", sent.message_uuid),
///     Err(Error::Api(err)) if err.kind == ApiErrorKind::Validation => {
///         eprintln!("Rejected: {}", err.message);
///     }
///     Err(Error::Timeout) => eprintln!("Gave up waiting"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS lookup failed, TLS, etc.).
    ///
    /// The underlying `reqwest::Error` is passed through untouched.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request did not complete within the effective timeout.
    ///
    /// The in-flight request is cancelled; a late response is never processed.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A 2xx body could not be deserialized into the requested type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A successful response was not wrapped in the expected `{data: {message}}` envelope.
    #[error("Unexpected response envelope: {0}")]
    Envelope(String),

    /// Invalid configuration was provided, such as an empty API key or an
    /// invalid header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided or produced.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Which kind of HTTP failure an [`ApiError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 401: the API key is missing or invalid.
    Authentication,
    /// 403: the API key may not perform this operation.
    Permission,
    /// 422: the request payload was rejected.
    Validation,
    /// 429: too many requests.
    RateLimit,
    /// Any other non-2xx status.
    Http,
}

impl ApiErrorKind {
    /// Classifies a failing status by its exact code.
    ///
    /// ```
    /// use http::StatusCode;
    /// use sendpatch::ApiErrorKind;
    ///
    /// assert_eq!(
    ///     ApiErrorKind::from_status(StatusCode::UNPROCESSABLE_ENTITY),
    ///     ApiErrorKind::Validation
    /// );
    /// assert_eq!(
    ///     ApiErrorKind::from_status(StatusCode::BAD_GATEWAY),
    ///     ApiErrorKind::Http
    /// );
    /// ```
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => ApiErrorKind::Authentication,
            403 => ApiErrorKind::Permission,
            422 => ApiErrorKind::Validation,
            429 => ApiErrorKind::RateLimit,
            _ => ApiErrorKind::Http,
        }
    }

    /// The fixed category tag some kinds carry. Only validation errors have one.
    pub fn error_type(&self) -> Option<&'static str> {
        match self {
            ApiErrorKind::Validation => Some("validation"),
            _ => None,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Authentication => "Authentication",
            ApiErrorKind::Permission => "Permission",
            ApiErrorKind::Validation => "Validation",
            ApiErrorKind::RateLimit => "Rate limit",
            ApiErrorKind::Http => "HTTP",
        };
        f.write_str(name)
    }
}

/// The shared payload of every HTTP-originated failure.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{kind} error ({status}): {message}")]
pub struct ApiError {
    /// The classification derived from `status`.
    pub kind: ApiErrorKind,
    /// The body's `message` field, or the status's reason phrase when absent.
    pub message: String,
    /// The HTTP status code
    pub status: StatusCode,
    /// The response body parsed as JSON, `None` when it was not valid JSON.
    pub body: Option<Value>,
    /// The raw response body
    pub raw_response: String,
    /// Rate limit headers, parsed for 429 responses only.
    pub rate_limit: Option<RateLimitInfo>,
}

impl ApiError {
    /// Builds the error for a failing response.
    ///
    /// The message comes from the parsed body's `message` string when present,
    /// otherwise from the canonical reason phrase of `status`.
    pub fn from_response(
        status: StatusCode,
        body: Option<Value>,
        raw_response: String,
        rate_limit: Option<RateLimitInfo>,
    ) -> Self {
        let message = body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_owned());

        let kind = ApiErrorKind::from_status(status);
        let rate_limit = match kind {
            ApiErrorKind::RateLimit => rate_limit,
            _ => None,
        };

        Self {
            kind,
            message,
            status,
            body,
            raw_response,
            rate_limit,
        }
    }

    /// See [`ApiErrorKind::error_type`].
    pub fn error_type(&self) -> Option<&'static str> {
        self.kind.error_type()
    }
}

impl Error {
    /// Returns `true` if a caller could reasonably retry the call.
    ///
    /// The client itself never retries; this is advisory. Network errors,
    /// timeouts, 429 and 5xx responses are considered retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Api(err) => {
                err.kind == ApiErrorKind::RateLimit || err.status.is_server_error()
            }
            Error::DeserializationFailed { .. }
            | Error::Envelope(_)
            | Error::ConfigurationError(_)
            | Error::SerializationFailed(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Api(err) => Some(&err.raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the JSON-parsed response body of an API error.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::Api(err) => err.body.as_ref(),
            _ => None,
        }
    }

    /// Returns the classification of an API error.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Returns the human-readable message.
    ///
    /// For API errors this is the server-provided message rather than the
    /// full `Display` rendering.
    pub fn message(&self) -> String {
        match self {
            Error::Api(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns rate limit information attached to a 429 error.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::Api(err) => err.rate_limit.as_ref(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for SendPatch API calls.
pub type Result<T> = std::result::Result<T, Error>;
