//! Per-call request options.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Overrides applied to a single [`Client::post_with_options`] call.
///
/// Headers set here are merged over the client's default headers; a header
/// with the same name replaces the default, every other default is kept.
///
/// [`Client::post_with_options`]: crate::Client::post_with_options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Additional headers for this call.
    pub headers: HeaderMap,

    /// Timeout for this call only, replacing the client's default.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options: no extra headers, the client's timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header name: {}", e))
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header value: {}", e))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Overrides the timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
