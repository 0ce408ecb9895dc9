//! Client configuration.

use std::fmt;
use std::time::Duration;

/// Production endpoint, including the API version prefix.
pub const DEFAULT_BASE_URL: &str = "https://api.sendpatch.com/v1";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Client identifier sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("sendpatch-rust/", env!("CARGO_PKG_VERSION"));

/// Immutable settings shared by every request a [`Client`](crate::Client) makes.
///
/// Built through [`ClientBuilder`](crate::ClientBuilder); there is no way to
/// change a field once the client exists.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

impl ClientConfig {
    /// The bearer token sent in `Authorization`.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The timeout applied when a call does not override it.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Strips a single trailing slash.
pub(crate) fn normalize_base_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Joins `base` and `path` with exactly one slash, dropping one leading slash
/// from `path`.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", base, path)
}
