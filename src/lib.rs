//! # SendPatch - an async client for the SendPatch transactional email API
//!
//! Builds authenticated JSON requests, enforces a per-call timeout, and turns
//! error responses into a typed [`Error`]. Each call makes exactly one network
//! attempt; nothing is retried behind your back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sendpatch::{SendEmailRequest, SendPatch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sendpatch::Error> {
//!     let sendpatch = SendPatch::new("sp_live_key")?;
//!
//!     let request = SendEmailRequest::new("hello@example.com", "user@example.com", "Welcome!")
//!         .html("<p>Thanks for signing up.</p>");
//!
//!     let sent = sendpatch.emails().send(&request).await?;
//!     println!("Queued {} ({})", sent.message_uuid, sent.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The base URL and default timeout are set through [`ClientBuilder`]:
//!
//! ```no_run
//! use sendpatch::{Client, SendPatch};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), sendpatch::Error> {
//! let client = Client::builder("sp_live_key")
//!     .base_url("https://staging.sendpatch.com/v1")?
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//! let sendpatch = SendPatch::from(client);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Non-2xx responses become [`Error::Api`], tagged with an [`ApiErrorKind`]:
//!
//! | Status | Kind |
//! |--------|------|
//! | 401 | [`ApiErrorKind::Authentication`] |
//! | 403 | [`ApiErrorKind::Permission`] |
//! | 422 | [`ApiErrorKind::Validation`] |
//! | 429 | [`ApiErrorKind::RateLimit`] |
//! | other | [`ApiErrorKind::Http`] |
//!
//! Timeouts are [`Error::Timeout`]; connection failures pass through as
//! [`Error::Network`].
//!
//! ## Logging
//!
//! Requests and responses are reported through `tracing` at `debug` level and
//! timeouts at `warn`. Nothing is printed unless the application installs a
//! subscriber. API keys and request bodies are never logged.

mod client;
mod config;
mod emails;
mod error;
mod options;
pub mod rate_limit;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, USER_AGENT};
pub use emails::{Attachment, Emails, Recipients, SendEmailRequest, SendEmailResponse};
pub use error::{ApiError, ApiErrorKind, Error, Result};
pub use options::RequestOptions;
pub use rate_limit::RateLimitInfo;

/// Entry point exposing the API's resources.
///
/// Resources share one [`Client`], so its connection pool and configuration
/// are reused across them.
pub struct SendPatch {
    client: Client,
    emails: Emails,
}

impl SendPatch {
    /// Creates a facade for the production endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or not a valid header value.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::from(Client::new(api_key)?))
    }

    /// Send transactional emails.
    pub fn emails(&self) -> &Emails {
        &self.emails
    }

    /// The underlying transport client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for SendPatch {
    fn from(client: Client) -> Self {
        Self {
            emails: Emails::new(client.clone()),
            client,
        }
    }
}
