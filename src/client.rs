//! HTTP transport for the SendPatch API.
//!
//! The [`Client`] type is the single chokepoint for outbound calls: it
//! authenticates, applies the timeout, and classifies responses. Use
//! [`ClientBuilder`] to configure and create clients.

use crate::{
    config::{self, ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, USER_AGENT},
    options::RequestOptions,
    rate_limit::RateLimitInfo,
    ApiError, Error, Result,
};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client for the SendPatch API.
///
/// Cloning is cheap: clones share the same configuration and connection pool.
/// Every call makes exactly one network attempt and never retries.
///
/// # Examples
///
/// ```no_run
/// use sendpatch::Client;
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Envelope {
///     status: String,
/// }
///
/// # async fn example() -> Result<(), sendpatch::Error> {
/// let client = Client::builder("sp_live_key")
///     .base_url("https://api.sendpatch.com/v1")?
///     .timeout(Duration::from_secs(10))
///     .build()?;
///
/// let envelope: Envelope = client
///     .post("/emails", &serde_json::json!({ "from": "a@example.com" }))
///     .await?;
/// println!("{}", envelope.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ClientConfig,
    default_headers: HeaderMap,
}

impl Client {
    /// Creates a client for the production endpoint with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or not a valid header value.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(api_key).build()
    }

    /// Creates a new `ClientBuilder` for the given API key.
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Builds the absolute URL for `path`.
    ///
    /// A leading slash on `path` is optional; the result always has exactly
    /// one slash between the base URL and the path.
    ///
    /// ```
    /// # fn main() -> Result<(), sendpatch::Error> {
    /// let client = sendpatch::Client::builder("key")
    ///     .base_url("https://api.sendpatch.com/v1/")?
    ///     .build()?;
    ///
    /// assert_eq!(client.url("emails")?.as_str(), "https://api.sendpatch.com/v1/emails");
    /// assert_eq!(client.url("/emails")?.as_str(), "https://api.sendpatch.com/v1/emails");
    /// # Ok(())
    /// # }
    /// ```
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&config::join_url(&self.inner.config.base_url, path))?)
    }

    /// POSTs `payload` as JSON to `path` and returns the parsed response body.
    ///
    /// See [`Client::post_with_options`] for the full behavior.
    pub async fn post<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.post_with_options(path, payload, RequestOptions::default())
            .await
    }

    /// POSTs `payload` as JSON to `path` with per-call header and timeout
    /// overrides.
    ///
    /// A 2xx body is deserialized into `Res`; a body that is not JSON is
    /// treated as `null`. Any other status becomes [`Error::Api`], classified
    /// by exact status code.
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] if no complete response arrived within the timeout.
    /// * [`Error::Network`] for connection, DNS or TLS failures.
    /// * [`Error::Api`] for non-2xx responses.
    /// * [`Error::DeserializationFailed`] if a 2xx body does not fit `Res`.
    pub async fn post_with_options<Req, Res>(
        &self,
        path: &str,
        payload: &Req,
        options: RequestOptions,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let url = self.url(path)?;
        let body =
            serde_json::to_vec(payload).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        let headers = self.merge_headers(options.headers);
        let timeout = options.timeout.unwrap_or(self.inner.config.timeout);

        tracing::debug!(
            method = "POST",
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Executing HTTP request"
        );

        let start_time = Instant::now();
        let request = self
            .inner
            .http_client
            .post(url.clone())
            .headers(headers)
            .body(body);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            // An unreadable body is handled like an unparseable one.
            let raw_body = response.text().await.unwrap_or_default();
            Ok::<_, reqwest::Error>((status, headers, raw_body))
        };

        // Dropping the exchange on expiry cancels the in-flight request.
        let (status, headers, raw_body) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) if e.is_timeout() => return Err(Error::Timeout),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, url = %url, "Network error");
                return Err(Error::Network(e));
            }
            Err(_) => {
                tracing::warn!(
                    url = %url,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                return Err(Error::Timeout);
            }
        };

        tracing::debug!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "Received HTTP response"
        );

        parse_response(status, &headers, raw_body)
    }

    /// Applies per-call headers over the defaults. A name set by the caller
    /// replaces the default entirely; every caller value for it is sent.
    fn merge_headers(&self, overrides: HeaderMap) -> HeaderMap {
        let mut headers = self.inner.default_headers.clone();
        for name in overrides.keys() {
            headers.remove(name);
        }
        for (name, value) in &overrides {
            headers.append(name.clone(), value.clone());
        }
        headers
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Turns a received response into the caller's type or a classified error.
fn parse_response<Res>(status: StatusCode, headers: &HeaderMap, raw_body: String) -> Result<Res>
where
    Res: DeserializeOwned,
{
    let body: Option<Value> = serde_json::from_str(&raw_body).ok();

    if status.is_success() {
        return serde_json::from_value(body.unwrap_or(Value::Null)).map_err(|e| {
            tracing::debug!(
                error = %e,
                status = status.as_u16(),
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: raw_body,
                serde_error: e.to_string(),
                status,
            }
        });
    }

    let rate_limit =
        (status == StatusCode::TOO_MANY_REQUESTS).then(|| RateLimitInfo::from_headers(headers));
    let error = ApiError::from_response(status, body, raw_body, rate_limit);

    tracing::debug!(
        status = status.as_u16(),
        kind = %error.kind,
        message = %error.message,
        "API returned an error status"
    );

    Err(error.into())
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use sendpatch::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), sendpatch::Error> {
/// let client = ClientBuilder::new("sp_live_key")
///     .base_url("https://staging.sendpatch.com/v1")?
///     .timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ClientBuilder {
    /// Creates a builder with the production base URL and default timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the base URL for all requests. One trailing slash is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not `http`/`https`.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let base_url = config::normalize_base_url(url.as_ref());
        let parsed = Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::ConfigurationError(format!(
                "Unsupported base URL scheme: {}",
                parsed.scheme()
            )));
        }
        self.base_url = base_url.to_string();
        Ok(self)
    }

    /// Sets the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or not a valid header value,
    /// if the timeout is zero, or if the HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        if self.api_key.trim().is_empty() {
            return Err(Error::ConfigurationError(
                "API key is required".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::ConfigurationError(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        let mut authorization = HeaderValue::try_from(format!("Bearer {}", self.api_key))
            .map_err(|e| Error::ConfigurationError(format!("Invalid API key: {}", e)))?;
        authorization.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::AUTHORIZATION, authorization);
        default_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        default_headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                config: ClientConfig {
                    api_key: self.api_key,
                    base_url: self.base_url,
                    timeout: self.timeout,
                },
                default_headers,
            }),
        })
    }
}
