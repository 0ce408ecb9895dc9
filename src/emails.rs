//! The `emails` resource: sending transactional email.

use crate::{options::RequestOptions, Client, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

const EMAILS_PATH: &str = "/emails";
const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// One address or several, serialized as a JSON string or array respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    /// A single address.
    One(String),
    /// Several addresses.
    Many(Vec<String>),
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_string())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Recipients::One(address)
    }
}

impl<S: Into<String>> From<Vec<S>> for Recipients {
    fn from(addresses: Vec<S>) -> Self {
        Recipients::Many(addresses.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Recipients {
    fn from(addresses: [S; N]) -> Self {
        Recipients::Many(addresses.into_iter().map(Into::into).collect())
    }
}

/// A file attached to an email.
///
/// Provide either base64 `content` or a remote `path`, not both. The API
/// enforces this; the client does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// The filename shown to recipients.
    pub filename: String,
    /// Base64-encoded file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// URL of a remote file for the API to fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// MIME type, e.g. `application/pdf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content-ID for inline images, e.g. `cid:logo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

impl Attachment {
    /// An attachment carrying base64-encoded content.
    pub fn from_content(filename: impl Into<String>, base64_content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: Some(base64_content.into()),
            path: None,
            content_type: None,
            content_id: None,
        }
    }

    /// An attachment the API downloads from `url`.
    pub fn from_path(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: None,
            path: Some(url.into()),
            content_type: None,
            content_id: None,
        }
    }

    /// Sets the MIME type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the Content-ID used to reference the attachment inline.
    pub fn content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }
}

/// The body of `POST /emails`.
///
/// At least one of `text` or `html` is expected by the API; this is not
/// checked locally.
///
/// # Examples
///
/// ```
/// use sendpatch::{Attachment, SendEmailRequest};
///
/// let request = SendEmailRequest::new(
///     "Acme <hello@acme.test>",
///     ["ana@example.com", "bo@example.com"],
///     "Your invoice",
/// )
/// .html("<p>Invoice attached.</p>")
/// .reply_to("billing@acme.test")
/// .attachment(Attachment::from_path("invoice.pdf", "https://files.acme.test/inv.pdf"));
///
/// let json = serde_json::to_value(&request).unwrap();
/// assert_eq!(json["to"][1], "bo@example.com");
/// assert!(json.get("text").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailRequest {
    /// Sender, e.g. `"Name <name@example.com>"` or `"name@example.com"`.
    pub from: String,
    /// Recipient address(es).
    pub to: Recipients,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// HTML body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// CC recipients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Recipients>,
    /// BCC recipients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Recipients>,
    /// Reply-to address(es).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Recipients>,
    /// ISO 8601 time for scheduled delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    /// Custom email headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// File attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl SendEmailRequest {
    /// A request with the required fields set and nothing else.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<Recipients>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text: None,
            html: None,
            cc: None,
            bcc: None,
            reply_to: None,
            scheduled_at: None,
            headers: None,
            attachments: None,
        }
    }

    /// Sets the plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the CC recipients.
    pub fn cc(mut self, cc: impl Into<Recipients>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    /// Sets the BCC recipients.
    pub fn bcc(mut self, bcc: impl Into<Recipients>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    /// Sets the reply-to address(es).
    pub fn reply_to(mut self, reply_to: impl Into<Recipients>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Schedules delivery; `at` is passed through as an ISO 8601 string.
    pub fn scheduled_at(mut self, at: impl Into<String>) -> Self {
        self.scheduled_at = Some(at.into());
        self
    }

    /// Adds a custom email header. A repeated name replaces the earlier value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Appends an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments
            .get_or_insert_with(Vec::new)
            .push(attachment);
        self
    }
}

/// What the API returns for an accepted email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailResponse {
    /// Server-assigned identifier of the message.
    pub message_uuid: String,
    /// Delivery status, `"queued"` right after sending.
    pub status: String,
}

/// Sends email through a shared [`Client`].
///
/// Obtained from [`SendPatch::emails`](crate::SendPatch::emails) or built
/// directly with [`Emails::new`].
///
/// # Idempotency keys
///
/// [`Emails::with_idempotency_key`] stores a key that the next [`Emails::send`]
/// attaches as `Idempotency-Key`. The key is cleared when that send starts,
/// whatever its outcome, and setting it twice keeps only the last value. When
/// one `Emails` is shared by concurrent tasks, a send uses whichever key was
/// stored when it started; use [`Emails::send_with_idempotency_key`] to bind a
/// key to a single call instead.
pub struct Emails {
    client: Client,
    idempotency_key: Mutex<Option<String>>,
}

impl Emails {
    /// Creates the resource on top of `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            idempotency_key: Mutex::new(None),
        }
    }

    /// Stores `key` for the next [`Emails::send`] call.
    ///
    /// ```no_run
    /// # async fn example(sendpatch: sendpatch::SendPatch) -> Result<(), sendpatch::Error> {
    /// use sendpatch::SendEmailRequest;
    ///
    /// let request = SendEmailRequest::new("a@acme.test", "b@example.com", "Hi").text("Hello");
    /// let sent = sendpatch
    ///     .emails()
    ///     .with_idempotency_key("order-1234-receipt")
    ///     .send(&request)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_idempotency_key(&self, key: impl Into<String>) -> &Self {
        *self.lock_key() = Some(key.into());
        self
    }

    /// Sends an email and returns the queued message.
    ///
    /// # Errors
    ///
    /// Any error from [`Client::post_with_options`], or [`Error::Envelope`] if
    /// the response does not contain `data.message`.
    ///
    /// The stored idempotency key is taken when `send` is called, not when the
    /// returned future is first polled. It belongs to this call even if the
    /// future is awaited after a later send, or dropped without being awaited.
    pub fn send<'a>(
        &'a self,
        request: &'a SendEmailRequest,
    ) -> impl Future<Output = Result<SendEmailResponse>> + 'a {
        let key = self.lock_key().take();
        self.dispatch(request, key)
    }

    /// Sends an email with `key` as its idempotency key.
    ///
    /// Unlike [`Emails::with_idempotency_key`], the key only ever applies to
    /// this call and any stored key is left untouched.
    pub async fn send_with_idempotency_key(
        &self,
        request: &SendEmailRequest,
        key: impl Into<String>,
    ) -> Result<SendEmailResponse> {
        self.dispatch(request, Some(key.into())).await
    }

    async fn dispatch(
        &self,
        request: &SendEmailRequest,
        idempotency_key: Option<String>,
    ) -> Result<SendEmailResponse> {
        let mut options = RequestOptions::new();
        if let Some(key) = idempotency_key.filter(|key| !key.is_empty()) {
            options = options.with_header(IDEMPOTENCY_KEY_HEADER, &key)?;
        }

        let envelope: Value = self
            .client
            .post_with_options(EMAILS_PATH, request, options)
            .await?;

        unwrap_envelope(envelope)
    }

    fn lock_key(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.idempotency_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extracts `data.message` from `{status, message, data: {message}}`.
fn unwrap_envelope(mut envelope: Value) -> Result<SendEmailResponse> {
    let message = envelope
        .pointer_mut("/data/message")
        .map(Value::take)
        .ok_or_else(|| Error::Envelope("missing `data.message`".to_string()))?;

    serde_json::from_value(message)
        .map_err(|e| Error::Envelope(format!("invalid `data.message`: {}", e)))
}
