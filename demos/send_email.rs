//! Sends one email, optionally with an idempotency key.
//!
//! Run with:
//! `SENDPATCH_API_KEY=sp_... cargo run --example send_email -- you@example.com [idempotency-key]`

use sendpatch::{ApiErrorKind, Error, SendEmailRequest, SendPatch};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("sendpatch=debug,send_email=info")
        .init();

    let api_key = std::env::var("SENDPATCH_API_KEY").unwrap_or_default();
    let mut args = std::env::args().skip(1);
    let to = args.next().unwrap_or_else(|| "user@example.com".to_string());
    let idempotency_key = args.next();

    let sendpatch = SendPatch::new(api_key)?;
    let from = "SendPatch Demo <demo@sendpatch.dev>";
    let request = SendEmailRequest::new(from, to, "Hello from Rust")
        .text("This message was sent with the sendpatch crate.")
        .html("<p>This message was sent with the <code>sendpatch</code> crate.</p>");

    let emails = sendpatch.emails();
    if let Some(key) = idempotency_key {
        emails.with_idempotency_key(key);
    }

    match emails.send(&request).await {
        Ok(sent) => {
            println!("Queued message {} (status: {})", sent.message_uuid, sent.status);
            Ok(())
        }
        Err(Error::Api(err)) if err.kind == ApiErrorKind::Validation => {
            eprintln!("The API rejected the email: {}", err.message);
            if let Some(body) = &err.body {
                eprintln!("  details: {}", body);
            }
            Err(err.into())
        }
        Err(Error::Api(err)) if err.kind == ApiErrorKind::RateLimit => {
            let wait = err.rate_limit.as_ref().and_then(|info| info.retry_after);
            eprintln!("Rate limited; server suggests waiting {:?}", wait);
            Err(err.into())
        }
        Err(e) => {
            eprintln!("Send failed: {} (retryable: {})", e, e.is_retryable());
            Err(e)
        }
    }
}
