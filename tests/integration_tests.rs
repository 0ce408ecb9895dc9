//! Integration tests using wiremock to simulate the SendPatch API.

use sendpatch::{
    ApiErrorKind, Client, Error, RequestOptions, SendEmailRequest, SendEmailResponse, SendPatch,
    USER_AGENT,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const API_KEY: &str = "sp_test_key";

fn client_for(server: &MockServer) -> Client {
    Client::builder(API_KEY)
        .base_url(server.uri())
        .unwrap()
        .build()
        .unwrap()
}

fn sendpatch_for(server: &MockServer) -> SendPatch {
    SendPatch::from(client_for(server))
}

fn welcome_email() -> SendEmailRequest {
    SendEmailRequest::new("hello@acme.test", "user@example.com", "Welcome!")
        .html("<p>Thanks for signing up.</p>")
}

fn queued_envelope(uuid: &str) -> Value {
    json!({
        "status": "success",
        "message": "Email queued",
        "data": { "message": { "message_uuid": uuid, "status": "queued" } },
    })
}

async fn idempotency_keys(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request: &Request| {
            request
                .headers
                .get("idempotency-key")
                .map(|value| value.to_str().unwrap().to_string())
        })
        .collect()
}

#[tokio::test]
async fn test_send_unwraps_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer sp_test_key"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", USER_AGENT))
        .and(body_json(json!({
            "from": "hello@acme.test",
            "to": "user@example.com",
            "subject": "Welcome!",
            "html": "<p>Thanks for signing up.</p>",
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(queued_envelope("x")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let sent = sendpatch.emails().send(&welcome_email()).await.unwrap();

    assert_eq!(
        sent,
        SendEmailResponse {
            message_uuid: "x".to_string(),
            status: "queued".to_string(),
        }
    );
}

#[tokio::test]
async fn test_base_url_prefix_and_trailing_slash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("v1")))
        .expect(4)
        .mount(&mock_server)
        .await;

    for base in [
        format!("{}/v1", mock_server.uri()),
        format!("{}/v1/", mock_server.uri()),
    ] {
        let client = Client::builder(API_KEY).base_url(&base).unwrap().build().unwrap();
        for route in ["/emails", "emails"] {
            let envelope: Value = client.post(route, &json!({})).await.unwrap();
            assert_eq!(envelope["data"]["message"]["message_uuid"], "v1");
        }
    }
}

#[tokio::test]
async fn test_validation_error_uses_body_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "invalid email" })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.post::<_, Value>("/emails", &json!({})).await;

    match result {
        Err(Error::Api(err)) => {
            assert_eq!(err.kind, ApiErrorKind::Validation);
            assert_eq!(err.message, "invalid email");
            assert_eq!(err.status.as_u16(), 422);
            assert_eq!(err.error_type(), Some("validation"));
            assert_eq!(err.body, Some(json!({ "message": "invalid email" })));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_error_with_unparseable_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(401).set_body_string("<html>denied</html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.post::<_, Value>("/emails", &json!({})).await;

    match result {
        Err(Error::Api(err)) => {
            assert_eq!(err.kind, ApiErrorKind::Authentication);
            assert_eq!(err.message, "Unauthorized");
            assert_eq!(err.body, None);
            assert_eq!(err.raw_response, "<html>denied</html>");
        }
        other => panic!("Expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_status_classification() {
    let mock_server = MockServer::start().await;

    let cases = [
        (403, ApiErrorKind::Permission),
        (429, ApiErrorKind::RateLimit),
        (404, ApiErrorKind::Http),
        (500, ApiErrorKind::Http),
    ];

    for (status, _) in cases {
        Mock::given(method("POST"))
            .and(path(format!("/status/{}", status)))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({ "message": "nope" })),
            )
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server);
    for (status, kind) in cases {
        let err = client
            .post::<_, Value>(&format!("/status/{}", status), &json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.api_kind(), Some(kind), "status {}", status);
        assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
        assert_eq!(err.message(), "nope");
        assert_eq!(err.body(), Some(&json!({ "message": "nope" })));
    }
}

#[tokio::test]
async fn test_generic_error_falls_back_to_reason_phrase() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server)
        .post::<_, Value>("/emails", &json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.api_kind(), Some(ApiErrorKind::Http));
    assert_eq!(err.message(), "Service Unavailable");
    assert_eq!(err.raw_response(), Some(""));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_rate_limit_error_carries_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .insert_header("x-ratelimit-remaining", "0")
                .set_body_json(json!({ "message": "slow down" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = sendpatch_for(&mock_server)
        .emails()
        .send(&welcome_email())
        .await
        .unwrap_err();

    assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimit));
    assert_eq!(err.message(), "slow down");
    let info = err.rate_limit_info().unwrap();
    assert_eq!(info.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(info.remaining, Some(0));
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(queued_envelope("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder(API_KEY)
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    let result = client.post::<_, Value>("/emails", &json!({})).await;

    assert!(matches!(result, Err(Error::Timeout)), "got {:?}", result);
    assert_eq!(result.unwrap_err().to_string(), "Request timed out");
    assert!(start.elapsed() < Duration::from_millis(450));
}

#[tokio::test]
async fn test_per_call_timeout_override() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder(API_KEY)
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let value: Value = client
        .post_with_options(
            "/emails",
            &json!({}),
            RequestOptions::new().with_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert_eq!(value, json!({ "ok": true }));

    // The override does not stick to the client.
    let result = client.post::<_, Value>("/emails", &json!({})).await;
    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn test_caller_headers_override_defaults() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("user-agent", "my-app/2.0"))
        .and(header("x-request-source", "billing"))
        .and(header("authorization", "Bearer sp_test_key"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = RequestOptions::new()
        .with_header("User-Agent", "my-app/2.0")
        .unwrap()
        .with_header("X-Request-Source", "billing")
        .unwrap();

    let _: Value = client_for(&mock_server)
        .post_with_options("emails", &json!({}), options)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_idempotency_key_applies_to_next_send_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("x")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();

    emails
        .with_idempotency_key("k")
        .send(&welcome_email())
        .await
        .unwrap();
    emails.send(&welcome_email()).await.unwrap();

    assert_eq!(
        idempotency_keys(&mock_server).await,
        vec![Some("k".to_string()), None]
    );
}

#[tokio::test]
async fn test_idempotency_key_last_write_wins() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("x")))
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    sendpatch
        .emails()
        .with_idempotency_key("a")
        .with_idempotency_key("b")
        .send(&welcome_email())
        .await
        .unwrap();

    assert_eq!(idempotency_keys(&mock_server).await, vec![Some("b".to_string())]);
}

#[tokio::test]
async fn test_idempotency_key_cleared_after_failed_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();

    assert!(emails
        .with_idempotency_key("k")
        .send(&welcome_email())
        .await
        .is_err());
    assert!(emails.send(&welcome_email()).await.is_err());

    assert_eq!(
        idempotency_keys(&mock_server).await,
        vec![Some("k".to_string()), None]
    );
}

#[tokio::test]
async fn test_idempotency_key_cleared_before_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(queued_envelope("x"))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();
    let request = welcome_email();

    // The second send starts while the first is still in flight.
    let first = emails.with_idempotency_key("k").send(&request);
    let second = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        emails.send(&request).await
    };
    let (first, second) = tokio::join!(first, second);
    first.unwrap();
    second.unwrap();

    let mut keys = idempotency_keys(&mock_server).await;
    keys.sort();
    assert_eq!(keys, vec![None, Some("k".to_string())]);
}

#[tokio::test]
async fn test_idempotency_key_bound_when_send_is_called() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("x")))
        .expect(2)
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();
    let request = welcome_email();

    let keyed = emails.with_idempotency_key("k").send(&request);
    let unkeyed = emails.send(&request);

    // Awaited in the opposite order from creation.
    unkeyed.await.unwrap();
    keyed.await.unwrap();

    assert_eq!(
        idempotency_keys(&mock_server).await,
        vec![None, Some("k".to_string())]
    );
}

#[tokio::test]
async fn test_dropped_send_still_consumes_idempotency_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("x")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();
    let request = welcome_email();

    drop(emails.with_idempotency_key("k").send(&request));
    emails.send(&request).await.unwrap();

    assert_eq!(idempotency_keys(&mock_server).await, vec![None]);
}

#[tokio::test]
async fn test_send_with_per_call_key_leaves_stored_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(queued_envelope("x")))
        .mount(&mock_server)
        .await;

    let sendpatch = sendpatch_for(&mock_server);
    let emails = sendpatch.emails();

    emails.with_idempotency_key("stored");
    emails
        .send_with_idempotency_key(&welcome_email(), "per-call")
        .await
        .unwrap();
    emails.send(&welcome_email()).await.unwrap();

    assert_eq!(
        idempotency_keys(&mock_server).await,
        vec![Some("per-call".to_string()), Some("stored".to_string())]
    );
}

#[tokio::test]
async fn test_envelope_violation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .mount(&mock_server)
        .await;

    let err = sendpatch_for(&mock_server)
        .emails()
        .send(&welcome_email())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Envelope(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_success_with_unparseable_body_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let value: Value = client.post("/emails", &json!({})).await.unwrap();
    assert_eq!(value, Value::Null);

    // A typed result cannot be built from null.
    let result = client.post::<_, SendEmailResponse>("/emails", &json!({})).await;
    match result {
        Err(Error::DeserializationFailed {
            raw_response,
            status,
            ..
        }) => {
            assert_eq!(raw_response, "queued");
            assert_eq!(status.as_u16(), 200);
        }
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Reserve a port, then free it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder(API_KEY)
        .base_url(format!("http://{}", address))
        .unwrap()
        .build()
        .unwrap();

    let result = client.post::<_, Value>("/emails", &json!({})).await;
    assert!(matches!(result, Err(Error::Network(_))), "got {:?}", result);
}
