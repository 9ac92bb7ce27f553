//! Authenticated execution against a live mock API

use super::*;
use carrier_auth::{CarrierError, Grant, HttpRequest, RequestContext};
use wiremock::matchers::{header, header_exists};

const TRACK: &str = "/api/track/v1/details/1Z999AA10123456784";

#[tokio::test]
async fn test_headers_injected() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path(TRACK))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("transactionSrc", SOURCE_TAG))
        .and(header_exists("transId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trackResponse": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send(&Grant::ClientCredentials, None, HttpRequest::get(api_url(&server, TRACK)))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.correlation_id.len(), 32);
}

#[tokio::test]
async fn test_throttled_then_success_keeps_correlation_id() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path(TRACK))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TRACK))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = client(&server);
    let context = RequestContext::new(SOURCE_TAG);
    let response = client
        .send(
            &Grant::ClientCredentials,
            Some(context.clone()),
            HttpRequest::get(api_url(&server, TRACK)),
        )
        .await
        .unwrap();
    assert_eq!(response.attempts, 4);

    let requests = server.received_requests().await.unwrap();
    let ids: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == TRACK)
        .map(|r| r.headers.get("transId").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| id == context.correlation_id()));
    assert_eq!(client.retry_stats().retries, 3);
}

#[tokio::test]
async fn test_server_errors_exhaust_budget() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path(TRACK))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4)
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&Grant::ClientCredentials, None, HttpRequest::get(api_url(&server, TRACK)))
        .await
        .unwrap_err();

    match err {
        CarrierError::RetryExhausted { status, body, attempts, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(body.as_deref(), Some("maintenance"));
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_triggers_one_token_refetch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("stale")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_token(&server, "fresh").await;

    Mock::given(method("GET"))
        .and(path(TRACK))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(TRACK))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let response = client
        .send(&Grant::ClientCredentials, None, HttpRequest::get(api_url(&server, TRACK)))
        .await
        .unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(client.retry_stats().reauthentications, 1);
}

#[tokio::test]
async fn test_bad_request_surfaces_downstream_errors() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/api/addressvalidation/v2/1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "response": {"errors": [{"code": "250002", "message": "Invalid Authentication Information."}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .send(
            &Grant::ClientCredentials,
            None,
            HttpRequest::post(api_url(&server, "/api/addressvalidation/v2/1")).json(&json!({})),
        )
        .await
        .unwrap_err();

    match err {
        CarrierError::Client(failure) => {
            assert_eq!(failure.status, 400);
            assert_eq!(failure.errors[0].code, "250002");
            assert_eq!(failure.correlation_id.len(), 32);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
