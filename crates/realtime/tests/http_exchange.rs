//! Credential and signaling requests against a mock backend.

use reqwest::Url;
use serde_json::json;
use walkthrough_realtime::{
    ConnectError, Credential, CredentialError, CredentialSource, HttpCredentialExchange,
    HttpSignaling, NegotiationError, SessionDescription, Signaling,
};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_credential_issued_for_lesson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .and(body_json(json!({ "slug": "binary-search" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "ek_abc123",
            "expires_at": 1_760_000_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let exchange = HttpCredentialExchange::new(endpoint(&server, "/api/session"));
    let credential = exchange.issue("binary-search").await.unwrap();

    assert_eq!(credential.token(), "ek_abc123");
    assert_eq!(credential.lesson_id, "binary-search");
    assert_eq!(credential.expires_at.map(|t| t.timestamp()), Some(1_760_000_000));
}

#[tokio::test]
async fn test_backend_error_message_reaches_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": "OPENAI_API_KEY not configured" })),
        )
        .mount(&server)
        .await;

    let exchange = HttpCredentialExchange::new(endpoint(&server, "/api/session"));
    let err = exchange.issue("binary-search").await.unwrap_err();

    assert!(matches!(err, CredentialError::Rejected { status: 500, .. }));
    assert_eq!(ConnectError::from(err).user_message(), "OPENAI_API_KEY not configured");
}

#[tokio::test]
async fn test_backend_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let exchange = HttpCredentialExchange::new(endpoint(&server, "/api/session"));
    let err = exchange.issue("binary-search").await.unwrap_err();

    assert_eq!(ConnectError::from(err).user_message(), "Failed to get session token");
}

#[tokio::test]
async fn test_offer_is_posted_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime"))
        .and(query_param("model", "gpt-4o-realtime-preview"))
        .and(header("authorization", "Bearer ek_abc123"))
        .and(header("content-type", "application/sdp"))
        .and(body_string("v=0\r\ns=local\r\n"))
        .respond_with(ResponseTemplate::new(201).set_body_string("v=0\r\ns=remote\r\n"))
        .expect(1)
        .mount(&server)
        .await;

    let signaling = HttpSignaling::new(
        endpoint(&server, "/v1/realtime"),
        "gpt-4o-realtime-preview",
    );
    let answer = signaling
        .exchange(
            Credential::new("ek_abc123", None, "binary-search"),
            SessionDescription::offer("v=0\r\ns=local\r\n"),
        )
        .await
        .unwrap();

    assert_eq!(answer, SessionDescription::answer("v=0\r\ns=remote\r\n"));
}

#[tokio::test]
async fn test_rejected_offer_is_a_negotiation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid ephemeral key"))
        .mount(&server)
        .await;

    let signaling = HttpSignaling::new(
        endpoint(&server, "/v1/realtime"),
        "gpt-4o-realtime-preview",
    );
    let err = signaling
        .exchange(
            Credential::new("expired", None, "binary-search"),
            SessionDescription::offer("v=0"),
        )
        .await
        .unwrap_err();

    let NegotiationError::Rejected { status, body } = err else {
        panic!("expected a rejection");
    };
    assert_eq!(status, 401);
    assert_eq!(body, "invalid ephemeral key");
}
