// Integration tests for `ControlPlaneClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docktail_tailscale::{ControlPlaneClient, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ControlPlaneClient) {
    let server = MockServer::start().await;
    let client = ControlPlaneClient::with_base_url(
        Url::parse(&server.uri()).unwrap(),
        "-",
        SecretString::from("tskey-api-test".to_string()),
    )
    .unwrap();
    (server, client)
}

// ── GET ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_existing_service() {
    let (server, client) = setup().await;

    let body = json!({
        "addrs": ["100.64.0.7"],
        "tags": ["tag:container"],
        "ports": ["tcp:443"]
    });

    Mock::given(method("GET"))
        .and(path("/api/v2/tailnet/-/services/svc:web"))
        .and(header("authorization", "Bearer tskey-api-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let def = client.get_service("svc:web").await.unwrap().unwrap();
    assert_eq!(def.tags, vec!["tag:container"]);
    assert_eq!(def.ports, vec!["tcp:443"]);
}

#[tokio::test]
async fn get_missing_service_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/tailnet/-/services/svc:ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.get_service("svc:ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn get_server_error_propagates() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/tailnet/-/services/svc:web"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.get_service("svc:web").await.unwrap_err();
    match err {
        Error::ControlPlane { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── PUT ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_service_sends_full_payload() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v2/tailnet/-/services/svc:web"))
        .and(header("authorization", "Bearer tskey-api-test"))
        .and(body_json(json!({
            "name": "svc:web",
            "tags": ["tag:container", "tag:web"],
            "ports": ["tcp:443"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "svc:web"})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .create_service(
            "svc:web",
            &["tag:container".to_string(), "tag:web".to_string()],
            &["tcp:443".to_string()],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn create_rejection_carries_status_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v2/tailnet/-/services/svc:web"))
        .respond_with(ResponseTemplate::new(403).set_body_string("requires owner role"))
        .mount(&server)
        .await;

    let err = client
        .create_service("svc:web", &[], &["tcp:443".to_string()])
        .await
        .unwrap_err();
    match err {
        Error::ControlPlane { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("requires owner role"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
