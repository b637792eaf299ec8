//! Integration tests for the API client against a real HTTP server
//!
//! Covers bearer attachment, the response cache, cache bypass and the
//! refresh-and-retry flow over `reqwest`.

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cybershield::api::{ApiClient, ApiError, Params};
use cybershield::data::{search_credentials, share, trigger_repo_check, CveForm, ShareError};
use cybershield::storage::Session;

fn client_for(server: &MockServer, session: Session) -> ApiClient {
    ApiClient::new(&format!("{}/api/v1", server.uri()), session)
}

fn signed_in(access: &str, refresh: &str) -> Session {
    let session = Session::in_memory();
    session.set_tokens(access, refresh).unwrap();
    session
}

#[tokio::test]
async fn test_get_attaches_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/alerts/"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in("tok-1", "ref-1"));
    let response = client.get("/alerts/", Params::new()).await.unwrap();

    assert_eq!(response.status, 200);
    assert!(!response.from_cache);
}

#[tokio::test]
async fn test_repeated_get_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cve/cves/"))
        .and(query_param("severity", "critical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"cve_id": "CVE-2024-1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Session::in_memory());
    let params = Params::new().with("severity", "critical");

    let first = client.get("/cve/cves/", params.clone()).await.unwrap();
    let second = client.get("/cve/cves/", params).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_no_cache_goes_to_network_and_forwards_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/alerts/stats/"))
        .and(query_param("noCache", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 3})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, Session::in_memory());
    for _ in 0..2 {
        let response = client
            .get("/alerts/stats/", Params::new().no_cache())
            .await
            .unwrap();
        assert!(!response.from_cache);
    }
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/threats/threat-intelligence/"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .and(body_json(json!({"refresh": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/threats/threat-intelligence/"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0, "results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in("expired", "ref-1");
    let client = client_for(&server, session.clone());

    let body: Value = client
        .get_json("/threats/threat-intelligence/", Params::new())
        .await
        .unwrap();

    assert_eq!(body["count"], 0);
    assert_eq!(session.access_token().as_deref(), Some("fresh"));
    assert_eq!(session.refresh_token().as_deref(), Some("ref-1"));
}

#[tokio::test]
async fn test_failed_refresh_clears_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/alerts/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = signed_in("expired", "revoked");
    let client = client_for(&server, session.clone());

    let err = client.get("/alerts/", Params::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed { .. }));
    assert!(session.access_token().is_none());
    assert!(session.refresh_token().is_none());
}

#[tokio::test]
async fn test_login_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login/"))
        .and(body_json(json!({"email": "analyst@example.com", "password": "hunter22"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "7", "email": "analyst@example.com", "subscription_tier": "free"},
            "tokens": {"access": "a-1", "refresh": "r-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::in_memory();
    let client = client_for(&server, session.clone());
    let login = client.login("analyst@example.com", "hunter22").await.unwrap();

    assert_eq!(login.user.email, "analyst@example.com");
    assert_eq!(session.access_token().as_deref(), Some("a-1"));
    assert_eq!(session.refresh_token().as_deref(), Some("r-1"));
    assert!(!session.is_demo());
}

#[tokio::test]
async fn test_login_rejection_surfaces_field_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"email": ["Enter a valid email address."]})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Session::in_memory());
    let err = client.login("nope", "x").await.unwrap_err();

    assert!(matches!(err, ApiError::Http { status: 400, .. }));
    let message = err.field_errors().unwrap();
    assert!(message.contains("Enter a valid email address."));
}

#[tokio::test]
async fn test_share_cve_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/cve/cves/"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in("tok-1", "ref-1"));
    let form = CveForm {
        cve_id: "CVE-2024-12345".to_string(),
        title: "Parser heap overflow".to_string(),
        ..CveForm::default()
    };

    let created = share(&client, &form).await.unwrap();
    assert_eq!(created["id"], 42);

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["cve_id"], "CVE-2024-12345");
}

#[tokio::test]
async fn test_share_server_error_keeps_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/cve/cves/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, Session::in_memory());
    let form = CveForm {
        cve_id: "CVE-2024-1".to_string(),
        title: "x".to_string(),
        ..CveForm::default()
    };

    let err = share(&client, &form).await.unwrap_err();
    assert!(matches!(err, ShareError::Api(_)));
    assert_eq!(err.user_message("CVE"), "Failed to share CVE. Please try again.");
}

#[tokio::test]
async fn test_credential_search_picks_field_from_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/threats/leaked-credentials/search/"))
        .and(query_param("email", "jane@acme.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": [{"email": "jane@acme.com"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in("tok-1", "ref-1"));
    let rows = search_credentials(&client, "jane@acme.com").await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"], "jane@acme.com");
}

#[tokio::test]
async fn test_repo_check_posts_to_trigger_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/monitoring/github-repos/r-42/trigger_check/"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "queued"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, signed_in("tok-1", "ref-1"));
    trigger_repo_check(&client, "r-42").await.unwrap();
}
