//! End-to-end tests for the reqwest transport against a local mockito server.

use futures::StreamExt;
use mockito::Matcher;
use plugfetch::transport::ReqwestTransport;
use plugfetch::{Client, ClientBuilder, ClientOptions, ErrorKind, RequestInit, SsePlugin};
use serde_json::{json, Value};
use std::sync::Arc;

// A pool per test: each test runs on its own runtime and mockito reuses ports.
fn fresh_transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::new(reqwest::Client::new()))
}

fn client_for(server: &mockito::ServerGuard) -> Client {
    Client::builder()
        .base_url(server.url())
        .transport(fresh_transport())
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn get_with_query_params() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"users":[{"id":1}]}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let body = client
        .get("/users", RequestInit::new().params(json!({"page": 1, "limit": 10})))
        .await
        .expect("request succeeds");

    assert_eq!(body, json!({"users": [{"id": 1}]}));
    mock.assert_async().await;
}

#[tokio::test]
async fn post_sends_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users")
        .match_header("content-type", Matcher::Regex("application/json".into()))
        .match_body(Matcher::Json(json!({"name": "ada"})))
        .with_status(201)
        .with_body(r#"{"id":7}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let created = client
        .post("/users", json!({"name": "ada"}), RequestInit::new())
        .await
        .expect("request succeeds");

    assert_eq!(created["id"], 7);
    mock.assert_async().await;
}

#[tokio::test]
async fn non_2xx_becomes_fail_request() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("no such thing")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get("/missing", RequestInit::new()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::FailRequest);
    assert_eq!(err.status, 404);
    assert_eq!(err.status_text, "Not Found");
    let response = err.response.expect("response attached");
    assert_eq!(response.text().await.unwrap(), "no such thing");
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    // nothing listens on port 9 of the loopback interface
    let client = Client::builder()
        .base_url("http://127.0.0.1:9")
        .transport(fresh_transport())
        .build()
        .expect("client builds");
    let err = client.get("/", RequestInit::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert_eq!(err.status, 599);
}

#[tokio::test]
async fn sse_body_streams_as_json_chunks() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/events")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n")
        .create_async()
        .await;

    let client = client_for(&server);
    client.use_plugin(SsePlugin::new().into_plugin());
    let request = client.get("/events", RequestInit::new());
    let values: Vec<Value> = request
        .stream()
        .expect("stream available")
        .filter_map(|c| async move { c.ok().and_then(|c| c.result.as_json().cloned()) })
        .collect()
        .await;

    assert_eq!(values, vec![json!({"n": 1}), json!({"n": 2})]);
}

#[tokio::test]
async fn yaml_options_configure_the_client() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/me")
        .match_header("x-api-key", "secret")
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let yaml = format!(
        "base_url: {}\ntimeout_ms: 5000\nheaders:\n  x-api-key: secret\n",
        server.url()
    );
    let options = ClientOptions::from_yaml_str(&yaml).expect("valid yaml");
    let client = ClientBuilder::from_options(options)
        .transport(fresh_transport())
        .build()
        .expect("client builds");

    let body = client.get("/me", RequestInit::new()).await.expect("request succeeds");
    assert_eq!(body, json!({"ok": true}));
    mock.assert_async().await;
}

#[tokio::test]
async fn credentialed_requests_keep_cookies() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/login")
        .with_status(200)
        .with_header("set-cookie", "session=abc; Path=/")
        .with_body("{}")
        .create_async()
        .await;
    let me = server
        .mock("GET", "/me")
        .match_header("cookie", "session=abc")
        .with_status(200)
        .with_body(r#"{"user":"ada"}"#)
        .create_async()
        .await;
    let anonymous = server
        .mock("GET", "/public")
        .match_header("cookie", Matcher::Missing)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let transport = ReqwestTransport::from_env().expect("transport builds");
    let client = Client::builder()
        .base_url(server.url())
        .transport(Arc::new(transport))
        .build()
        .expect("client builds");
    let credentialed = || RequestInit::new().with_credentials(true);

    client.post("/login", json!({}), credentialed()).await.expect("login");
    let body = client.get("/me", credentialed()).await.expect("cookie is sent back");
    assert_eq!(body, json!({"user": "ada"}));
    client
        .get("/public", RequestInit::new())
        .await
        .expect("no cookie without credentials");

    login.assert_async().await;
    me.assert_async().await;
    anonymous.assert_async().await;
}
