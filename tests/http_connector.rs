//! HTTP connector and outbound client tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use route_dispatch::client::HttpClient;
use route_dispatch::config::parse_config;
use route_dispatch::exchange::{self, Exchange};
use route_dispatch::handler::Handler;
use route_dispatch::http::X_REQUEST_ID;
use route_dispatch::{Dispatcher, HttpServer};

mod common;

fn app_for(config_text: &str) -> axum::Router {
    let config = parse_config(config_text).unwrap();
    let dispatcher = Arc::new(Dispatcher::build(&config).unwrap());
    HttpServer::new(&config.server, dispatcher).app()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const ROUTES: &str = r#"
[[routes]]
name = "users"
template = "/users/{username}"
target = { type = "echo" }

[[routes]]
name = "moved"
template = "/moved/{page}"
target = { type = "redirect", target = "/pages/{page}", mode = "see_other" }
"#;

#[tokio::test]
async fn test_echo_with_bound_variables() {
    let app = app_for(ROUTES);
    let response = app
        .oneshot(Request::builder().uri("/users/alice").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(json["attributes"]["username"], "alice");
    assert_eq!(json["method"], "GET");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = app_for(ROUTES);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/users/bob")
                .header(X_REQUEST_ID, "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[X_REQUEST_ID], "req-123");
    let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(json["attributes"]["request_id"], "req-123");
}

#[tokio::test]
async fn test_unmatched_is_404() {
    let app = app_for(ROUTES);
    let response = app
        .oneshot(Request::builder().uri("/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redirect_sets_location() {
    let app = app_for(ROUTES);
    let response = app
        .oneshot(Request::builder().uri("/moved/intro").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/pages/intro");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_client_round_trip() {
    let addr = common::start_mock_backend("upstream says hi").await;
    let client = HttpClient::new("upstream", tokio::runtime::Handle::current(), Duration::from_secs(5));

    let mut ex = Exchange::new(exchange::Request::get(format!("http://{}/hello", addr)));
    let ex = tokio::task::spawn_blocking(move || {
        client.respond(&mut ex).unwrap();
        ex
    })
    .await
    .unwrap();

    assert_eq!(ex.response.status(), StatusCode::OK);
    assert_eq!(common::body(&ex), "upstream says hi");
    assert_eq!(ex.response.attributes().get_str("content-type"), Some("text/plain"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_client_connection_refused_is_fault() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpClient::new("upstream", tokio::runtime::Handle::current(), Duration::from_secs(5));
    let mut ex = Exchange::new(exchange::Request::get(format!("http://{}/", addr)));
    let err = tokio::task::spawn_blocking(move || client.respond(&mut ex).unwrap_err())
        .await
        .unwrap();
    assert!(err.is_handler_fault());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_outbound_redirect_through_connector() {
    let addr = common::start_programmable_backend(|| async { (200, "proxied".to_string()) }).await;

    let app = app_for(&format!(
        r#"
        [[clients]]
        type = "http"
        name = "upstream"
        timeout_secs = 5

        [[routes]]
        name = "proxy"
        template = "/proxy{{rest:all}}"
        target = {{ type = "redirect", target = "http://{}{{rest}}", mode = "server_outbound" }}
        "#,
        addr
    ));

    let response = app
        .oneshot(Request::builder().uri("/proxy/some/page").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, "proxied");
}

#[tokio::test]
async fn test_outbound_without_matching_client_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(&format!(
        r#"
        [[clients]]
        type = "file"
        name = "files"
        root = "{}"

        [[routes]]
        name = "ftp"
        template = "/ftp{{rest:all}}"
        target = {{ type = "redirect", target = "ftp://mirror{{rest}}", mode = "server_outbound" }}
        "#,
        dir.path().display().to_string().replace('\\', "/")
    ));

    let response = app
        .oneshot(Request::builder().uri("/ftp/pub/file").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
