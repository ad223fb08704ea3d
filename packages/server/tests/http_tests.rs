//! HTTP binding driven through the router without a socket

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;
use xcap_server::http::{router, HttpState};
use xcap_server::{Config, Dispatcher};

const DOC: &str = "/xcap-root/resource-lists/users/sip:bob@example.com/index";
const IDENTITY: &str = "x-xcap-asserted-identity";
const BOB: &str = "sip:bob@example.com";

const LISTS: &str = r#"<resource-lists xmlns="urn:ietf:params:xml:ns:resource-lists"><list name="friends"><entry uri="sip:alice@example.com"/></list></resource-lists>"#;

fn app() -> Router {
    let config = Config::default();
    let dispatcher = Dispatcher::new(config.dispatcher_config().unwrap());
    let state = HttpState::new(Arc::new(dispatcher), &config.root, &config.authorization.identity_header).unwrap();
    router(Arc::new(state))
}

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header(IDENTITY, BOB)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_put_and_get_over_http() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request("PUT", DOC).body(Body::from(LISTS)).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let response = app
        .clone()
        .oneshot(request("GET", DOC).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/resource-lists+xml"
    );
    assert!(body_text(response).await.contains(r#"<list name="friends">"#));

    let response = app
        .oneshot(
            request("GET", DOC)
                .header(header::IF_NONE_MATCH, etag.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_percent_encoded_node_selector() {
    let app = app();
    app.clone()
        .oneshot(request("PUT", DOC).body(Body::from(LISTS)).unwrap())
        .await
        .unwrap();

    let uri = format!("{}/~~/resource-lists/list%5B@name=%22friends%22%5D/entry%5B2%5D", DOC);
    let response = app
        .clone()
        .oneshot(
            request("PUT", &uri)
                .body(Body::from(r#"<entry uri="sip:carol@example.com"/>"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", &uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xcap-el+xml");
    assert_eq!(body_text(response).await, r#"<entry uri="sip:carol@example.com"/>"#);
}

#[tokio::test]
async fn test_query_namespace_bindings() {
    let app = app();
    app.clone()
        .oneshot(request("PUT", DOC).body(Body::from(LISTS)).unwrap())
        .await
        .unwrap();

    let uri = format!(
        "{}/~~/rl:resource-lists/rl:list/@name?xmlns(rl=urn:ietf:params:xml:ns:resource-lists)",
        DOC
    );
    let response = app
        .oneshot(request("GET", &uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "friends");
}

#[tokio::test]
async fn test_stale_if_match_is_412() {
    let app = app();
    app.clone()
        .oneshot(request("PUT", DOC).body(Body::from(LISTS)).unwrap())
        .await
        .unwrap();

    let response = app
        .oneshot(
            request("PUT", DOC)
                .header(header::IF_MATCH, "\"stale\"")
                .body(Body::from(LISTS))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_conflict_body_is_xcap_error() {
    let app = app();
    let response = app
        .oneshot(
            request("PUT", DOC)
                .body(Body::from(r#"<resource-lists xmlns="urn:ietf:params:xml:ns:resource-lists"><bogus/></resource-lists>"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xcap-error+xml");
    assert!(body_text(response).await.contains("<schema-validation-error"));
}

#[tokio::test]
async fn test_routing_errors() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request("POST", DOC).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET, PUT, DELETE");

    let response = app
        .clone()
        .oneshot(request("GET", "/elsewhere/resource-lists").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request("GET", &format!("{}?bogus", DOC)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(DOC)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_anonymous_capabilities() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/xcap-root/xcap-caps/global/index")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ETAG).is_none());
    assert!(body_text(response).await.contains("<auid>pidf-manipulation</auid>"));
}

#[tokio::test]
async fn test_read_only_usage_advertises_get() {
    let mut config = Config::default();
    config.authorization.policy = xcap_server::config::Policy::AllowAll;
    let dispatcher = Dispatcher::new(config.dispatcher_config().unwrap());
    let state = HttpState::new(Arc::new(dispatcher), &config.root, &config.authorization.identity_header).unwrap();

    let response = router(Arc::new(state))
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/xcap-root/xcap-caps/global/index")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
}
