mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::body_string;
use gateway_kit::proxy::ReverseProxy;
use tower::ServiceExt;
use url::Url;
use wiremock::{
    matchers::{body_string as body_matches, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn proxy_for(server: &MockServer) -> ReverseProxy {
    ReverseProxy::new(Url::parse(&format!("{}/site", server.uri())).unwrap())
}

#[tokio::test]
async fn directory_request_serves_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/site/docs/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<h1>docs</h1>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = proxy_for(&server)
        .router()
        .oneshot(Request::builder().uri("/docs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/html");
    assert_eq!(body_string(response).await, "<h1>docs</h1>");
}

#[tokio::test]
async fn files_method_headers_and_body_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/site/upload/report.json"))
        .and(query_param("v", "2"))
        .and(header("x-trace", "abc"))
        .and(body_matches("payload"))
        .respond_with(ResponseTemplate::new(201).set_body_string("stored"))
        .expect(1)
        .mount(&server)
        .await;

    let response = proxy_for(&server)
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload/report.json?v=2")
                .header("x-trace", "abc")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "stored");
}

#[tokio::test]
async fn upstream_errors_are_hidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("<Error><Code>AccessDenied</Code><BucketName>private</BucketName></Error>"),
        )
        .mount(&server)
        .await;

    let response = proxy_for(&server)
        .router()
        .oneshot(
            Request::builder()
                .uri("/secret.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "not found");
}

#[tokio::test]
async fn unreachable_upstream_is_not_found() {
    // Nothing listens on port 1.
    let target = Url::parse("http://127.0.0.1:1/site").unwrap();

    let response = ReverseProxy::new(target)
        .router()
        .oneshot(Request::builder().uri("/a.txt").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "not found");
}
