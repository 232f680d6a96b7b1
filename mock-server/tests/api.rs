use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_method_path_and_query() {
    let resp = app()
        .oneshot(get("/echo/users/7?page=2&sort=asc"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/echo/users/7");
    assert_eq!(echo.query.as_deref(), Some("page=2&sort=asc"));
    assert_eq!(echo.body_len, 0);
}

#[tokio::test]
async fn echo_reports_body_and_headers() {
    let req = Request::builder()
        .method("PATCH")
        .uri("/echo")
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("x-custom", "value")
        .body("hello body".to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PATCH");
    assert_eq!(echo.body, "hello body");
    assert_eq!(echo.body_len, 10);
    assert_eq!(echo.headers["content-type"], "text/plain; charset=utf-8");
    assert_eq!(echo.headers["x-custom"], "value");
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code() {
    let resp = app().oneshot(get("/status/404")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "status 404");
}

#[tokio::test]
async fn status_accepts_any_method() {
    let req = Request::builder()
        .method("DELETE")
        .uri("/status/204")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn status_out_of_range_is_bad_request() {
    let resp = app().oneshot(get("/status/1000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- bodies ---

#[tokio::test]
async fn json_returns_object() {
    let resp = app().oneshot(get("/json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value: serde_json::Value = body_json(resp).await;
    assert_eq!(value["a"], 1);
}

#[tokio::test]
async fn text_is_not_json() {
    let resp = app().oneshot(get("/text")).await.unwrap();
    let body = body_bytes(resp).await;
    assert!(serde_json::from_slice::<serde_json::Value>(&body).is_err());
}

#[tokio::test]
async fn bytes_returns_exact_length() {
    let resp = app().oneshot(get("/bytes/4096")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.len(), 4096);
}

#[tokio::test]
async fn headers_route_sets_custom_headers() {
    let resp = app().oneshot(get("/headers")).await.unwrap();
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert!(resp.headers().contains_key("x-request-trace"));
}

#[tokio::test]
async fn delay_waits_then_answers() {
    let started = std::time::Instant::now();
    let resp = app().oneshot(get("/delay/30")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() >= std::time::Duration::from_millis(30));
    assert_eq!(body_bytes(resp).await, "slept 30");
}
