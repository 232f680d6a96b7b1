use std::{collections::BTreeMap, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Everything the server saw of a request, returned by the `/echo` routes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_len: usize,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route("/json", get(json_object))
        .route("/scalar", get(scalar))
        .route("/text", get(text))
        .route("/bytes/{n}", get(bytes))
        .route("/delay/{ms}", get(delay))
        .route("/headers", get(custom_headers))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
        body_len: body.len(),
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn json_object() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "a": 1, "nested": { "list": [1, 2, 3] } }))
}

async fn scalar() -> Json<serde_json::Value> {
    Json(serde_json::json!(42))
}

async fn text() -> &'static str {
    "not json"
}

async fn bytes(Path(n): Path<usize>) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

async fn delay(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {ms}")
}

async fn custom_headers() -> impl IntoResponse {
    (
        [
            ("x-request-trace", "  abc123  "),
            ("cache-control", "no-store"),
        ],
        "with headers",
    )
}
