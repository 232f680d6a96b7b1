//! Single-request execution against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every body encoding
//! and response mode through the default `ureq`-backed transport. Echo
//! routes return what the server actually received, so assertions check the
//! wire, not the prepared request.

mod common;

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_core::{
    Client, ErrorKind, JsonOptions, Multipart, RequestSpec, ResponseSink, StreamBody,
};
use mock_server::Echo;

fn echo(client: &Client, spec: &RequestSpec) -> Echo {
    let resp = client.execute_for_json(spec, JsonOptions::default());
    assert!(resp.is_success(), "echo failed: {resp:?}");
    resp.json_as::<Echo>().expect("echo payload")
}

#[test]
fn get_with_path_and_query_params() {
    let base = common::start_server();
    let client = Client::new();

    let spec = RequestSpec::get(format!("{base}/echo/users/{{id}}#section"))
        .path_param("id", "42")
        .query_params([("q", "a b"), ("page", "2")])
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.path, "/echo/users/42");
    assert_eq!(seen.query.as_deref(), Some("q=a+b&page=2"));
}

#[test]
fn default_headers_are_sent() {
    let base = common::start_server();
    let client = Client::new();

    let spec = RequestSpec::get(format!("{base}/echo"))
        .header("x-custom-thing", "1")
        .basic_auth("u", "p")
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.headers["authorization"], "Basic dTpw");
    assert_eq!(seen.headers["x-custom-thing"], "1");
    assert!(seen.headers["user-agent"].starts_with("courier/"));

    let spec = spec.to_builder().no_user_agent().build();
    let seen = echo(&client, &spec);
    assert!(!seen.headers.contains_key("user-agent"));
}

#[test]
fn json_body_round_trips() {
    let base = common::start_server();
    let client = Client::new();

    let spec = RequestSpec::post(format!("{base}/echo"))
        .json_body(&serde_json::json!({"name": "courier", "tags": [1, 2]}))
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.headers["content-type"], "application/json; charset=utf-8");
    let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(sent["name"], "courier");
}

#[test]
fn form_and_text_bodies() {
    let base = common::start_server();
    let client = Client::new();

    let spec = RequestSpec::post(format!("{base}/echo"))
        .form_body([("a", "1"), ("b", "x&y")])
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.headers["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(seen.body, "a=1&b=x%26y");

    let spec = RequestSpec::patch(format!("{base}/echo"))
        .header("Content-Type", "text/csv")
        .string_body("1,2,3")
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.method, "PATCH");
    assert_eq!(seen.headers["content-type"], "text/csv");
    assert_eq!(seen.body, "1,2,3");
}

#[test]
fn multipart_body_reaches_server() {
    let base = common::start_server();
    let client = Client::new();

    let mut part = tempfile::NamedTempFile::new().unwrap();
    part.write_all(b"file contents").unwrap();
    let form = Multipart::new()
        .text("title", "report")
        .file("attachment", part.path());
    let spec = RequestSpec::post(format!("{base}/echo"))
        .multipart_body(form)
        .build();
    let seen = echo(&client, &spec);
    assert!(seen.headers["content-type"].starts_with("multipart/form-data; boundary="));
    assert!(seen.body.contains("name=\"title\"\r\n\r\nreport\r\n"));
    assert!(seen.body.contains("Content-Type: application/octet-stream\r\n\r\nfile contents\r\n"));
}

#[test]
fn file_upload_sends_content_length() {
    let base = common::start_server();
    let client = Client::new();

    let mut upload = tempfile::NamedTempFile::new().unwrap();
    let payload = vec![b'z'; 200_000];
    upload.write_all(&payload).unwrap();
    let spec = RequestSpec::put(format!("{base}/echo/upload"))
        .file_body(upload.path())
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.body_len, payload.len());
    assert_eq!(seen.headers["content-length"], payload.len().to_string());
}

#[test]
fn stream_upload_leaves_reader_with_caller() {
    let base = common::start_server();
    let client = Client::new();

    let source = Arc::new(Mutex::new(std::io::Cursor::new(b"streamed body".to_vec())));
    let spec = RequestSpec::post(format!("{base}/echo"))
        .stream_body(StreamBody::new(Arc::clone(&source), 13))
        .build();
    let seen = echo(&client, &spec);
    assert_eq!(seen.body, "streamed body");
    // The caller can still use and rewind its own handle.
    source.lock().unwrap().set_position(0);
}

#[test]
fn status_codes_are_http_errors() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(&RequestSpec::get(format!("{base}/status/404")).build());
    assert_eq!(resp.http_code(), 404);
    assert_eq!(resp.error_kind(), Some(ErrorKind::Http));
    assert_eq!(resp.text(), Some("status 404"));

    let resp = client.execute(&RequestSpec::delete(format!("{base}/status/204")).build());
    assert!(resp.is_success());
}

#[test]
fn redirects_are_not_followed() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(&RequestSpec::get(format!("{base}/status/302")).build());
    assert_eq!(resp.http_code(), 302);
    assert_eq!(resp.error_kind(), Some(ErrorKind::Http));
}

#[test]
fn json_responses() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute_for_json(
        &RequestSpec::get(format!("{base}/json")).build(),
        JsonOptions::default(),
    );
    assert!(resp.is_success());
    assert_eq!(resp.json().unwrap()["a"], 1);
    assert_eq!(resp.json().unwrap()["nested"]["list"][2], 3);

    let resp = client.execute_for_json(
        &RequestSpec::get(format!("{base}/text")).build(),
        JsonOptions::default(),
    );
    assert_eq!(resp.error_kind(), Some(ErrorKind::Parse));
    assert_eq!(resp.http_code(), 200);
    assert!(resp.header("Content-Type").is_some());
    assert!(resp.json().is_none());

    let scalar = RequestSpec::get(format!("{base}/scalar")).build();
    assert_eq!(
        client.execute_for_json(&scalar, JsonOptions::default()).json(),
        Some(&serde_json::json!(42))
    );
    assert_eq!(
        client
            .execute_for_json(&scalar, JsonOptions::structured())
            .error_kind(),
        Some(ErrorKind::Parse)
    );

    let too_deep = client.execute_for_json(
        &RequestSpec::get(format!("{base}/json")).build(),
        JsonOptions::default().with_max_depth(1),
    );
    assert_eq!(too_deep.error_kind(), Some(ErrorKind::Parse));
}

#[test]
fn response_headers_are_normalized_and_trimmed() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(&RequestSpec::get(format!("{base}/headers")).build());
    assert_eq!(resp.headers().get("X-Request-Trace"), Some("abc123"));
    assert_eq!(resp.headers().get("Cache-Control"), Some("no-store"));
    assert_eq!(resp.text(), Some("with headers"));
}

#[test]
fn headers_do_not_leak_between_executions() {
    let base = common::start_server();
    let client = Client::new();

    let first = client.execute(&RequestSpec::get(format!("{base}/headers")).build());
    assert!(first.header("x-request-trace").is_some());
    let second = client.execute(&RequestSpec::get(format!("{base}/text")).build());
    assert!(second.header("x-request-trace").is_none());
}

#[test]
fn download_to_file() {
    let base = common::start_server();
    let client = Client::new();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("download.bin");
    let resp = client.execute_for_file(&RequestSpec::get(format!("{base}/bytes/300000")).build(), &path);
    assert!(resp.is_success(), "{resp:?}");
    assert!(resp.text().is_none());

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), 300_000);
    assert!(written.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));
}

#[test]
fn download_to_caller_stream() {
    let base = common::start_server();
    let client = Client::new();

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let resp = client.execute_for_stream(
        &RequestSpec::get(format!("{base}/bytes/1000")).build(),
        ResponseSink::new(Arc::clone(&buffer)),
    );
    assert!(resp.is_success());
    assert_eq!(buffer.lock().unwrap().len(), 1000);
}

#[test]
fn spec_response_mode_is_used_by_execute() {
    let base = common::start_server();
    let client = Client::new();

    let spec = RequestSpec::get(format!("{base}/json"))
        .for_json(JsonOptions::default())
        .build();
    assert!(client.execute(&spec).json().is_some());
    // The per-call mode wins over the stored one.
    assert!(client.execute_for_string(&spec).text().is_some());
}

#[test]
fn connection_refused_is_network() {
    common::init_logging();
    let client = Client::new();
    let addr = common::refused_addr();

    let resp = client.execute(
        &RequestSpec::get(format!("http://{addr}/"))
            .connect_timeout(Duration::from_secs(2))
            .build(),
    );
    assert_eq!(resp.http_code(), 0);
    assert_eq!(resp.error_kind(), Some(ErrorKind::Network));
    assert!(resp.diagnostic().is_some());
}

#[test]
fn timeout_is_network() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(
        &RequestSpec::get(format!("{base}/delay/3000"))
            .timeout(Duration::from_millis(200))
            .build(),
    );
    assert_eq!(resp.http_code(), 0);
    assert_eq!(resp.error_kind(), Some(ErrorKind::Network));
}

#[test]
fn transport_options_cannot_extend_timeout() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(
        &RequestSpec::get(format!("{base}/delay/3000"))
            .timeout(Duration::from_millis(200))
            .transport_option("timeout_secs", "60")
            .build(),
    );
    assert_eq!(resp.error_kind(), Some(ErrorKind::Network));
}

#[test]
fn tls_to_plain_http_server_fails_without_status() {
    let base = common::start_server();
    let client = Client::new();

    let url = base.replacen("http://", "https://", 1);
    let resp = client.execute(&RequestSpec::get(url).build());
    assert_eq!(resp.http_code(), 0);
    assert!(matches!(
        resp.error_kind(),
        Some(ErrorKind::Tls) | Some(ErrorKind::Network)
    ));
}

#[test]
fn malformed_url_fails_cleanly() {
    common::init_logging();
    let client = Client::new();

    for url in ["", "not a url", "http://"] {
        let resp = client.execute(&RequestSpec::get(url).build());
        assert_eq!(resp.http_code(), 0, "{url:?}");
        assert!(
            matches!(resp.error_kind(), Some(ErrorKind::Unknown) | Some(ErrorKind::Network)),
            "{url:?}: {resp:?}"
        );
    }
}

#[test]
fn missing_upload_file_is_unknown() {
    let base = common::start_server();
    let client = Client::new();

    let resp = client.execute(
        &RequestSpec::put(format!("{base}/echo"))
            .file_body("/definitely/not/here.bin")
            .build(),
    );
    assert_eq!(resp.error_kind(), Some(ErrorKind::Unknown));
    assert!(resp.diagnostic().unwrap().contains("here.bin"));
}

#[test]
fn client_is_shareable_across_threads() {
    let base = common::start_server();
    let client = Arc::new(Client::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = Arc::clone(&client);
            let base = base.clone();
            std::thread::spawn(move || {
                let spec = RequestSpec::get(format!("{base}/echo/t/{i}")).build();
                client.execute_for_json(&spec, JsonOptions::default())
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let seen: Echo = handle.join().unwrap().json_as().unwrap();
        assert_eq!(seen.path, format!("/echo/t/{i}"));
    }
}
