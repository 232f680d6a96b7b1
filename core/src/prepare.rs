//! Turn a `RequestSpec` into a transport-ready `PreparedRequest`.
//!
//! # Design
//! Settings are merged in three layers: client defaults, then the request's
//! transport options, then the request's own timeouts and TLS flag, which
//! always win. Everything that can fail locally (opening files, encoding the
//! body, parsing option values) fails here, before a transport sees the
//! request.

use std::fs::File;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};

use crate::body::encode;
use crate::config::ClientConfig;
use crate::error::PrepareError;
use crate::http::{PreparedRequest, ResponseTarget, TransportSettings};
use crate::params::Params;
use crate::spec::{RequestSpec, ResponseMode, UserAgent};
use crate::url::build_url;

/// Materialize `spec` for one execution with `mode` as its response mode.
pub fn prepare(
    spec: &RequestSpec,
    mode: &ResponseMode,
    config: &ClientConfig,
) -> Result<PreparedRequest, PrepareError> {
    let url = build_url(&spec.url, &spec.path_params, &spec.query_params);

    let mut settings = TransportSettings {
        connect_timeout: spec.connect_timeout,
        timeout: spec.timeout,
        verify_tls: spec.verify_tls,
        tcp_nodelay: config.tcp_nodelay,
        accept_encoding: config.accept_encoding,
    };
    let mut user_agent = config.user_agent.clone();
    apply_options(&spec.transport_options, &mut settings, &mut user_agent)?;
    settings.connect_timeout = spec.connect_timeout;
    settings.timeout = spec.timeout;
    settings.verify_tls = spec.verify_tls;

    match &spec.user_agent {
        UserAgent::Default => {}
        UserAgent::Custom(ua) => user_agent = Some(ua.clone()),
        UserAgent::Omit => user_agent = None,
    }

    let encoded = encode(&spec.body)?;

    let mut headers: Params = spec.headers.clone();
    if let Some((username, password)) = &spec.basic_auth {
        let token = STANDARD.encode(format!("{username}:{password}"));
        headers.set("Authorization", format!("Basic {token}"));
    }
    if let Some(ua) = user_agent {
        if !headers.contains_key("User-Agent") {
            headers.set("User-Agent", ua);
        }
    }
    if let Some(content_type) = encoded.content_type {
        if !headers.contains_key("Content-Type") {
            headers.set("Content-Type", content_type);
        }
    }

    let target = match mode {
        ResponseMode::String | ResponseMode::Json(_) => ResponseTarget::Buffer,
        ResponseMode::File(path) => {
            let file = File::create(path).map_err(|source| PrepareError::DownloadOpen {
                path: path.clone(),
                source,
            })?;
            ResponseTarget::Writer(Box::new(file))
        }
        ResponseMode::Stream(sink) => ResponseTarget::Writer(Box::new(sink.clone())),
    };

    debug!("prepared {} {url} ({:?})", spec.method, encoded.payload);
    Ok(PreparedRequest {
        method: spec.method,
        url,
        headers: headers.into_vec(),
        body: encoded.payload,
        settings,
        target,
    })
}

fn apply_options(
    options: &Params,
    settings: &mut TransportSettings,
    user_agent: &mut Option<String>,
) -> Result<(), PrepareError> {
    for (key, value) in options.iter() {
        match key {
            "user_agent" => *user_agent = Some(value.to_string()),
            "tcp_nodelay" => settings.tcp_nodelay = parse_bool(key, value)?,
            "accept_encoding" => settings.accept_encoding = parse_bool(key, value)?,
            "connect_timeout_secs" => settings.connect_timeout = parse_secs(key, value)?,
            "timeout_secs" => settings.timeout = parse_secs(key, value)?,
            "verify_tls" => settings.verify_tls = parse_bool(key, value)?,
            other => warn!("ignoring unknown transport option {other:?}"),
        }
    }
    Ok(())
}

fn invalid(key: &str, value: &str) -> PrepareError {
    PrepareError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PrepareError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, PrepareError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(key, value))
}
