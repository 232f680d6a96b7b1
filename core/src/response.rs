//! The normalized result of one execution.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::params::Params;

/// Decoded response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseData {
    #[default]
    None,
    Text(String),
    Json(Value),
}

/// Immutable outcome of an execution: status, headers, data and at most one
/// error kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    http_code: u16,
    headers: Params,
    data: ResponseData,
    error_kind: Option<ErrorKind>,
    diagnostic: Option<String>,
}

impl Response {
    /// The only constructor. When no error was assigned and `http_code` is
    /// outside `200..300`, the kind becomes [`ErrorKind::Http`].
    pub fn new(
        http_code: u16,
        headers: Params,
        data: ResponseData,
        error_kind: Option<ErrorKind>,
        diagnostic: Option<String>,
    ) -> Self {
        let error_kind = match error_kind {
            Some(kind) => Some(kind),
            None if !(200..300).contains(&http_code) => Some(ErrorKind::Http),
            None => None,
        };
        Self {
            http_code,
            headers,
            data,
            error_kind,
            diagnostic,
        }
    }

    /// A response for a request that never got an HTTP exchange.
    pub fn failed(kind: ErrorKind, diagnostic: impl Into<String>) -> Self {
        Self::new(0, Params::new(), ResponseData::None, Some(kind), Some(diagnostic.into()))
    }

    /// `0` when no response was received.
    pub fn http_code(&self) -> u16 {
        self.http_code
    }

    pub fn headers(&self) -> &Params {
        &self.headers
    }

    /// Look up a header by any casing of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&crate::headers::normalize_header_key(name))
    }

    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.data {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Decode the JSON data into `T`. `None` if there is no JSON data or it
    /// does not fit `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.json()
            .and_then(|value| T::deserialize(value).ok())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}
