//! Transport-facing plain data: the prepared request and the raw outcome.
//!
//! # Design
//! The engine turns a `RequestSpec` into a `PreparedRequest` whose every
//! field is final: URL with params substituted, the complete header list,
//! the encoded body and the response destination. A transport only has to
//! put it on the wire and report back a `RawOutcome`; it never interprets
//! response modes or error kinds.
//!
//! A `PreparedRequest` owns every handle the engine opened for it (upload
//! file inside `WireBody::Reader`, download file inside
//! `ResponseTarget::Writer`). Consuming or dropping the request closes
//! them, whatever path the execution took.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use std::time::Duration;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// Request body as it goes on the wire.
pub enum WireBody {
    Empty,
    Bytes(Vec<u8>),
    /// Streamed upload with a known length, sent with `Content-Length`.
    Reader {
        reader: Box<dyn Read + Send + Sync>,
        len: u64,
    },
}

impl WireBody {
    pub fn len(&self) -> Option<u64> {
        match self {
            WireBody::Empty => None,
            WireBody::Bytes(bytes) => Some(bytes.len() as u64),
            WireBody::Reader { len, .. } => Some(*len),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WireBody::Empty)
    }
}

impl fmt::Debug for WireBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireBody::Empty => f.write_str("Empty"),
            WireBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            WireBody::Reader { len, .. } => write!(f, "Reader({len} bytes)"),
        }
    }
}

/// Where the response body goes.
pub enum ResponseTarget {
    /// Keep it in memory for string or JSON parsing.
    Buffer,
    /// Copy it straight into a file or caller sink, never buffering it whole.
    Writer(Box<dyn Write + Send>),
}

impl fmt::Debug for ResponseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseTarget::Buffer => f.write_str("Buffer"),
            ResponseTarget::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// Connection-level knobs after defaults, transport options and the
/// request's own values have been merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub tcp_nodelay: bool,
    pub accept_encoding: bool,
}

/// A request ready to hand to a transport.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Final header list with normalized keys, including auth, user agent
    /// and content type.
    pub headers: Vec<(String, String)>,
    pub body: WireBody,
    pub settings: TransportSettings,
    pub target: ResponseTarget,
}

/// What happened to the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Buffered(Vec<u8>),
    /// Already written to the request's `ResponseTarget::Writer`.
    Streamed,
}

/// What a transport reports for one request.
#[derive(Debug, Clone)]
pub enum RawOutcome {
    Response { status: u16, body: BodySource },
    Failed(TransportError),
}

impl RawOutcome {
    pub fn buffered(status: u16, body: impl Into<Vec<u8>>) -> Self {
        RawOutcome::Response {
            status,
            body: BodySource::Buffered(body.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_str() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Patch,
            HttpMethod::Head,
            HttpMethod::Options,
        ] {
            assert_eq!(method.as_str().parse::<HttpMethod>(), Ok(method));
        }
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn wire_body_reports_length() {
        assert_eq!(WireBody::Empty.len(), None);
        assert_eq!(WireBody::Bytes(vec![1, 2, 3]).len(), Some(3));
        let reader = WireBody::Reader {
            reader: Box::new(std::io::Cursor::new(vec![0u8; 10])),
            len: 10,
        };
        assert_eq!(reader.len(), Some(10));
        assert_eq!(format!("{reader:?}"), "Reader(10 bytes)");
    }
}
