//! Declarative HTTP requests with single and batched execution.
//!
//! # Overview
//! A caller describes a request as an immutable [`RequestSpec`] (method,
//! URL template, params, headers, auth, body, transport knobs, response
//! mode) and hands it to a [`Client`]. Single executions block the calling
//! thread; batches run many requests cooperatively over one shared
//! connection pool and return results keyed by the caller's keys.
//!
//! # Design
//! - The spec never changes during execution. Each execution derives a
//!   [`PreparedRequest`] (final URL, headers, encoded body, open files) that
//!   lives exactly as long as that execution.
//! - Transports only move bytes. [`Transport`] takes prepared requests and
//!   returns raw outcomes; the engine parses them into a [`Response`].
//! - Every failure is a [`Response`] with an [`ErrorKind`]; execution calls
//!   never return `Err` and never panic.

pub mod batch;
pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod http;
pub mod params;
pub mod parse;
pub mod prepare;
pub mod response;
pub mod spec;
pub mod transport;
pub mod url;

pub use batch::{BatchExecutor, BatchState};
pub use body::{Body, JsonPayload, Multipart, ResponseSink, StreamBody};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{ErrorClass, ErrorKind, PrepareError, TransportError};
pub use headers::{normalize_header_key, HeaderSink};
pub use http::{HttpMethod, PreparedRequest, RawOutcome};
pub use params::Params;
pub use response::{Response, ResponseData};
pub use spec::{JsonOptions, RequestBuilder, RequestSpec, ResponseMode, UserAgent};
pub use transport::{BatchLimits, Completion, HandleSet, HttpTransport, Readiness, Transport};
pub use crate::url::build_url;
