//! Execution surface: single requests and batches.
//!
//! # Design
//! Every execution call returns a `Response`, never a `Result` and never a
//! panic. Preparation errors, transport failures and panics anywhere below
//! this layer are all turned into a `Response` with an error kind here.
//! The `RequestSpec` is only read; everything derived from it lives for one
//! execution and is dropped (closing its files) before the call returns.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use log::{debug, warn};

use crate::batch::BatchExecutor;
use crate::body::ResponseSink;
use crate::config::ClientConfig;
use crate::error::ErrorKind;
use crate::headers::HeaderSink;
use crate::parse::parse;
use crate::prepare::prepare;
use crate::response::Response;
use crate::spec::{JsonOptions, RequestSpec, ResponseMode};
use crate::transport::{BatchLimits, HttpTransport, Transport};

/// Executes `RequestSpec`s over a [`Transport`].
///
/// A client holds no per-request state; one instance can be shared across
/// threads and reused for any number of executions.
#[derive(Debug)]
pub struct Client<T = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl Client<HttpTransport> {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, HttpTransport::new())
    }
}

impl Default for Client<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute with the response mode stored on the spec.
    pub fn execute(&self, spec: &RequestSpec) -> Response {
        self.execute_with_mode(spec, spec.response_mode())
    }

    pub fn execute_for_string(&self, spec: &RequestSpec) -> Response {
        self.execute_with_mode(spec, &ResponseMode::String)
    }

    pub fn execute_for_json(&self, spec: &RequestSpec, options: JsonOptions) -> Response {
        self.execute_with_mode(spec, &ResponseMode::Json(options))
    }

    /// Write the body to `path`, creating or truncating it.
    pub fn execute_for_file(&self, spec: &RequestSpec, path: impl AsRef<Path>) -> Response {
        self.execute_with_mode(spec, &ResponseMode::File(path.as_ref().to_path_buf()))
    }

    /// Write the body to `sink`. The sink stays open and usable afterwards.
    pub fn execute_for_stream(&self, spec: &RequestSpec, sink: ResponseSink) -> Response {
        self.execute_with_mode(spec, &ResponseMode::Stream(sink))
    }

    fn execute_with_mode(&self, spec: &RequestSpec, mode: &ResponseMode) -> Response {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let request = match prepare(spec, mode, &self.config) {
                Ok(request) => request,
                Err(e) => {
                    debug!("request failed to prepare: {e}");
                    return Response::failed(ErrorKind::Unknown, e.to_string());
                }
            };
            let mut headers = HeaderSink::new();
            let outcome = self.transport.execute_one(request, &mut headers);
            parse(mode, outcome, headers)
        }));
        result.unwrap_or_else(|payload| {
            let message = format!("execution panicked: {}", panic_message(payload.as_ref()));
            warn!("{message}");
            Response::failed(ErrorKind::Unknown, message)
        })
    }

    /// Execute every job with at most `concurrency` requests in flight and
    /// at most `per_host` per host, sharing connections between them.
    ///
    /// Returns one response per distinct key. Must be called from
    /// synchronous code, which includes `spawn_blocking` threads; from
    /// inside an async task every job fails as [`ErrorKind::Unknown`].
    pub fn execute_many<K, I>(&self, jobs: I, concurrency: usize, per_host: usize) -> HashMap<K, Response>
    where
        K: Eq + Hash + Clone,
        I: IntoIterator<Item = (K, RequestSpec)>,
    {
        let limits = BatchLimits {
            max_total: concurrency,
            max_per_host: per_host,
        };
        BatchExecutor::new(&self.transport, &self.config, limits).run(jobs)
    }

    /// [`execute_many`](Self::execute_many) with the configured default caps.
    pub fn execute_many_default<K, I>(&self, jobs: I) -> HashMap<K, Response>
    where
        K: Eq + Hash + Clone,
        I: IntoIterator<Item = (K, RequestSpec)>,
    {
        self.execute_many(jobs, self.config.default_concurrency, self.config.default_per_host)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
