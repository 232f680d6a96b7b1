//! Immutable request description and its fluent builder.
//!
//! # Design
//! A `RequestSpec` is plain data: building one never performs I/O, and
//! executing one never mutates it. All derived state (final URL, header
//! list, encoded body, open files) lives in the `PreparedRequest` created
//! for a single execution, so the same spec can be executed any number of
//! times, from any number of threads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::body::{Body, JsonPayload, Multipart, ResponseSink, StreamBody};
use crate::headers::normalize_header_key;
use crate::http::HttpMethod;
use crate::params::Params;
use crate::url::strip_fragment;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(270);

/// Limits applied when decoding a JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonOptions {
    /// Documents nested deeper than this are a parse error.
    pub max_depth: usize,
    /// Reject scalar documents (`42`, `"x"`, `null`); only objects and
    /// arrays are accepted.
    pub structured: bool,
}

impl JsonOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 512;

    pub fn structured() -> Self {
        Self {
            structured: true,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            structured: false,
        }
    }
}

/// How the response body is consumed.
#[derive(Debug, Clone, Default)]
pub enum ResponseMode {
    #[default]
    String,
    Json(JsonOptions),
    /// Written to this path, created or truncated by the engine.
    File(PathBuf),
    /// Written to a caller-owned sink that stays open afterwards.
    Stream(ResponseSink),
}

/// Per-request user agent choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserAgent {
    /// Use the client's configured user agent.
    #[default]
    Default,
    Custom(String),
    /// Send no `User-Agent` header.
    Omit,
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub(crate) method: HttpMethod,
    pub(crate) url: String,
    pub(crate) path_params: Params,
    pub(crate) query_params: Params,
    pub(crate) headers: Params,
    pub(crate) basic_auth: Option<(String, String)>,
    pub(crate) user_agent: UserAgent,
    pub(crate) body: Body,
    pub(crate) transport_options: Params,
    pub(crate) connect_timeout: Duration,
    pub(crate) timeout: Duration,
    pub(crate) verify_tls: bool,
    pub(crate) response_mode: ResponseMode,
}

impl RequestSpec {
    pub fn builder(method: HttpMethod, url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    pub fn get(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Delete, url)
    }

    pub fn patch(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Patch, url)
    }

    pub fn head(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Head, url)
    }

    pub fn options(url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(HttpMethod::Options, url)
    }

    /// Start a builder from a copy of this spec.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            spec: self.clone(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The URL template, fragment already removed.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path_params(&self) -> &Params {
        &self.path_params
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    /// Caller headers, keys normalized. Auth and user agent are not in here;
    /// they are added when the request is prepared.
    pub fn headers(&self) -> &Params {
        &self.headers
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        self.basic_auth
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn transport_options(&self) -> &Params {
        &self.transport_options
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn response_mode(&self) -> &ResponseMode {
        &self.response_mode
    }
}

/// Fluent builder for [`RequestSpec`]. No method here touches the network
/// or the filesystem.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    spec: RequestSpec,
}

impl RequestBuilder {
    pub fn new(method: HttpMethod, url: impl AsRef<str>) -> Self {
        Self {
            spec: RequestSpec {
                method,
                url: strip_fragment(url.as_ref()).to_string(),
                path_params: Params::new(),
                query_params: Params::new(),
                headers: Params::new(),
                basic_auth: None,
                user_agent: UserAgent::Default,
                body: Body::None,
                transport_options: Params::new(),
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                timeout: DEFAULT_TIMEOUT,
                verify_tls: true,
                response_mode: ResponseMode::String,
            },
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.spec.method = method;
        self
    }

    pub fn url(mut self, url: impl AsRef<str>) -> Self {
        self.spec.url = strip_fragment(url.as_ref()).to_string();
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.spec
            .headers
            .set(normalize_header_key(name.as_ref()), value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.spec
                .headers
                .set(normalize_header_key(name.as_ref()), value);
        }
        self
    }

    pub fn remove_header(mut self, name: impl AsRef<str>) -> Self {
        self.spec.headers.remove(&normalize_header_key(name.as_ref()));
        self
    }

    pub fn clear_headers(mut self) -> Self {
        self.spec.headers.clear();
        self
    }

    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.path_params.set(key, value);
        self
    }

    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec.path_params.extend(params);
        self
    }

    pub fn remove_path_param(mut self, key: &str) -> Self {
        self.spec.path_params.remove(key);
        self
    }

    pub fn clear_path_params(mut self) -> Self {
        self.spec.path_params.clear();
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.query_params.set(key, value);
        self
    }

    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec.query_params.extend(params);
        self
    }

    pub fn remove_query_param(mut self, key: &str) -> Self {
        self.spec.query_params.remove(key);
        self
    }

    pub fn clear_query_params(mut self) -> Self {
        self.spec.query_params.clear();
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.spec.basic_auth = Some((username.into(), password.into()));
        self
    }

    pub fn clear_basic_auth(mut self) -> Self {
        self.spec.basic_auth = None;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.spec.user_agent = UserAgent::Custom(user_agent.into());
        self
    }

    pub fn no_user_agent(mut self) -> Self {
        self.spec.user_agent = UserAgent::Omit;
        self
    }

    // Body setters. Each one replaces whatever body was set before.

    pub fn form_body<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec.body = Body::Form(fields.into_iter().collect());
        self
    }

    pub fn multipart_body(mut self, form: Multipart) -> Self {
        self.spec.body = Body::Multipart(form);
        self
    }

    pub fn string_body(mut self, text: impl Into<String>) -> Self {
        self.spec.body = Body::Text(text.into());
        self
    }

    /// Serialize `value` as the JSON body. A value that cannot be serialized
    /// fails the execution, not the builder.
    pub fn json_body<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.spec.body = Body::Json(JsonPayload::from_serialize(value));
        self
    }

    pub fn json_value(mut self, value: serde_json::Value) -> Self {
        self.spec.body = Body::Json(value.into());
        self
    }

    /// Upload the file at `path`. It is opened when the request executes.
    pub fn file_body(mut self, path: impl AsRef<Path>) -> Self {
        self.spec.body = Body::File(path.as_ref().to_path_buf());
        self
    }

    pub fn stream_body(mut self, stream: StreamBody) -> Self {
        self.spec.body = Body::Stream(stream);
        self
    }

    pub fn clear_body(mut self) -> Self {
        self.spec.body = Body::None;
        self
    }

    pub fn transport_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.transport_options.set(key, value);
        self
    }

    pub fn transport_options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec.transport_options.extend(options);
        self
    }

    pub fn clear_transport_options(mut self) -> Self {
        self.spec.transport_options.clear();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.spec.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.spec.verify_tls = verify;
        self
    }

    pub fn for_string(mut self) -> Self {
        self.spec.response_mode = ResponseMode::String;
        self
    }

    pub fn for_json(mut self, options: JsonOptions) -> Self {
        self.spec.response_mode = ResponseMode::Json(options);
        self
    }

    pub fn for_file(mut self, path: impl AsRef<Path>) -> Self {
        self.spec.response_mode = ResponseMode::File(path.as_ref().to_path_buf());
        self
    }

    pub fn for_stream(mut self, sink: ResponseSink) -> Self {
        self.spec.response_mode = ResponseMode::Stream(sink);
        self
    }

    pub fn build(self) -> RequestSpec {
        self.spec
    }
}

impl From<RequestBuilder> for RequestSpec {
    fn from(builder: RequestBuilder) -> Self {
        builder.build()
    }
}
