//! Multiplexed batch path on `reqwest` + a current-thread `tokio` runtime.
//!
//! # Design
//! Every job becomes one future in a `FuturesUnordered`. The runtime is
//! only ever driven from `pump` and `wait`, on the thread that owns the
//! handle set, so jobs interleave cooperatively rather than in parallel.
//! Jobs sharing client-level settings share one `reqwest::Client`, and with
//! it the connection pool, DNS results and TLS sessions. Per-host and total
//! caps are semaphores; a job takes its host permit before the total permit
//! so a busy host cannot hog total slots while it waits.
//!
//! The handle set needs a thread that is not already running async code.
//! Blocking-pool threads (`spawn_blocking`) qualify. From inside an async
//! task tokio refuses the nested `block_on` with a panic, which the batch
//! executor reports as `Unknown` for every job.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, FuturesUnordered, Stream};
use futures::{FutureExt, StreamExt};
use log::{debug, warn};
use reqwest::header::CONTENT_LENGTH;
use reqwest::redirect::Policy;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Semaphore;

use super::classify::classify_reqwest;
use super::{BatchLimits, Completion, HandleSet, Readiness};
use crate::error::TransportError;
use crate::headers::HeaderSink;
use crate::http::{BodySource, HttpMethod, PreparedRequest, RawOutcome, ResponseTarget, TransportSettings, WireBody};

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Settings that live on a `reqwest::Client` rather than on a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    connect_timeout: Duration,
    verify_tls: bool,
    tcp_nodelay: bool,
    accept_encoding: bool,
}

impl From<&TransportSettings> for ClientKey {
    fn from(settings: &TransportSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout,
            verify_tls: settings.verify_tls,
            tcp_nodelay: settings.tcp_nodelay,
            accept_encoding: settings.accept_encoding,
        }
    }
}

/// In-flight batch. Field order matters: pending futures must be dropped
/// before the runtime that drives them.
pub struct MultiHandles {
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    completed: Vec<Completion>,
    runtime: Runtime,
}

impl MultiHandles {
    pub(super) fn begin(
        requests: Vec<(usize, PreparedRequest)>,
        limits: BatchLimits,
    ) -> Result<Self, TransportError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::unknown(format!("cannot start batch runtime: {e}")))?;

        let max_total = clamp_limit("total concurrency", limits.max_total);
        let max_per_host = clamp_limit("per-host concurrency", limits.max_per_host);
        let total = Arc::new(Semaphore::new(max_total));
        let mut hosts: HashMap<String, Arc<Semaphore>> = HashMap::new();
        let mut clients: HashMap<ClientKey, Result<reqwest::Client, TransportError>> = HashMap::new();

        let in_flight = FuturesUnordered::new();
        let mut completed = Vec::new();
        {
            let _guard = runtime.enter();
            for (index, request) in requests {
                let client = match clients.entry(ClientKey::from(&request.settings)) {
                    Entry::Occupied(e) => e.get().clone(),
                    Entry::Vacant(e) => {
                        let built = build_client(e.key(), max_per_host);
                        e.insert(built).clone()
                    }
                };
                let client = match client {
                    Ok(client) => client,
                    Err(err) => {
                        completed.push(Completion {
                            index,
                            outcome: RawOutcome::Failed(err),
                            headers: HeaderSink::new(),
                        });
                        continue;
                    }
                };
                let host = Arc::clone(
                    hosts
                        .entry(host_key(&request.url))
                        .or_insert_with(|| Arc::new(Semaphore::new(max_per_host))),
                );
                let total = Arc::clone(&total);
                in_flight.push(run_job(index, client, request, host, total).boxed());
            }
        }
        debug!(
            "batch registered {} jobs on {} clients across {} hosts",
            in_flight.len(),
            clients.len(),
            hosts.len()
        );

        Ok(Self {
            in_flight,
            completed,
            runtime,
        })
    }
}

impl HandleSet for MultiHandles {
    fn pump(&mut self) -> usize {
        let Self {
            in_flight,
            completed,
            runtime,
        } = self;
        runtime.block_on(async {
            // Let the runtime poll its I/O driver once before draining.
            tokio::task::yield_now().await;
            while let Some(Some(done)) = in_flight.next().now_or_never() {
                completed.push(done);
            }
        });
        in_flight.len()
    }

    fn wait(&mut self, max: Duration) -> Readiness {
        let Self {
            in_flight,
            completed,
            runtime,
        } = self;
        if in_flight.is_empty() {
            return Readiness::Ready;
        }
        runtime.block_on(async {
            match tokio::time::timeout(max, in_flight.next()).await {
                Ok(Some(done)) => {
                    completed.push(done);
                    Readiness::Ready
                }
                Ok(None) => Readiness::Ready,
                Err(_) => Readiness::TimedOut,
            }
        })
    }

    fn collect(&mut self) -> Vec<Completion> {
        mem::take(&mut self.completed)
    }
}

fn clamp_limit(what: &str, value: usize) -> usize {
    if value == 0 {
        warn!("{what} of 0 is not usable, using 1");
        1
    } else {
        value
    }
}

fn build_client(key: &ClientKey, max_per_host: usize) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .connect_timeout(key.connect_timeout)
        .danger_accept_invalid_certs(!key.verify_tls)
        .tcp_nodelay(key.tcp_nodelay)
        .gzip(key.accept_encoding)
        .pool_max_idle_per_host(max_per_host)
        .build()
        .map_err(|e| classify_reqwest(&e))
}

/// `host:port` used to group jobs under one per-host cap. URLs that do not
/// parse share the empty key; they fail in `send` anyway.
fn host_key(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(url) => format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        ),
        Err(_) => String::new(),
    }
}

async fn run_job(
    index: usize,
    client: reqwest::Client,
    request: PreparedRequest,
    host: Arc<Semaphore>,
    total: Arc<Semaphore>,
) -> Completion {
    // Neither semaphore is ever closed, so acquiring cannot fail.
    let _host_permit = host.acquire_owned().await;
    let _total_permit = total.acquire_owned().await;
    let mut headers = HeaderSink::new();
    let outcome = send(&client, request, &mut headers).await;
    Completion {
        index,
        outcome,
        headers,
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

async fn send(client: &reqwest::Client, request: PreparedRequest, sink: &mut HeaderSink) -> RawOutcome {
    let PreparedRequest {
        method,
        url,
        headers,
        body,
        settings,
        target,
    } = request;
    debug!("{method} {url} (batched)");

    let mut builder = client
        .request(reqwest_method(method), url.as_str())
        .timeout(settings.timeout);
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = match body {
        WireBody::Empty => builder,
        WireBody::Bytes(bytes) => builder.body(bytes),
        WireBody::Reader { reader, len } => builder
            .header(CONTENT_LENGTH, len.to_string())
            .body(reqwest::Body::wrap_stream(read_chunks(reader))),
    };

    let mut response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return RawOutcome::Failed(classify_reqwest(&e)),
    };
    let status = response.status().as_u16();
    for (name, value) in response.headers() {
        sink.record(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }

    match target {
        ResponseTarget::Buffer => match response.bytes().await {
            Ok(bytes) => RawOutcome::buffered(status, bytes.to_vec()),
            Err(e) => RawOutcome::Failed(classify_reqwest(&e)),
        },
        ResponseTarget::Writer(mut writer) => {
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        if let Err(e) = writer.write_all(&chunk) {
                            return RawOutcome::Failed(TransportError::unknown(format!(
                                "writing response body failed: {e}"
                            )));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => return RawOutcome::Failed(classify_reqwest(&e)),
                }
            }
            if let Err(e) = writer.flush() {
                return RawOutcome::Failed(TransportError::unknown(format!(
                    "flushing response body failed: {e}"
                )));
            }
            RawOutcome::Response {
                status,
                body: BodySource::Streamed,
            }
        }
    }
}

/// Upload stream over a synchronous reader, one chunk per poll.
fn read_chunks(
    reader: Box<dyn Read + Send + Sync>,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + Sync + 'static {
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; UPLOAD_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(n) => {
                    buf.truncate(n);
                    return Some((Ok(buf), Some(reader)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
}
