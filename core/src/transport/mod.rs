//! The seam between the engine and the network.
//!
//! # Design
//! The engine hands a transport fully prepared requests and gets raw
//! outcomes back; status interpretation, response modes and error kinds all
//! stay on the engine side. Batch execution goes through a [`HandleSet`]:
//! the engine registers every job at once and then drives the set with
//! `pump` / `wait` / `collect` from the calling thread.
//!
//! [`HttpTransport`] is the default: `ureq` for single requests, a `reqwest`
//! client on a current-thread `tokio` runtime for batches.

mod blocking;
pub mod classify;
mod multi;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::TransportError;
use crate::headers::HeaderSink;
use crate::http::{PreparedRequest, RawOutcome, TransportSettings};

pub use multi::MultiHandles;

/// One finished batch job.
#[derive(Debug)]
pub struct Completion {
    /// Index the job was registered under in `begin_many`.
    pub index: usize,
    pub outcome: RawOutcome,
    pub headers: HeaderSink,
}

/// Result of waiting on a handle set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Something completed, or there is nothing left to wait for.
    Ready,
    TimedOut,
    /// This set cannot block on readiness; the caller sleeps instead.
    Unsupported,
}

/// Concurrency caps for a batch. Values below 1 are treated as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_total: usize,
    pub max_per_host: usize,
}

/// A set of in-flight requests sharing connections, DNS and TLS state.
/// Dropping it tears that shared state down.
pub trait HandleSet {
    /// Make progress without blocking. Returns how many jobs are still
    /// running.
    fn pump(&mut self) -> usize;

    /// Block until something completes or `max` elapses.
    fn wait(&mut self, max: Duration) -> Readiness;

    /// Take every completion reported since the last call.
    fn collect(&mut self) -> Vec<Completion>;
}

pub trait Transport {
    type Handles: HandleSet;

    /// Perform one request on the calling thread, recording response
    /// headers into `headers`.
    fn execute_one(&self, request: PreparedRequest, headers: &mut HeaderSink) -> RawOutcome;

    /// Register every request with a fresh handle set.
    fn begin_many(
        &self,
        requests: Vec<(usize, PreparedRequest)>,
        limits: BatchLimits,
    ) -> Result<Self::Handles, TransportError>;
}

/// Default transport.
///
/// Single requests reuse one `ureq::Agent` per distinct set of transport
/// settings, so keep-alive connections carry over between executions.
#[derive(Default)]
pub struct HttpTransport {
    agents: Mutex<HashMap<TransportSettings, ureq::Agent>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent_for(&self, settings: &TransportSettings) -> ureq::Agent {
        // A poisoned lock only means another thread panicked mid-insert; the
        // map itself is still usable.
        let mut agents = self
            .agents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        agents
            .entry(settings.clone())
            .or_insert_with(|| blocking::new_agent(settings))
            .clone()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    type Handles = MultiHandles;

    fn execute_one(&self, request: PreparedRequest, headers: &mut HeaderSink) -> RawOutcome {
        let agent = self.agent_for(&request.settings);
        blocking::execute(&agent, request, headers)
    }

    fn begin_many(
        &self,
        requests: Vec<(usize, PreparedRequest)>,
        limits: BatchLimits,
    ) -> Result<MultiHandles, TransportError> {
        MultiHandles::begin(requests, limits)
    }
}
