//! Bounded-concurrency execution of many requests over one handle set.
//!
//! # Design
//! The executor walks `Idle -> Prepared -> Running <-> Draining -> Done`:
//!
//! - **Prepared**: every job is prepared up front. A job that fails to
//!   prepare gets its `Unknown` response right away and never reaches the
//!   transport.
//! - **Running**: the calling thread pumps the handle set and waits on it
//!   for at most `poll_interval`, or sleeps `fallback_sleep` when the set
//!   cannot wait.
//! - **Draining**: each completion is parsed and stored as soon as it is
//!   collected, then dropped, which closes that job's files.
//! - **Done**: the handle set is dropped, and any job the transport never
//!   reported is filled in as `Unknown`.
//!
//! Results are keyed by the caller's keys, so completion order does not
//! matter. A panic anywhere in the loop only affects jobs without a result
//! yet.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use log::{debug, warn};

use crate::client::panic_message;
use crate::config::ClientConfig;
use crate::error::ErrorKind;
use crate::parse::parse;
use crate::prepare::prepare;
use crate::response::Response;
use crate::spec::{RequestSpec, ResponseMode};
use crate::transport::{BatchLimits, Completion, HandleSet, Readiness, Transport};

pub(crate) const NEVER_COMPLETED: &str = "job was never completed by the transport";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Prepared,
    Running,
    Draining,
    Done,
}

struct Slot<K> {
    key: K,
    mode: ResponseMode,
}

pub struct BatchExecutor<'a, T, K> {
    transport: &'a T,
    config: &'a ClientConfig,
    limits: BatchLimits,
    state: BatchState,
    slots: Vec<Slot<K>>,
    results: HashMap<K, Response>,
}

impl<'a, T, K> BatchExecutor<'a, T, K>
where
    T: Transport,
    K: Eq + Hash + Clone,
{
    pub fn new(transport: &'a T, config: &'a ClientConfig, limits: BatchLimits) -> Self {
        Self {
            transport,
            config,
            limits,
            state: BatchState::Idle,
            slots: Vec::new(),
            results: HashMap::new(),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    fn transition(&mut self, next: BatchState) {
        if self.state != next {
            debug!("batch {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Execute every job and return one response per distinct key. With
    /// duplicate keys the last submission is the one executed.
    pub fn run<I>(mut self, jobs: I) -> HashMap<K, Response>
    where
        I: IntoIterator<Item = (K, RequestSpec)>,
    {
        let jobs = dedupe(jobs);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.drive(jobs)));
        if let Err(payload) = outcome {
            let message = format!("batch execution panicked: {}", panic_message(payload.as_ref()));
            warn!("{message}");
            self.fill_missing(&message);
        }
        self.fill_missing(NEVER_COMPLETED);
        self.transition(BatchState::Done);
        self.results
    }

    fn drive(&mut self, jobs: Vec<(K, RequestSpec)>) {
        let mut requests = Vec::with_capacity(jobs.len());
        for (key, spec) in jobs {
            let mode = spec.response_mode().clone();
            match prepare(&spec, &mode, self.config) {
                Ok(request) => {
                    requests.push((self.slots.len(), request));
                    self.slots.push(Slot { key, mode });
                }
                Err(e) => {
                    debug!("batch job failed to prepare: {e}");
                    self.results
                        .insert(key, Response::failed(ErrorKind::Unknown, e.to_string()));
                }
            }
        }
        self.transition(BatchState::Prepared);
        if requests.is_empty() {
            return;
        }

        let mut handles = match self.transport.begin_many(requests, self.limits) {
            Ok(handles) => handles,
            Err(e) => {
                warn!("batch could not start: {e}");
                self.fill_missing(&e.message);
                return;
            }
        };
        self.transition(BatchState::Running);

        loop {
            let running = handles.pump();
            self.drain(&mut handles);
            if running == 0 {
                break;
            }
            if handles.wait(self.config.poll_interval) == Readiness::Unsupported {
                thread::sleep(self.config.fallback_sleep);
            }
        }
        self.drain(&mut handles);
    }

    fn drain(&mut self, handles: &mut T::Handles) {
        let completions = handles.collect();
        if completions.is_empty() {
            return;
        }
        self.transition(BatchState::Draining);
        for completion in completions {
            self.store(completion);
        }
        self.transition(BatchState::Running);
    }

    fn store(&mut self, completion: Completion) {
        let Completion {
            index,
            outcome,
            headers,
        } = completion;
        let Some(slot) = self.slots.get(index) else {
            warn!("transport reported unknown batch job {index}");
            return;
        };
        if self.results.contains_key(&slot.key) {
            warn!("transport reported batch job {index} twice");
            return;
        }
        let response = catch_unwind(AssertUnwindSafe(|| parse(&slot.mode, outcome, headers)))
            .unwrap_or_else(|payload| {
                Response::failed(
                    ErrorKind::Unknown,
                    format!("response parsing panicked: {}", panic_message(payload.as_ref())),
                )
            });
        self.results.insert(slot.key.clone(), response);
    }

    fn fill_missing(&mut self, message: &str) {
        for slot in &self.slots {
            if !self.results.contains_key(&slot.key) {
                self.results
                    .insert(slot.key.clone(), Response::failed(ErrorKind::Unknown, message));
            }
        }
    }
}

/// Keep one job per key. A later job replaces an earlier one in place.
fn dedupe<K, I>(jobs: I) -> Vec<(K, RequestSpec)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, RequestSpec)>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<(K, RequestSpec)> = Vec::new();
    for (key, spec) in jobs {
        match positions.get(&key) {
            Some(&pos) => {
                debug!("duplicate batch key, keeping the later request");
                out[pos].1 = spec;
            }
            None => {
                positions.insert(key.clone(), out.len());
                out.push((key, spec));
            }
        }
    }
    out
}
