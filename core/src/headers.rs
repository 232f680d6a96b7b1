//! Header key normalization and the per-execution response header sink.

use log::trace;

use crate::params::Params;

/// Canonical header casing: `content-type` becomes `Content-Type`.
///
/// Segments are split on `-` or space, lower-cased, capitalized and joined
/// with `-`. Applying it twice gives the same result as applying it once.
pub fn normalize_header_key(key: &str) -> String {
    key.split(['-', ' '])
        .map(|segment| {
            let lower = segment.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Collects response headers for exactly one execution.
///
/// Each execution (and each batch job) gets a fresh sink, so headers from a
/// previous call can never show up in a later response.
#[derive(Debug, Default)]
pub struct HeaderSink {
    headers: Params,
}

impl HeaderSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw header line such as `content-type: text/html\r\n`.
    ///
    /// Lines without a colon (the status line, the blank terminator) and
    /// lines whose colon is the first character are ignored.
    pub fn accept_line(&mut self, line: &str) {
        match line.find(':') {
            Some(pos) if pos > 0 => self.record(&line[..pos], &line[pos + 1..]),
            _ => {}
        }
    }

    /// Record an already split header. A repeated name keeps the last value.
    pub fn record(&mut self, name: &str, value: &str) {
        let key = normalize_header_key(name.trim());
        let value = value.trim();
        trace!("response header {key}: {value}");
        self.headers.set(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn into_headers(self) -> Params {
        self.headers
    }
}
