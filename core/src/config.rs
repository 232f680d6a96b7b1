//! Client-wide defaults.

use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every execution of one [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Sent as `User-Agent` unless the request sets its own or opts out.
    /// `None` sends no user agent by default.
    pub user_agent: Option<String>,
    pub tcp_nodelay: bool,
    /// Negotiate compressed responses and decode them transparently.
    pub accept_encoding: bool,
    /// Upper bound for one readiness wait in the batch loop.
    pub poll_interval: Duration,
    /// Sleep used when the transport cannot wait for readiness.
    pub fallback_sleep: Duration,
    pub default_concurrency: usize,
    pub default_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            tcp_nodelay: true,
            accept_encoding: false,
            poll_interval: Duration::from_millis(10),
            fallback_sleep: Duration::from_millis(2),
            default_concurrency: 10,
            default_per_host: 1,
        }
    }
}

impl ClientConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn without_user_agent(mut self) -> Self {
        self.user_agent = None;
        self
    }

    pub fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    pub fn with_accept_encoding(mut self, accept: bool) -> Self {
        self.accept_encoding = accept;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_fallback_sleep(mut self, sleep: Duration) -> Self {
        self.fallback_sleep = sleep;
        self
    }

    pub fn with_default_concurrency(mut self, concurrency: usize) -> Self {
        self.default_concurrency = concurrency;
        self
    }

    pub fn with_default_per_host(mut self, per_host: usize) -> Self {
        self.default_per_host = per_host;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ClientConfig::default();
        assert!(cfg.user_agent.as_deref().unwrap().starts_with("courier/"));
        assert_eq!(cfg.poll_interval, Duration::from_millis(10));
        assert_eq!(cfg.fallback_sleep, Duration::from_millis(2));
        assert_eq!(cfg.default_concurrency, 10);
        assert_eq!(cfg.default_per_host, 1);
    }

    #[test]
    fn with_methods_chain() {
        let cfg = ClientConfig::default()
            .without_user_agent()
            .with_default_concurrency(4)
            .with_poll_interval(Duration::from_millis(1));
        assert!(cfg.user_agent.is_none());
        assert_eq!(cfg.default_concurrency, 4);
        assert_eq!(cfg.poll_interval, Duration::from_millis(1));
    }
}
