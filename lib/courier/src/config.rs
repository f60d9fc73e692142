//! Settings of the bundled hyper transport.

use std::time::{Duration, Instant};

/// Settings for [`HyperTransport`](crate::HyperTransport).
///
/// Every setting has a `with_*` / `without_*` pair so the defaults can be
/// overridden in a single expression:
///
/// ```
/// use std::time::Duration;
///
/// use courier::TransportConfig;
///
/// let config = TransportConfig::default()
///     .without_timeout()
///     .with_connect_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.timeout(), None);
/// assert_eq!(config.connect_timeout(), Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: usize::MAX,
            pool_idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

impl TransportConfig {
    /// Bound each submission, from sending the request to receiving the
    /// response head.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Only request deadlines bound a submission.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Bound establishing a connection.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Wait for connections as long as the operating system does.
    #[must_use]
    pub const fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Keep at most `count` idle connections per host; 0 disables pooling.
    #[must_use]
    pub const fn with_pool_max_idle_per_host(mut self, count: usize) -> Self {
        self.pool_max_idle_per_host = count;
        self
    }

    /// Close pooled connections idle for longer than `timeout`.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Keep idle connections until the peer closes them.
    #[must_use]
    pub const fn without_pool_idle_timeout(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// The per-submission timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The connect timeout, if any.
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// The idle connection limit per host.
    #[must_use]
    pub const fn pool_max_idle_per_host(&self) -> usize {
        self.pool_max_idle_per_host
    }

    /// The idle connection timeout, if any.
    #[must_use]
    pub const fn pool_idle_timeout(&self) -> Option<Duration> {
        self.pool_idle_timeout
    }

    /// The instant a submission started at `now` must complete by: the
    /// earlier of `request_deadline` and the configured timeout.
    #[must_use]
    pub fn submission_deadline(&self, now: Instant, request_deadline: Option<Instant>) -> Option<Instant> {
        let limit = self.timeout.and_then(|timeout| now.checked_add(timeout));
        match (request_deadline, limit) {
            (Some(deadline), Some(limit)) => Some(deadline.min(limit)),
            (deadline, limit) => deadline.or(limit),
        }
    }
}
