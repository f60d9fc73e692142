//! Request/response logging decorator.
//!
//! Logs every submission made through the wrapped transport using the
//! `tracing` crate. Retries made by the client show up as separate
//! submissions.

use std::time::Instant;

use courier_core::{Request, Response, Result, Transport};
use tower::Layer;
use tracing::{Instrument, Level, debug, info, span, warn};

/// Layer that adds request/response logging to a transport.
///
/// # Example
///
/// ```
/// use courier::middleware::LoggingLayer;
/// use courier::mock::MockClient;
///
/// let (client, _mock) = MockClient::builder("api").layer(LoggingLayer::debug()).build();
/// assert_eq!(client.name(), "api");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Log level for the logging decorator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Also log request headers and content length.
    Debug,
    /// Log method, url, status and elapsed time.
    #[default]
    Info,
}

impl LoggingLayer {
    /// Logging layer at [`LogLevel::Info`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging layer at [`LogLevel::Debug`].
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }
}

impl<T> Layer<T> for LoggingLayer {
    type Service = Logging<T>;

    fn layer(&self, inner: T) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Transport that logs requests and responses.
#[derive(Debug, Clone)]
pub struct Logging<T> {
    inner: T,
    level: LogLevel,
}

impl<T> Logging<T> {
    /// Create a new logging transport wrapping the given transport.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            level: LogLevel::Info,
        }
    }

    /// The configured log level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<T: Transport> Transport for Logging<T> {
    async fn submit(&self, request: Request) -> Result<Response> {
        let method = request.method();
        let url = request.url().to_string();
        let span = span!(Level::INFO, "transport_submit", %method, %url);

        async move {
            let start = Instant::now();

            match self.level {
                LogLevel::Debug => {
                    debug!(
                        method = %method,
                        url = %url,
                        headers = ?request.headers(),
                        content_length = request.content_length(),
                        "submitting"
                    );
                }
                LogLevel::Info => {
                    info!(method = %method, url = %url, "submitting");
                }
            }

            let result = self.inner.submit(request).await;

            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match &result {
                Ok(response) => {
                    let status = response.status();
                    if response.is_success() {
                        info!(status, elapsed_ms, "submission completed");
                    } else {
                        warn!(status, elapsed_ms, "submission completed with error status");
                    }
                }
                Err(err) => {
                    warn!(error = %err, elapsed_ms, "submission failed");
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
