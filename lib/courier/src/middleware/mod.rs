//! Transport decorators.
//!
//! Decorators are [`tower::Layer`]s over a transport: each wraps one
//! [`Transport`](courier_core::Transport) inside another. Add them to a client
//! with [`ClientBuilder::layer`](crate::ClientBuilder::layer) (or to a mock
//! client with [`MockClientBuilder::layer`](crate::mock::MockClientBuilder::layer));
//! the last layer added is the outermost.
//!
//! - [`LoggingLayer`] - Logs submissions using `tracing`

mod logging;

pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower types for convenience
pub use tower::Layer;
