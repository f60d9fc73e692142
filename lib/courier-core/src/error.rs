//! Error types for courier.
//!
//! Every failure is an [`Error`] value. Wrapping variants ([`Error::Context`],
//! [`Error::RetriesExceeded`], [`Error::InvalidDirective`], ...) keep the
//! wrapped error, and [`Error::is`] tests for a kind anywhere in the chain:
//!
//! ```
//! use courier_core::{Error, ErrorKind};
//!
//! let err = Error::retries_exceeded(Error::connection("refused"))
//!     .context("api: GET mock://hostname/users");
//!
//! assert!(err.is(ErrorKind::RetriesExceeded));
//! assert!(err.is(ErrorKind::Connection));
//! assert!(!err.is(ErrorKind::Timeout));
//! ```

use derive_more::{Display, Error, From};

use crate::Response;

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Network/connection errors raised by a transport.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors raised by a transport.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout or expired deadline.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// A URL could not be parsed or joined.
    #[display("invalid url: {_0}")]
    #[from(skip)]
    InvalidUrl(#[error(not(source))] String),

    /// One or more client options failed.
    #[display("error initialising client: {}", join_errors(_0))]
    #[from(skip)]
    InitialisingClient(#[error(not(source))] Vec<Error>),

    /// Adds diagnostic context (client name, method, url) to an error.
    #[display("{context}: {source}")]
    #[from(skip)]
    Context {
        /// Context prefix.
        context: String,
        /// The wrapped error.
        source: Box<Error>,
    },

    /// A request option failed; `position` is 1-based.
    #[display("request option #{position}: {source}")]
    #[from(skip)]
    RequestOption {
        /// Position of the failing option.
        position: usize,
        /// The option's error.
        source: Box<Error>,
    },

    /// A reserved directive header carried a malformed value.
    #[display("invalid request headers: {header}: {source}")]
    #[from(skip)]
    InvalidDirective {
        /// The reserved header key.
        header: String,
        /// The parse failure.
        source: Box<Error>,
    },

    /// A value expected to be JSON could not be parsed.
    #[display("invalid json: {_0}")]
    #[from(skip)]
    InvalidJson(serde_json::Error),

    /// A value expected to be an unsigned integer could not be parsed.
    #[display("invalid number: {_0}")]
    #[from]
    InvalidNumber(std::num::ParseIntError),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Query string or form serialization error.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// Multipart encoding or decoding error.
    #[display("multipart: {_0}")]
    #[from(skip)]
    Multipart(#[error(not(source))] String),

    /// Every configured retry failed; wraps the last transport error.
    #[display("http retries exceeded: {source}")]
    #[from(skip)]
    RetriesExceeded {
        /// The last transport error.
        source: Box<Error>,
    },

    /// The response status is not one of the acceptable codes.
    #[display("unexpected status code: {}", status_text(*status))]
    #[from(skip)]
    UnexpectedStatus {
        /// Received status code.
        status: u16,
        /// The response, body still unread.
        response: Box<Response>,
    },

    /// A response body was required but the response had none.
    #[display("response body was empty")]
    #[from(skip)]
    NoResponseBody {
        /// The response (with an empty body).
        response: Box<Response>,
    },

    /// The response body could not be read.
    #[display("error reading response body: {source}")]
    #[from(skip)]
    ReadingBody {
        /// The read failure.
        source: Box<Error>,
        /// The response shell (empty body, zero content length).
        response: Box<Response>,
    },

    /// A mock transport received a request it was not expecting.
    #[display("unexpected request")]
    #[from(skip)]
    UnexpectedRequest,

    /// A mock transport's expectations were not met.
    #[display("{name}: expectations not met: [\n{}]", indent_failures(failures))]
    #[from(skip)]
    ExpectationsNotMet {
        /// Name of the mock client.
        name: String,
        /// Every failure line, in report order.
        failures: Vec<String>,
    },

    /// Expectations were changed after the mock started handling requests.
    #[display("{name}: expectations cannot be changed: {reason}")]
    #[from(skip)]
    CannotChangeExpectations {
        /// Name of the mock client.
        name: String,
        /// Why the change was refused.
        reason: String,
    },

    /// A mock response could not be synthesized.
    #[display("invalid mock response: {_0}")]
    #[from(skip)]
    InvalidMockResponse(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error kind, used to test an error (or anything it wraps) with [`Error::is`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorKind {
    Connection,
    Tls,
    Timeout,
    InvalidRequest,
    InvalidUrl,
    InitialisingClient,
    RequestOption,
    InvalidDirective,
    InvalidJson,
    InvalidNumber,
    JsonSerialization,
    JsonDeserialization,
    QuerySerialization,
    Multipart,
    RetriesExceeded,
    UnexpectedStatus,
    NoResponseBody,
    ReadingBody,
    UnexpectedRequest,
    ExpectationsNotMet,
    CannotChangeExpectations,
    InvalidMockResponse,
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn indent_failures(failures: &[String]) -> String {
    failures.iter().map(|line| format!("   {line}\n")).collect()
}

fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| status.to_string(), |reason| format!("{status} {reason}"))
}

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid URL error.
    #[must_use]
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl(message.into())
    }

    /// Create a multipart error.
    #[must_use]
    pub fn multipart(message: impl Into<String>) -> Self {
        Self::Multipart(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a transport error once retries are exhausted.
    #[must_use]
    pub fn retries_exceeded(last: Self) -> Self {
        Self::RetriesExceeded {
            source: Box::new(last),
        }
    }

    /// Prefix this error with diagnostic context.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The kind of this error; [`Error::Context`] reports the kind it wraps.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Tls(_) => ErrorKind::Tls,
            Self::Timeout => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::InitialisingClient(_) => ErrorKind::InitialisingClient,
            Self::Context { source, .. } => source.kind(),
            Self::RequestOption { .. } => ErrorKind::RequestOption,
            Self::InvalidDirective { .. } => ErrorKind::InvalidDirective,
            Self::InvalidJson(_) => ErrorKind::InvalidJson,
            Self::InvalidNumber(_) => ErrorKind::InvalidNumber,
            Self::JsonSerialization(_) => ErrorKind::JsonSerialization,
            Self::JsonDeserialization { .. } => ErrorKind::JsonDeserialization,
            Self::QuerySerialization(_) => ErrorKind::QuerySerialization,
            Self::Multipart(_) => ErrorKind::Multipart,
            Self::RetriesExceeded { .. } => ErrorKind::RetriesExceeded,
            Self::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
            Self::NoResponseBody { .. } => ErrorKind::NoResponseBody,
            Self::ReadingBody { .. } => ErrorKind::ReadingBody,
            Self::UnexpectedRequest => ErrorKind::UnexpectedRequest,
            Self::ExpectationsNotMet { .. } => ErrorKind::ExpectationsNotMet,
            Self::CannotChangeExpectations { .. } => ErrorKind::CannotChangeExpectations,
            Self::InvalidMockResponse(_) => ErrorKind::InvalidMockResponse,
        }
    }

    /// Errors directly wrapped by this one.
    fn wrapped(&self) -> Vec<&Self> {
        match self {
            Self::Context { source, .. }
            | Self::RequestOption { source, .. }
            | Self::InvalidDirective { source, .. }
            | Self::RetriesExceeded { source }
            | Self::ReadingBody { source, .. } => vec![source.as_ref()],
            Self::InitialisingClient(errors) => errors.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if this error, or any error it wraps, is of `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind || self.wrapped().into_iter().any(|inner| inner.is(kind))
    }

    /// The response carried by this error (through any wrapping), if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::UnexpectedStatus { response, .. }
            | Self::NoResponseBody { response }
            | Self::ReadingBody { response, .. } => Some(response),
            Self::Context { source, .. } | Self::RetriesExceeded { source } => source.response(),
            _ => None,
        }
    }

    /// Consume the error, returning the response it carries, if any.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::UnexpectedStatus { response, .. }
            | Self::NoResponseBody { response }
            | Self::ReadingBody { response, .. } => Some(*response),
            Self::Context { source, .. } | Self::RetriesExceeded { source } => {
                source.into_response()
            }
            _ => None,
        }
    }

    /// Returns the status code of a carried response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(Response::status)
    }

    /// Returns `true` if this is (or wraps) a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.is(ErrorKind::Timeout)
    }

    /// Returns `true` if this is (or wraps) a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.is(ErrorKind::Connection)
    }
}
