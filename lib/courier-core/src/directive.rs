//! Per-request execution directives.
//!
//! Directives tune how a client executes one request: how many times to
//! retry, which status codes to accept, whether a body is required and
//! whether to stream the response. They are normally attached as typed
//! [`Directives`] by the options in [`crate::option`]. Requests built by other
//! means may carry them in the reserved headers below instead; the client
//! parses and strips those headers in [`ExecutionPolicy::resolve`] so they
//! never reach a transport.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{Error, Request, Result};

/// Overrides the client's maximum retry count (decimal integer).
pub const MAX_RETRIES_HEADER: &str = "X-Courier-Max-Retries";

/// Adds acceptable status codes (JSON array of integers).
pub const ACCEPT_STATUS_HEADER: &str = "X-Courier-Accept-Status";

/// Requires a non-empty response body (`"true"`).
pub const RESPONSE_BODY_REQUIRED_HEADER: &str = "X-Courier-Response-Body-Required";

/// Leaves the response body unread (`"true"`).
pub const STREAM_RESPONSE_HEADER: &str = "X-Courier-Stream-Response";

/// Every reserved directive header.
pub const RESERVED_HEADERS: [&str; 4] = [
    MAX_RETRIES_HEADER,
    ACCEPT_STATUS_HEADER,
    RESPONSE_BODY_REQUIRED_HEADER,
    STREAM_RESPONSE_HEADER,
];

/// The status code accepted by every request.
pub const DEFAULT_ACCEPT_STATUS: u16 = 200;

/// Typed directives attached to a [`Request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    max_retries: Option<u32>,
    accept_status: BTreeSet<u16>,
    response_body_required: bool,
    stream_response: bool,
}

impl Directives {
    /// Overrides the client's maximum retry count.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = Some(max_retries);
    }

    /// Adds acceptable status codes; codes accumulate across calls.
    pub fn accept_status(&mut self, codes: impl IntoIterator<Item = u16>) {
        self.accept_status.extend(codes);
    }

    /// Requires a non-empty response body.
    pub fn require_response_body(&mut self) {
        self.response_body_required = true;
    }

    /// Leaves the response body unread.
    pub fn stream(&mut self) {
        self.stream_response = true;
    }

    /// The per-request retry override.
    #[must_use]
    pub const fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// The effective acceptable status codes, always including 200.
    #[must_use]
    pub fn acceptable_status(&self) -> BTreeSet<u16> {
        let mut codes = self.accept_status.clone();
        codes.insert(DEFAULT_ACCEPT_STATUS);
        codes
    }

    /// Whether a non-empty response body is required.
    #[must_use]
    pub const fn is_response_body_required(&self) -> bool {
        self.response_body_required
    }

    /// Whether the response is streamed.
    #[must_use]
    pub const fn is_stream_response(&self) -> bool {
        self.stream_response
    }
}

/// The resolved execution policy for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Acceptable response status codes.
    pub accept_status: BTreeSet<u16>,
    /// Fail with [`Error::NoResponseBody`] on an empty body.
    pub response_body_required: bool,
    /// Return the live response without reading its body.
    pub stream_response: bool,
}

impl ExecutionPolicy {
    /// Resolves the policy for `request`, removing every reserved header.
    ///
    /// Typed directives override `default_max_retries`; a reserved header,
    /// when present, overrides both. Acceptable status codes are the union
    /// of 200, the typed codes and the header codes. Reserved headers are
    /// matched ignoring case and are always removed, even when parsing
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDirective`] for the first malformed header,
    /// wrapping [`Error::InvalidNumber`] or [`Error::InvalidJson`].
    pub fn resolve(request: &mut Request, default_max_retries: u32) -> Result<Self> {
        let directives = request.directives();
        let mut policy = Self {
            max_retries: directives.max_retries().unwrap_or(default_max_retries),
            accept_status: directives.acceptable_status(),
            response_body_required: directives.is_response_body_required(),
            stream_response: directives.is_stream_response(),
        };

        let headers = request.headers_mut();
        let mut first_error = None;
        for header in RESERVED_HEADERS {
            let Some(values) = headers.remove_ignore_case(header) else {
                continue;
            };
            let Some(value) = values.first() else {
                continue;
            };
            if let Err(source) = policy.apply_header(header, value) {
                first_error.get_or_insert(Error::InvalidDirective {
                    header: header.to_string(),
                    source: Box::new(source),
                });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(
                    max_retries = policy.max_retries,
                    accept_status = ?policy.accept_status,
                    response_body_required = policy.response_body_required,
                    stream_response = policy.stream_response,
                    "resolved execution policy"
                );
                Ok(policy)
            }
        }
    }

    fn apply_header(&mut self, header: &str, value: &str) -> Result<()> {
        match header {
            MAX_RETRIES_HEADER => self.max_retries = value.parse()?,
            ACCEPT_STATUS_HEADER => {
                let codes: Vec<u16> = serde_json::from_str(value).map_err(Error::InvalidJson)?;
                self.accept_status.extend(codes);
            }
            RESPONSE_BODY_REQUIRED_HEADER => self.response_body_required = value == "true",
            STREAM_RESPONSE_HEADER => self.stream_response = value == "true",
            _ => {}
        }
        Ok(())
    }

    /// Returns `true` if `status` is acceptable.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        self.accept_status.contains(&status)
    }
}
