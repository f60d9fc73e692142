//! HTTP requests.
//!
//! Requests are usually built by a client from a path and a list of
//! [`RequestOption`](crate::RequestOption)s, see [`crate::option`].
//!
//! # Example
//!
//! ```
//! use courier_core::{Method, Request, join_url};
//!
//! let url = join_url("https://api.example.com/v1", "/users/42").expect("valid url");
//! let mut request = Request::new(Method::Get, url);
//! request.headers_mut().set("Accept", "application/json");
//!
//! assert_eq!(request.url().as_str(), "https://api.example.com/v1/users/42");
//! ```

use std::time::Instant;

use bytes::Bytes;
use url::Url;

use crate::{Directives, Error, Headers, Method, Result};

/// An HTTP request with method, URL, headers, optional body and execution
/// directives.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Option<Bytes>,
    directives: Directives,
    deadline: Option<Instant>,
}

impl Request {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
            directives: Directives::default(),
            deadline: None,
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the URL (query manipulation).
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header, by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Replaces the request body.
    pub fn set_body(&mut self, body: Option<Bytes>) {
        self.body = body;
    }

    /// Length of the body in bytes (`0` without a body).
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.body.as_ref().map_or(0, |body| body.len() as u64)
    }

    /// Typed execution directives attached to this request.
    #[must_use]
    pub const fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Mutable access to the execution directives.
    pub fn directives_mut(&mut self) -> &mut Directives {
        &mut self.directives
    }

    /// Deadline after which transports abandon the request.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets (or clears) the deadline.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, Headers, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Joins `path` onto the path of `base`.
///
/// Each path segment is percent-encoded, so a `?` in `path` becomes `%3F`
/// rather than starting a query; use the query options instead. Empty and
/// `.` segments are dropped, `..` removes the previous segment, and a
/// trailing `/` on `path` is preserved.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if `base` is not an absolute URL that can
/// have a path.
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::invalid_url(format!("{base}: {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| Error::invalid_url(format!("{base}: cannot be a base URL")))?;
        segments.pop_if_empty();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                segment => {
                    segments.push(segment);
                }
            }
        }
        if path.ends_with('/') {
            segments.push("");
        }
    }
    Ok(url)
}
