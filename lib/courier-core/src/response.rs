//! HTTP response handling.
//!
//! A [`Response`] returned by a client normally holds a materialized
//! [`Body::Full`] (or [`Body::Empty`]); requests sent with the
//! `stream_response` option keep the transport's live [`Body::Stream`].

use bytes::Bytes;

use crate::{Body, Error, Headers, Result};

/// HTTP response with status, headers, body and content length.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Body,
    content_length: Option<u64>,
}

impl Response {
    /// Creates a new response.
    ///
    /// The content length is the body length for a [`Body::Full`] and
    /// unknown otherwise.
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: Body) -> Self {
        let content_length = body.as_bytes().map(|bytes| bytes.len() as u64);
        Self {
            status,
            headers,
            body,
            content_length,
        }
    }

    /// Overrides the content length.
    #[must_use]
    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header, by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Content length, if known.
    #[must_use]
    pub const fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body and content length.
    pub fn set_body(&mut self, body: Body, content_length: Option<u64>) {
        self.body = body;
        self.content_length = content_length;
    }

    /// Takes the body, leaving [`Body::Empty`] behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, Headers, Body) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadingBody`] (carrying the response shell) if a
    /// streaming body fails.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let body = self.take_body();
        body.collect().await.map_err(|source| Error::ReadingBody {
            source: Box::new(source),
            response: Box::new(self.with_content_length(Some(0))),
        })
    }

    /// Reads the body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadingBody`] if the body cannot be read.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads and deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadingBody`] if the body cannot be read and
    /// [`Error::JsonDeserialization`] if it is not valid JSON for `T`.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        crate::from_json(&bytes)
    }
}
