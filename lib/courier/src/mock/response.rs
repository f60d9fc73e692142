use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use courier_core::multipart::{MultipartOptions, body_from_map};
use courier_core::{Body, Error, Headers, Response, Result, canonical_header_key, to_json};

use super::MockState;

/// The response a matched expectation produces.
#[derive(Default)]
pub(crate) struct MockResponse {
    status: Option<u16>,
    headers: BTreeMap<String, String>,
    body: Bytes,
    error: Option<Error>,
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("error", &self.error)
            .finish()
    }
}

impl MockResponse {
    pub(crate) fn error(err: Error) -> Self {
        Self {
            error: Some(err),
            ..Self::default()
        }
    }

    /// Produces the transport outcome, consuming the response. The matching
    /// submission takes it out of its expectation.
    pub(crate) fn synthesize(self) -> Result<Response> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let status = self.status.unwrap_or(200);
        if http::StatusCode::from_u16(status).is_err() {
            return Err(Error::InvalidMockResponse(format!("invalid status code {status}")));
        }

        for (key, value) in &self.headers {
            if http::HeaderName::from_bytes(key.as_bytes()).is_err() {
                return Err(Error::InvalidMockResponse(format!("invalid header name {key:?}")));
            }
            if http::HeaderValue::from_str(value).is_err() {
                return Err(Error::InvalidMockResponse(format!(
                    "invalid value for header {key}: {value:?}"
                )));
            }
        }

        let headers = self.headers.into_iter().collect::<Headers>();
        let body = if self.body.is_empty() {
            Body::Empty
        } else {
            Body::Full(self.body)
        };
        Ok(Response::new(status, headers, body))
    }
}

/// The response produced when no response was configured.
pub(crate) fn default_response() -> Response {
    Response::new(200, Headers::new(), Body::Empty)
}

/// Configures the response of an expectation.
///
/// Returned by [`ExpectationHandle::will_respond`](super::ExpectationHandle::will_respond).
/// The response defaults to status 200 with no headers and no body.
#[derive(Clone)]
pub struct MockResponseHandle {
    state: Arc<Mutex<MockState>>,
    generation: u64,
    index: usize,
}

impl fmt::Debug for MockResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResponseHandle")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl MockResponseHandle {
    pub(crate) const fn new(state: Arc<Mutex<MockState>>, generation: u64, index: usize) -> Self {
        Self {
            state,
            generation,
            index,
        }
    }

    fn update(self, f: impl FnOnce(&mut MockResponse)) -> Self {
        MockState::update(&self.state, self.generation, self.index, |expectation| {
            f(expectation.response.get_or_insert_with(MockResponse::default));
        });
        self
    }

    /// Sets the status code.
    pub fn with_status(self, status: u16) -> Self {
        self.update(|response| response.status = Some(status))
    }

    /// Sets a header; the key is canonicalized.
    pub fn with_header(self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.update(|response| {
            response.headers.insert(canonical_header_key(key), value);
        })
    }

    /// Sets a header with the key used as given.
    pub fn with_non_canonical_header(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.update(|response| {
            response.headers.insert(key, value);
        })
    }

    /// Sets the body.
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.update(|response| response.body = body)
    }

    /// Sets the body to the JSON encoding of `value`.
    ///
    /// If `value` cannot be encoded the body describes the failure instead.
    pub fn with_json<T: serde::Serialize + ?Sized>(self, value: &T) -> Self {
        let body = to_json(value)
            .unwrap_or_else(|err| Bytes::from(format!("mock response json: {err}")));
        self.update(|response| response.body = body)
    }

    /// Sets a `multipart/form-data` body built from a map, and the matching
    /// `Content-Type`.
    ///
    /// If the form cannot be encoded the status becomes 500 and the body
    /// describes the failure.
    pub fn with_multipart_form_data_from_map<'a, K, V, I>(
        self,
        items: I,
        options: &MultipartOptions<K, V>,
    ) -> Self
    where
        K: 'a,
        V: 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        let encoded = body_from_map(items, options);
        self.update(|response| match encoded {
            Ok((content_type, body)) => {
                response.headers.insert("Content-Type".to_string(), content_type);
                response.body = body;
            }
            Err(err) => {
                response.status = Some(500);
                response.body = Bytes::from(format!("mock response multipart: {err}"));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use courier_core::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn synthesizes_configured_response() {
        let response = MockResponse {
            status: Some(201),
            headers: BTreeMap::from([("Content-Type".to_string(), "text/plain".to_string())]),
            body: Bytes::from_static(b"created"),
            error: None,
        };

        let_assert!(Ok(synthesized) = response.synthesize());
        check!(synthesized.status() == 201);
        check!(synthesized.header("Content-Type") == Some("text/plain"));
        check!(synthesized.content_length() == Some(7));
        let_assert!(Ok(body) = synthesized.text().await);
        check!(body == "created");
    }

    #[test]
    fn empty_body_synthesizes_no_body() {
        let response = MockResponse::default();
        let_assert!(Ok(synthesized) = response.synthesize());
        check!(synthesized.status() == 200);
        check!(synthesized.body().is_no_body());
    }

    #[test]
    fn configured_error_wins() {
        let response = MockResponse::error(Error::Timeout);
        let_assert!(Err(err) = response.synthesize());
        check!(err.is(ErrorKind::Timeout));
    }

    #[test]
    fn invalid_headers_are_rejected() {
        let response = MockResponse {
            headers: BTreeMap::from([("Bad Header".to_string(), "v".to_string())]),
            ..MockResponse::default()
        };
        let_assert!(Err(err) = response.synthesize());
        check!(err.is(ErrorKind::InvalidMockResponse));

        let response = MockResponse {
            headers: BTreeMap::from([("X-Ok".to_string(), "line\nbreak".to_string())]),
            ..MockResponse::default()
        };
        let_assert!(Err(err) = response.synthesize());
        check!(err.is(ErrorKind::InvalidMockResponse));
    }

    #[test]
    fn invalid_status_is_rejected() {
        let response = MockResponse {
            status: Some(42),
            ..MockResponse::default()
        };
        let_assert!(Err(err) = response.synthesize());
        insta::assert_snapshot!(err.to_string(), @"invalid mock response: invalid status code 42");
    }
}
