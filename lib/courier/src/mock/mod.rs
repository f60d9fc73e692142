//! A mock transport for testing code that uses a [`Client`].
//!
//! A [`MockClient`] holds an ordered queue of expectations. Each submitted
//! request is matched against the next expectation in the queue, whatever
//! it looks like; differences are only reported when
//! [`MockClient::expectations_were_met`] is called, so a test reads as
//! "expect, act, verify":
//!
//! ```
//! use courier::mock::new_mock_client;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (client, mock) = new_mock_client("inventory");
//! mock.expect_get("/items/1")
//!     .will_respond()
//!     .with_status(200)
//!     .with_body(r#"{"id":1}"#);
//! mock.expect_delete("/items/1").will_not_be_called();
//!
//! let response = client.get("/items/1", []).await.expect("response");
//! assert_eq!(response.status(), 200);
//!
//! assert!(mock.expectations_were_met().is_ok());
//! # }
//! ```
//!
//! Requests arriving once the queue is exhausted fail with
//! [`Error::UnexpectedRequest`] and are reported as unexpected.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_core::{BoxTransport, Error, Method, Request, Response, Result, Transport, join_url};
use tower::Layer;
use tracing::{debug, warn};
use url::Url;

use crate::client::{Client, ClientBuilder};

mod expectation;
mod response;

use self::expectation::Expectation;
pub use self::expectation::ExpectationHandle;
use self::response::default_response;
pub use self::response::MockResponseHandle;

/// Base URL of every mock client.
pub const MOCK_BASE_URL: &str = "mock://hostname";

/// Creates a client backed by a mock transport, and the mock that controls it.
///
/// The client has no retries and no layers; use [`MockClient::builder`] to
/// configure them.
#[must_use]
pub fn new_mock_client(name: impl Into<String>) -> (Client, MockClient) {
    MockClient::builder(name).build()
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    expectations: Vec<Expectation>,
    cursor: Option<usize>,
    unexpected: Vec<Request>,
    started: bool,
    generation: u64,
}

impl MockState {
    fn lock(state: &Mutex<Self>) -> MutexGuard<'_, Self> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the expectation at `index`, unless the mock was reset
    /// since the handle was issued in `generation`.
    pub(crate) fn update(
        state: &Mutex<Self>,
        generation: u64,
        index: usize,
        f: impl FnOnce(&mut Expectation),
    ) {
        let mut state = Self::lock(state);
        if state.generation != generation {
            warn!(index, generation, current = state.generation, "mock was reset, ignoring change");
            return;
        }
        match state.expectations.get_mut(index) {
            Some(expectation) => f(expectation),
            None => warn!(index, "mock expectation no longer exists, ignoring change"),
        }
    }

    fn submit(&mut self, request: Request) -> Result<Response> {
        self.started = true;

        let cursor = self.cursor.filter(|cursor| *cursor < self.expectations.len());
        let Some(expectation) = cursor.and_then(|cursor| self.expectations.get_mut(cursor)) else {
            debug!(method = %request.method(), url = %request.url(), "unexpected request");
            self.unexpected.push(request);
            return Err(Error::UnexpectedRequest);
        };
        self.cursor = cursor.map(|cursor| cursor + 1);

        expectation.actual = Some(request.clone());
        if !expectation.expected {
            debug!(method = %request.method(), url = %request.url(), "request expected not to be made");
            self.unexpected.push(request);
            return Err(Error::UnexpectedRequest);
        }

        debug!(method = %request.method(), url = %request.url(), "matched mock expectation");
        expectation
            .response
            .take()
            .map_or_else(|| Ok(default_response()), response::MockResponse::synthesize)
    }

    fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for (index, expectation) in self.expectations.iter().enumerate() {
            let report = expectation.check();
            if report.is_empty() {
                continue;
            }
            failures.push(format!("request #{}: expecting: {}", index + 1, expectation.describe()));
            failures.extend(report.into_iter().map(|line| format!("   {line}")));
        }

        let offset = self.expectations.len();
        for (index, request) in self.unexpected.iter().enumerate() {
            failures.push(format!(
                "request #{}: unexpected: {} {}",
                offset + index + 1,
                request.method(),
                request.url()
            ));
        }
        failures
    }
}

/// Controls the transport of a mock [`Client`].
///
/// Clones share the same state.
#[derive(Clone)]
pub struct MockClient {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = MockState::lock(&self.state);
        f.debug_struct("MockClient")
            .field("name", &self.name)
            .field("expectations", &state.expectations.len())
            .field("unexpected", &state.unexpected.len())
            .field("started", &state.started)
            .finish()
    }
}

impl MockClient {
    /// Create a builder for a mock client and its [`Client`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> MockClientBuilder {
        MockClientBuilder::new(name)
    }

    /// The mock client name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an expectation for a `method` request to `path`.
    ///
    /// # Panics
    ///
    /// Panics if the mock has already received a request, or if `path`
    /// cannot be joined onto [`MOCK_BASE_URL`].
    pub fn expect(&self, method: Method, path: &str) -> ExpectationHandle {
        self.register(Some(method), path)
    }

    /// Registers an expectation for a request to `path` with any method.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_any(&self, path: &str) -> ExpectationHandle {
        self.register(None, path)
    }

    /// Registers an expectation for a `GET` request.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_get(&self, path: &str) -> ExpectationHandle {
        self.expect(Method::Get, path)
    }

    /// Registers an expectation for a `POST` request.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_post(&self, path: &str) -> ExpectationHandle {
        self.expect(Method::Post, path)
    }

    /// Registers an expectation for a `PUT` request.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_put(&self, path: &str) -> ExpectationHandle {
        self.expect(Method::Put, path)
    }

    /// Registers an expectation for a `PATCH` request.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_patch(&self, path: &str) -> ExpectationHandle {
        self.expect(Method::Patch, path)
    }

    /// Registers an expectation for a `DELETE` request.
    ///
    /// # Panics
    ///
    /// See [`MockClient::expect`].
    pub fn expect_delete(&self, path: &str) -> ExpectationHandle {
        self.expect(Method::Delete, path)
    }

    fn register(&self, method: Option<Method>, path: &str) -> ExpectationHandle {
        let mut state = MockState::lock(&self.state);
        if state.started {
            let err = Error::CannotChangeExpectations {
                name: self.name.clone(),
                reason: "requests have already been made".to_string(),
            };
            drop(state);
            panic!("{err}");
        }

        let url = match join_url(MOCK_BASE_URL, path) {
            Ok(url) => url,
            Err(err) => {
                drop(state);
                panic!("{}: expect {path:?}: {err}", self.name);
            }
        };

        state.expectations.push(Expectation::new(method, url.to_string()));
        if state.cursor.is_none() {
            state.cursor = Some(0);
        }
        let index = state.expectations.len() - 1;
        ExpectationHandle::new(Arc::clone(&self.state), state.generation, index)
    }

    /// Checks every expectation was met and no unexpected request was made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpectationsNotMet`] listing each failed
    /// expectation, in order, followed by each unexpected request.
    pub fn expectations_were_met(&self) -> Result<()> {
        let failures = MockState::lock(&self.state).failures();
        if failures.is_empty() {
            return Ok(());
        }
        Err(Error::ExpectationsNotMet {
            name: self.name.clone(),
            failures,
        })
    }

    /// Requests received that matched no expected request.
    #[must_use]
    pub fn unexpected_requests(&self) -> Vec<Request> {
        MockState::lock(&self.state).unexpected.clone()
    }

    /// Clears every expectation and recorded request, so expectations can be
    /// registered again.
    ///
    /// Handles returned before the reset no longer change anything.
    pub fn reset(&self) {
        let mut state = MockState::lock(&self.state);
        let generation = state.generation + 1;
        *state = MockState {
            generation,
            ..MockState::default()
        };
    }

    fn transport(&self) -> MockTransport {
        MockTransport {
            state: Arc::clone(&self.state),
        }
    }
}

/// The [`Transport`] of a mock client.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").finish_non_exhaustive()
    }
}

impl Transport for MockTransport {
    async fn submit(&self, request: Request) -> Result<Response> {
        MockState::lock(&self.state).submit(request)
    }
}

/// Builder for a mock client.
///
/// ```
/// use courier::mock::MockClient;
/// use courier::middleware::LoggingLayer;
///
/// let (client, mock) = MockClient::builder("api")
///     .max_retries(2)
///     .layer(LoggingLayer::debug())
///     .build();
///
/// assert_eq!(client.max_retries(), 2);
/// assert_eq!(mock.name(), "api");
/// ```
#[derive(Debug)]
pub struct MockClientBuilder {
    mock: MockClient,
    client: ClientBuilder,
}

impl MockClientBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            mock: MockClient {
                name: name.clone(),
                state: Arc::default(),
            },
            client: ClientBuilder::new(name),
        }
    }

    /// Set the client's default maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.client = self.client.max_retries(max_retries);
        self
    }

    /// Decorate the mock transport with a layer; the last layer added is
    /// the outermost.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxTransport> + Send + 'static,
        L::Service: Transport + 'static,
    {
        self.client = self.client.layer(layer);
        self
    }

    /// Build the client and the mock controlling it.
    #[must_use]
    pub fn build(self) -> (Client, MockClient) {
        let client = self
            .client
            .transport(self.mock.transport())
            .build_on(mock_base_url());
        (client, self.mock)
    }
}

#[allow(clippy::expect_used)]
fn mock_base_url() -> Url {
    Url::parse(MOCK_BASE_URL).expect("mock base url is valid")
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use courier_core::{Body, ErrorKind, Headers};

    use super::*;

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, join_url(MOCK_BASE_URL, path).expect("url"))
    }

    #[tokio::test]
    async fn empty_mock_rejects_requests() {
        let (_, mock) = new_mock_client("api");
        let transport = mock.transport();

        let_assert!(Err(err) = transport.submit(request(Method::Get, "/a")).await);
        check!(err.is(ErrorKind::UnexpectedRequest));
        check!(mock.unexpected_requests().len() == 1);

        let_assert!(Err(err) = mock.expectations_were_met());
        insta::assert_snapshot!(err.to_string(), @r"
        api: expectations not met: [
           request #1: unexpected: GET mock://hostname/a
        ]
        ");
    }

    #[tokio::test]
    async fn default_response_is_empty_ok() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/a");

        let_assert!(Ok(response) = mock.transport().submit(request(Method::Get, "/a")).await);
        check!(response.status() == 200);
        check!(response.body().is_no_body());
        check!(mock.expectations_were_met().is_ok());
    }

    #[tokio::test]
    async fn matches_in_order_and_reports_overflow() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/first").will_respond().with_status(201);
        mock.expect_any("/second").will_respond().with_body("two");
        let transport = mock.transport();

        let_assert!(Ok(first) = transport.submit(request(Method::Get, "/first")).await);
        check!(first.status() == 201);
        let_assert!(Ok(second) = transport.submit(request(Method::Put, "/second")).await);
        let_assert!(Ok(body) = second.text().await);
        check!(body == "two");
        let_assert!(Err(_) = transport.submit(request(Method::Get, "/third")).await);

        let_assert!(Err(Error::ExpectationsNotMet { failures, .. }) = mock.expectations_were_met());
        check!(failures == vec!["request #3: unexpected: GET mock://hostname/third"]);
    }

    #[tokio::test]
    async fn not_called_request_is_reported_twice() {
        let (_, mock) = new_mock_client("api");
        mock.expect_delete("/a").will_not_be_called();

        let_assert!(Err(err) = mock.transport().submit(request(Method::Delete, "/a")).await);
        check!(err.is(ErrorKind::UnexpectedRequest));

        let_assert!(Err(err) = mock.expectations_were_met());
        insta::assert_snapshot!(err.to_string(), @r"
        api: expectations not met: [
           request #1: expecting: DELETE mock://hostname/a
                got: DELETE mock://hostname/a
           request #2: unexpected: DELETE mock://hostname/a
        ]
        ");
    }

    #[tokio::test]
    async fn mismatches_are_reported_against_the_expectation() {
        let (_, mock) = new_mock_client("api");
        mock.expect_post("/items").with_header("Authorization");
        mock.expect_get("/missing");

        let mut rq = request(Method::Put, "/items");
        rq.headers_mut().set("Accept", "*/*");
        let _ = mock.transport().submit(rq).await;

        let_assert!(Err(err) = mock.expectations_were_met());
        insta::assert_snapshot!(err.to_string(), @r"
        api: expectations not met: [
           request #1: expecting: POST mock://hostname/items
              expected method: POST
                 got         : PUT
              header not set: Authorization
                         got: [
                           Accept: */*
                         ]
           request #2: expecting: GET mock://hostname/missing
                got: <no request>
        ]
        ");
    }

    #[tokio::test]
    async fn configured_error_is_returned() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/a").will_return_error(Error::connection("refused"));

        let_assert!(Err(err) = mock.transport().submit(request(Method::Get, "/a")).await);
        check!(err.is(ErrorKind::Connection));
        check!(mock.expectations_were_met().is_ok());
    }

    #[tokio::test]
    async fn matched_response_is_consumed() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/a").will_return_error(Error::Timeout);

        let_assert!(Err(err) = mock.transport().submit(request(Method::Get, "/a")).await);
        check!(err.is(ErrorKind::Timeout));

        let state = MockState::lock(&mock.state);
        let_assert!([expectation] = state.expectations.as_slice());
        check!(expectation.response.is_none());
        check!(expectation.actual.is_some());
    }

    #[tokio::test]
    async fn response_headers_are_synthesized() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/a")
            .will_respond()
            .with_header("content-type", "text/plain")
            .with_non_canonical_header("x-lower", "1");

        let_assert!(Ok(response) = mock.transport().submit(request(Method::Get, "/a")).await);
        let expected: Headers = [("Content-Type", "text/plain"), ("x-lower", "1")]
            .into_iter()
            .collect();
        check!(response.headers().iter().eq(expected.iter()));
        let_assert!(Body::Empty = response.into_body());
    }

    #[tokio::test]
    #[should_panic(expected = "api: expectations cannot be changed: requests have already been made")]
    async fn expectations_are_frozen_once_started() {
        let (_, mock) = new_mock_client("api");
        let _ = mock.transport().submit(request(Method::Get, "/a")).await;
        mock.expect_get("/b");
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (_, mock) = new_mock_client("api");
        mock.expect_get("/a");
        let _ = mock.transport().submit(request(Method::Get, "/b")).await;
        check!(mock.expectations_were_met().is_err());

        mock.reset();
        check!(mock.expectations_were_met().is_ok());
        check!(mock.unexpected_requests().is_empty());

        mock.expect_get("/c");
        let_assert!(Ok(_) = mock.transport().submit(request(Method::Get, "/c")).await);
        check!(mock.expectations_were_met().is_ok());
    }

    #[test]
    fn stale_handles_are_ignored() {
        let (_, mock) = new_mock_client("api");
        let handle = mock.expect_get("/a");
        mock.reset();
        handle.will_not_be_called();
        check!(mock.expectations_were_met().is_ok());
    }

    #[tokio::test]
    async fn stale_handles_do_not_touch_new_expectations() {
        let (_, mock) = new_mock_client("api");
        let stale = mock.expect_get("/old");
        let stale_response = mock.expect_get("/older").will_respond();
        mock.reset();
        mock.expect_get("/new");
        mock.expect_get("/newer");

        stale.will_not_be_called();
        stale_response.with_status(500);

        let transport = mock.transport();
        let_assert!(Ok(first) = transport.submit(request(Method::Get, "/new")).await);
        check!(first.status() == 200);
        let_assert!(Ok(second) = transport.submit(request(Method::Get, "/newer")).await);
        check!(second.status() == 200);
        check!(mock.expectations_were_met().is_ok());
    }
}
