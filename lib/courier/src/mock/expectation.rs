use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use courier_core::{Error, Method, Request, canonical_header_key};

use super::MockState;
use super::response::{MockResponse, MockResponseHandle};

/// One anticipated request, in registration order.
#[derive(Debug)]
pub(crate) struct Expectation {
    pub(crate) expected: bool,
    pub(crate) method: Option<Method>,
    pub(crate) url: String,
    headers: BTreeMap<String, Option<String>>,
    body: Option<Bytes>,
    pub(crate) actual: Option<Request>,
    pub(crate) response: Option<MockResponse>,
}

impl Expectation {
    pub(crate) const fn new(method: Option<Method>, url: String) -> Self {
        Self {
            expected: true,
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            actual: None,
            response: None,
        }
    }

    /// The header line of a failed expectation.
    pub(crate) fn describe(&self) -> String {
        let method = self
            .method
            .map_or_else(|| "<ANY METHOD>".to_string(), |method| method.to_string());
        format!("{method} {}", self.url)
    }

    /// Report lines describing how the actual request missed this
    /// expectation; empty when satisfied.
    pub(crate) fn check(&self) -> Vec<String> {
        match (&self.actual, self.expected) {
            (None, false) => Vec::new(),
            (Some(actual), false) => vec![format!("  got: {} {}", actual.method(), actual.url())],
            (None, true) => vec!["  got: <no request>".to_string()],
            (Some(actual), true) => {
                let mut report = self.check_method(actual);
                report.extend(self.check_url(actual));
                report.extend(self.check_headers(actual));
                report.extend(self.check_body(actual));
                report
            }
        }
    }

    fn check_method(&self, actual: &Request) -> Vec<String> {
        match self.method {
            Some(method) if method != actual.method() => vec![
                format!("expected method: {method}"),
                format!("   got         : {}", actual.method()),
            ],
            _ => Vec::new(),
        }
    }

    fn check_url(&self, actual: &Request) -> Vec<String> {
        if self.url == actual.url().as_str() {
            return Vec::new();
        }
        let expected = if self.url.is_empty() {
            "<not specified>"
        } else {
            self.url.as_str()
        };
        vec![
            format!("expected url: {expected}"),
            format!("   got      : {}", actual.url()),
        ]
    }

    fn check_headers(&self, actual: &Request) -> Vec<String> {
        let mut report = Vec::new();
        for (key, expected) in &self.headers {
            let Some(value) = actual.headers().get(key) else {
                match expected {
                    Some(expected) => report.push(format!("header not set: {key}: {expected}")),
                    None => report.push(format!("header not set: {key}")),
                }
                report.push("           got: [".to_string());
                for (name, values) in actual.headers().iter() {
                    let first = values.first().map_or("", String::as_str);
                    report.push(format!("             {name}: {first}"));
                }
                report.push("           ]".to_string());
                continue;
            };

            if let Some(expected) = expected
                && expected != value
            {
                report.push(format!("expected header: {key}: {expected}"));
                report.push(format!("   got         : {key}: {value}"));
            }
        }
        report
    }

    fn check_body(&self, actual: &Request) -> Vec<String> {
        let Some(expected) = &self.body else {
            return Vec::new();
        };
        let actual = actual.body().cloned().unwrap_or_default();
        if *expected == actual {
            return Vec::new();
        }

        if expected.is_empty() {
            return vec![
                "expected: <no body>".to_string(),
                format!("   got  : {} bytes", actual.len()),
            ];
        }
        if actual.is_empty() {
            return vec![
                format!("expected: {} bytes", expected.len()),
                "   got  : <no body>".to_string(),
            ];
        }

        let mut report = vec![
            "request body differs from expected".to_string(),
            "   got   :_________".to_string(),
        ];
        report.extend(body_lines(&actual));
        report.push("   wanted:_________".to_string());
        report.extend(body_lines(expected));
        report
    }
}

fn body_lines(body: &[u8]) -> impl Iterator<Item = String> + '_ {
    body.split(|b| *b == b'\n')
        .map(|line| format!("         |{}", String::from_utf8_lossy(line)))
}

/// Configures an expectation registered on a
/// [`MockClient`](super::MockClient).
///
/// ```
/// use courier::mock::new_mock_client;
///
/// let (_client, mock) = new_mock_client("api");
/// mock.expect_post("/items")
///     .with_header_value("Content-Type", "application/json")
///     .with_body(r#"{"name":"widget"}"#)
///     .will_respond()
///     .with_status(201);
/// ```
#[derive(Clone)]
pub struct ExpectationHandle {
    state: Arc<Mutex<MockState>>,
    generation: u64,
    index: usize,
}

impl fmt::Debug for ExpectationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationHandle")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl ExpectationHandle {
    pub(crate) const fn new(state: Arc<Mutex<MockState>>, generation: u64, index: usize) -> Self {
        Self {
            state,
            generation,
            index,
        }
    }

    fn update(self, f: impl FnOnce(&mut Expectation)) -> Self {
        MockState::update(&self.state, self.generation, self.index, f);
        self
    }

    fn expect_header(self, key: String, value: Option<String>) -> Self {
        self.update(|expectation| {
            expectation.headers.insert(key, value);
        })
    }

    /// Requires the request body to be exactly `body`.
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.update(|expectation| expectation.body = Some(body))
    }

    /// Requires a header to be present with any value; the key is
    /// canonicalized.
    pub fn with_header(self, key: &str) -> Self {
        self.expect_header(canonical_header_key(key), None)
    }

    /// Requires a header to be present with `value` as its first value; the
    /// key is canonicalized.
    pub fn with_header_value(self, key: &str, value: impl Into<String>) -> Self {
        self.expect_header(canonical_header_key(key), Some(value.into()))
    }

    /// Requires a header, matching the key exactly as given.
    pub fn with_non_canonical_header(self, key: impl Into<String>) -> Self {
        self.expect_header(key.into(), None)
    }

    /// Requires a header with `value`, matching the key exactly as given.
    pub fn with_non_canonical_header_value(
        self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.expect_header(key.into(), Some(value.into()))
    }

    /// Replaces the response with a fresh one to configure.
    pub fn will_respond(self) -> MockResponseHandle {
        let handle = MockResponseHandle::new(Arc::clone(&self.state), self.generation, self.index);
        self.update(|expectation| expectation.response = Some(MockResponse::default()));
        handle
    }

    /// Fails the matching submission with `err`, discarding any other
    /// response configuration.
    pub fn will_return_error(self, err: Error) {
        self.update(|expectation| expectation.response = Some(MockResponse::error(err)));
    }

    /// Marks the request as one that must not be made. If it is made, the
    /// submission fails and the request is reported.
    pub fn will_not_be_called(self) {
        self.update(|expectation| expectation.expected = false);
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use url::Url;

    use super::*;

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).expect("url"))
    }

    fn expectation(method: Option<Method>, url: &str) -> Expectation {
        Expectation::new(method, url.to_string())
    }

    #[test]
    fn satisfied_expectation_reports_nothing() {
        let mut expected = expectation(Some(Method::Get), "mock://hostname/items");
        expected.actual = Some(request(Method::Get, "mock://hostname/items"));
        check!(expected.check().is_empty());
    }

    #[test]
    fn missing_request() {
        let expected = expectation(None, "mock://hostname/items");
        check!(expected.check() == vec!["  got: <no request>"]);
        check!(expected.describe() == "<ANY METHOD> mock://hostname/items");
    }

    #[test]
    fn not_expected_request() {
        let mut expected = expectation(Some(Method::Delete), "mock://hostname/items/1");
        expected.expected = false;
        check!(expected.check().is_empty());

        expected.actual = Some(request(Method::Delete, "mock://hostname/items/1"));
        check!(expected.check() == vec!["  got: DELETE mock://hostname/items/1"]);
    }

    #[test]
    fn method_and_url_mismatch() {
        let mut expected = expectation(Some(Method::Post), "mock://hostname/a");
        expected.actual = Some(request(Method::Put, "mock://hostname/b"));
        insta::assert_snapshot!(expected.check().join("\n"), @r"
        expected method: POST
           got         : PUT
        expected url: mock://hostname/a
           got      : mock://hostname/b
        ");
    }

    #[test]
    fn blank_url_is_not_a_wildcard() {
        let mut expected = expectation(None, "");
        expected.actual = Some(request(Method::Get, "mock://hostname/a"));
        check!(
            expected.check()
                == vec!["expected url: <not specified>", "   got      : mock://hostname/a"]
        );
    }

    #[test]
    fn header_expectations() {
        let mut actual = request(Method::Get, "mock://hostname/a");
        actual.headers_mut().set("Accept", "text/plain");
        actual.headers_mut().set("X-Trace", "1");

        let mut expected = expectation(Some(Method::Get), "mock://hostname/a");
        expected.headers.insert("Accept".into(), Some("application/json".into()));
        expected.headers.insert("Authorization".into(), None);
        expected.actual = Some(actual);

        insta::assert_snapshot!(expected.check().join("\n"), @r"
        expected header: Accept: application/json
           got         : Accept: text/plain
        header not set: Authorization
                   got: [
                     Accept: text/plain
                     X-Trace: 1
                   ]
        ");
    }

    #[test]
    fn header_presence_with_value_not_set() {
        let mut expected = expectation(Some(Method::Get), "mock://hostname/a");
        expected.headers.insert("x-custom".into(), Some("v".into()));
        expected.actual = Some(request(Method::Get, "mock://hostname/a"));
        check!(
            expected.check()
                == vec!["header not set: x-custom: v", "           got: [", "           ]"]
        );
    }

    #[test]
    fn body_expectations() {
        let mut expected = expectation(Some(Method::Post), "mock://hostname/a");
        expected.body = Some(Bytes::new());
        let mut actual = request(Method::Post, "mock://hostname/a");
        actual.set_body(Some(Bytes::from_static(b"abc")));
        expected.actual = Some(actual);
        check!(expected.check() == vec!["expected: <no body>", "   got  : 3 bytes"]);

        let mut expected = expectation(Some(Method::Post), "mock://hostname/a");
        expected.body = Some(Bytes::from_static(b"abcd"));
        expected.actual = Some(request(Method::Post, "mock://hostname/a"));
        check!(expected.check() == vec!["expected: 4 bytes", "   got  : <no body>"]);

        let mut expected = expectation(Some(Method::Post), "mock://hostname/a");
        expected.body = Some(Bytes::new());
        expected.actual = Some(request(Method::Post, "mock://hostname/a"));
        check!(expected.check().is_empty());
    }

    #[test]
    fn body_diff() {
        let mut expected = expectation(Some(Method::Post), "mock://hostname/a");
        expected.body = Some(Bytes::from_static(b"line 1\nline 2"));
        let mut actual = request(Method::Post, "mock://hostname/a");
        actual.set_body(Some(Bytes::from_static(b"line 1\nline two")));
        expected.actual = Some(actual);

        insta::assert_snapshot!(expected.check().join("\n"), @r"
        request body differs from expected
           got   :_________
                 |line 1
                 |line two
           wanted:_________
                 |line 1
                 |line 2
        ");
    }
}
