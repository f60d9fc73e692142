//! Execution engine tests using a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use assert2::{check, let_assert};
use bytes::Bytes;
use courier::{
    Body, Client, Error, ErrorKind, Headers, MAX_RETRIES_HEADER, Method, Request, Response, Result,
    Transport, option,
};
use futures_util::stream;

/// Transport replaying a fixed list of outcomes and recording every request.
#[derive(Default)]
struct Scripted {
    outcomes: Mutex<VecDeque<Result<Response>>>,
    seen: Mutex<Vec<Request>>,
}

impl Scripted {
    fn new(outcomes: impl IntoIterator<Item = Result<Response>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> usize {
        self.seen.lock().expect("lock").len()
    }

    fn requests(&self) -> Vec<Request> {
        self.seen.lock().expect("lock").clone()
    }
}

impl Transport for Scripted {
    async fn submit(&self, request: Request) -> Result<Response> {
        let attempt = {
            let mut seen = self.seen.lock().expect("lock");
            seen.push(request);
            seen.len()
        };
        self.outcomes
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(Error::connection(format!("refused #{attempt}"))))
    }
}

fn client(transport: &Arc<Scripted>, max_retries: u32) -> Client {
    Client::builder("api")
        .base_url("http://example.com")
        .max_retries(max_retries)
        .transport(Arc::clone(transport))
        .build()
        .expect("client")
}

fn response(status: u16, body: impl Into<Body>) -> Result<Response> {
    Ok(Response::new(status, Headers::new(), body.into()))
}

#[tokio::test]
async fn retries_are_bounded_by_max_retries() {
    let transport = Scripted::failing();
    let client = client(&transport, 3);

    let_assert!(Err(err) = client.get("/items", []).await);

    check!(transport.calls() == 4);
    check!(err.is(ErrorKind::RetriesExceeded));
    check!(err.is(ErrorKind::Connection));
    insta::assert_snapshot!(err.to_string(), @"api: GET http://example.com/items: http retries exceeded: connection error: refused #4");
}

#[tokio::test]
async fn without_retries_the_transport_error_is_returned() {
    let transport = Scripted::failing();
    let client = client(&transport, 0);

    let_assert!(Err(err) = client.get("/items", []).await);

    check!(transport.calls() == 1);
    check!(!err.is(ErrorKind::RetriesExceeded));
    check!(err.is(ErrorKind::Connection));
}

#[tokio::test]
async fn retry_succeeds_after_failures() {
    let transport = Scripted::new([
        Err(Error::Timeout),
        Err(Error::connection("reset")),
        response(200, "ok"),
    ]);
    let client = client(&transport, 5);

    let_assert!(Ok(response) = client.get("/items", []).await);

    check!(transport.calls() == 3);
    check!(response.status() == 200);
}

#[tokio::test]
async fn per_request_retries_override_the_client_default() {
    let transport = Scripted::failing();
    let client = client(&transport, 5);

    let_assert!(Err(_) = client.get("/items", [option::max_retries(1)]).await);
    check!(transport.calls() == 2);
}

#[tokio::test]
async fn accepted_status_after_retries() {
    let transport = Scripted::new([
        Err(Error::connection("refused")),
        Err(Error::connection("refused")),
        response(404, r#"{"e":"not found"}"#),
    ]);
    let client = client(&transport, 2);

    let_assert!(Ok(response) = client.get("/items/1", [option::accept_status([404])]).await);

    check!(transport.calls() == 3);
    check!(response.status() == 404);
    check!(response.content_length() == Some(17));
    let_assert!(Ok(body) = response.text().await);
    check!(body == r#"{"e":"not found"}"#);
}

#[tokio::test]
async fn unacceptable_status_carries_the_response() {
    let transport = Scripted::new([response(404, "missing")]);
    let client = client(&transport, 0);

    let_assert!(Err(err) = client.get("/items/1", []).await);

    check!(err.is(ErrorKind::UnexpectedStatus));
    check!(err.status() == Some(404));
    insta::assert_snapshot!(err.to_string(), @"api: GET http://example.com/items/1: unexpected status code: 404 Not Found");

    let_assert!(Some(response) = err.into_response());
    let_assert!(Ok(body) = response.text().await);
    check!(body == "missing");
}

#[tokio::test]
async fn status_200_is_always_acceptable() {
    let transport = Scripted::new([response(200, "")]);
    let client = client(&transport, 0);

    let_assert!(Ok(_) = client.get("/", [option::accept_status([201, 202])]).await);
}

#[tokio::test]
async fn body_is_materialized() {
    let chunks = stream::iter([Ok(Bytes::from_static(b"hello, ")), Ok(Bytes::from_static(b"world"))]);
    let transport = Scripted::new([Ok(Response::new(200, Headers::new(), Body::from_stream(chunks)))]);
    let client = client(&transport, 0);

    let_assert!(Ok(response) = client.get("/", []).await);

    check!(response.content_length() == Some(12));
    let_assert!(Some(bytes) = response.body().as_bytes());
    check!(bytes.as_ref() == b"hello, world");
}

#[tokio::test]
async fn empty_body_becomes_no_body() {
    let chunks = stream::iter(Vec::<Result<Bytes>>::new());
    let transport = Scripted::new([Ok(Response::new(204, Headers::new(), Body::from_stream(chunks)))]);
    let client = client(&transport, 0);

    let_assert!(Ok(response) = client.get("/", [option::accept_status([204])]).await);

    check!(response.body().is_no_body());
    check!(response.content_length() == Some(0));
}

#[tokio::test]
async fn required_body_must_not_be_empty() {
    let transport = Scripted::new([response(200, Body::Empty)]);
    let client = client(&transport, 0);

    let_assert!(Err(err) = client.get("/", [option::response_body_required()]).await);

    check!(err.is(ErrorKind::NoResponseBody));
    let_assert!(Some(response) = err.response());
    check!(response.content_length() == Some(0));
}

#[tokio::test]
async fn body_read_failure_keeps_the_response_shell() {
    let chunks = stream::iter([Ok(Bytes::from_static(b"partial")), Err(Error::connection("reset"))]);
    let transport = Scripted::new([Ok(Response::new(200, Headers::new(), Body::from_stream(chunks)))]);
    let client = client(&transport, 3);

    let_assert!(Err(err) = client.get("/", []).await);

    check!(transport.calls() == 1);
    check!(err.is(ErrorKind::ReadingBody));
    let_assert!(Some(response) = err.response());
    check!(response.status() == 200);
    check!(response.body().is_no_body());
    check!(response.content_length() == Some(0));
}

#[tokio::test]
async fn streamed_body_is_passed_through() {
    let chunks = stream::iter([Ok(Bytes::from_static(b"chunk"))]);
    let streamed = Response::new(200, Headers::new(), Body::from_stream(chunks)).with_content_length(None);
    let transport = Scripted::new([Ok(streamed)]);
    let client = client(&transport, 0);

    let_assert!(Ok(response) = client.get("/", [option::stream_response()]).await);

    check!(response.body().is_stream());
    check!(response.content_length().is_none());
    let_assert!(Ok(body) = response.text().await);
    check!(body == "chunk");
}

#[tokio::test]
async fn directive_headers_never_reach_the_transport() {
    let transport = Scripted::failing();
    let client = client(&transport, 0);

    let result = client
        .get(
            "/",
            [
                option::non_canonical_header("x-courier-max-retries", "2"),
                option::header("X-Courier-Stream-Response", "true"),
                option::header("Accept", "application/json"),
            ],
        )
        .await;

    let_assert!(Err(err) = result);
    check!(err.is(ErrorKind::RetriesExceeded));
    check!(transport.calls() == 3);
    for request in transport.requests() {
        let keys: Vec<&str> = request.headers().iter().map(|(key, _)| key).collect();
        check!(keys == vec!["Accept"]);
    }
}

#[tokio::test]
async fn malformed_directive_fails_before_submission() {
    let transport = Scripted::failing();
    let client = client(&transport, 0);

    let_assert!(Err(err) = client.get("/", [option::header(MAX_RETRIES_HEADER, "many")]).await);

    check!(transport.calls() == 0);
    check!(err.is(ErrorKind::InvalidDirective));
    check!(err.is(ErrorKind::InvalidNumber));
    insta::assert_snapshot!(err.to_string(), @"api: GET http://example.com/: invalid request headers: X-Courier-Max-Retries: invalid number: invalid digit found in string");

    let_assert!(Err(err) = client.get("/", [option::header("X-Courier-Accept-Status", "404")]).await);
    check!(err.is(ErrorKind::InvalidJson));
}

#[tokio::test]
async fn request_construction_errors_name_the_client_and_method() {
    let transport = Scripted::failing();
    let client = client(&transport, 0);

    let result = client
        .post("/items", [option::bearer_token(|_| Err(Error::invalid_request("expired")))])
        .await;

    let_assert!(Err(err) = result);
    check!(transport.calls() == 0);
    insta::assert_snapshot!(err.to_string(), @"api: POST: request option #1: bearer token: invalid request: expired");
}

#[tokio::test]
async fn execute_accepts_prebuilt_requests() {
    let transport = Scripted::new([response(201, "created")]);
    let client = client(&transport, 0);

    let request = client
        .new_request(
            Method::Put,
            "/items/7",
            [
                option::json_body(&serde_json::json!({"id": 7})),
                option::accept_status([201]),
            ],
        )
        .expect("request");
    check!(request.header("Content-Type") == Some("application/json"));

    let_assert!(Ok(response) = client.execute(request).await);
    check!(response.status() == 201);

    let sent_requests = transport.requests();
    let_assert!([sent] = sent_requests.as_slice());
    check!(sent.method() == Method::Put);
    check!(sent.body().map(Bytes::as_ref) == Some(br#"{"id":7}"#.as_slice()));
}

#[tokio::test]
async fn accept_status_accumulates() {
    let transport = Scripted::new([response(401, "denied"), response(404, "missing"), response(200, "ok")]);
    let client = client(&transport, 0);
    let options = || [option::accept_status([404]), option::accept_status([401])];

    let_assert!(Ok(denied) = client.get("/", options()).await);
    check!(denied.status() == 401);
    let_assert!(Ok(missing) = client.get("/", options()).await);
    check!(missing.status() == 404);
    let_assert!(Ok(ok) = client.get("/", options()).await);
    check!(ok.status() == 200);
}

#[tokio::test]
async fn stream_response_skips_body_requirement() {
    let chunks = stream::iter(Vec::<Result<Bytes>>::new());
    let transport = Scripted::new([Ok(Response::new(200, Headers::new(), Body::from_stream(chunks)))]);
    let client = client(&transport, 0);

    let result = client
        .get("/", [option::response_body_required(), option::stream_response()])
        .await;

    let_assert!(Ok(response) = result);
    check!(response.body().is_stream());
    check!(response.content_length().is_none());
}
