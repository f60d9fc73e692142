//! The client: request construction and the execution engine.

use std::fmt;

use courier_core::{
    Body, BoxTransport, Error, ExecutionPolicy, Method, Request, RequestOption, Response, Result,
    Transport, apply_options, join_url,
};
use tower::Layer;
use tracing::{debug, warn};
use url::Url;

use crate::config::TransportConfig;
use crate::hyper_transport::HyperTransport;

type LayerFn = Box<dyn FnOnce(BoxTransport) -> BoxTransport + Send>;

/// HTTP client adding retries, status acceptance and body materialization
/// on top of a [`Transport`].
///
/// A client is immutable once built and cheap to clone.
///
/// # Example
///
/// ```
/// use courier::{Client, option};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> courier::Result<()> {
/// let (client, mock) = courier::mock::new_mock_client("users");
/// mock.expect_get("/users/42")
///     .with_header_value("Accept", "application/json")
///     .will_respond()
///     .with_json(&serde_json::json!({"id": 42}));
///
/// let response = client.get("/users/42", [option::accept_json()]).await?;
/// assert_eq!(response.status(), 200);
/// mock.expectations_were_met()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    name: String,
    base_url: Url,
    transport: BoxTransport,
    max_retries: u32,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder; `name` identifies the client in errors.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name)
    }

    /// The client name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The base URL every request path is joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The default maximum retry count.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Builds a request for `path` relative to the base URL.
    ///
    /// The path is escaped segment by segment (a `?` becomes `%3F`); use the
    /// query options for query strings. Options are applied in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the path cannot be joined, or
    /// [`Error::RequestOption`] for the first failing option.
    pub fn new_request(
        &self,
        method: Method,
        path: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Request> {
        let url = join_url(self.base_url.as_str(), path)?;
        let mut request = Request::new(method, url);
        apply_options(&mut request, options)?;
        Ok(request)
    }

    /// Builds and executes a request.
    ///
    /// # Errors
    ///
    /// Request construction errors are prefixed `"{name}: {METHOD}"`;
    /// execution errors are those of [`Client::execute`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: impl IntoIterator<Item = RequestOption>,
    ) -> Result<Response> {
        let request = self
            .new_request(method, path, options)
            .map_err(|err| err.context(format!("{}: {method}", self.name)))?;
        self.execute(request).await
    }

    /// Builds and executes a `GET` request.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn get(&self, path: &str, options: impl IntoIterator<Item = RequestOption>) -> Result<Response> {
        self.request(Method::Get, path, options).await
    }

    /// Builds and executes a `POST` request.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn post(&self, path: &str, options: impl IntoIterator<Item = RequestOption>) -> Result<Response> {
        self.request(Method::Post, path, options).await
    }

    /// Builds and executes a `PUT` request.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn put(&self, path: &str, options: impl IntoIterator<Item = RequestOption>) -> Result<Response> {
        self.request(Method::Put, path, options).await
    }

    /// Builds and executes a `PATCH` request.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn patch(&self, path: &str, options: impl IntoIterator<Item = RequestOption>) -> Result<Response> {
        self.request(Method::Patch, path, options).await
    }

    /// Builds and executes a `DELETE` request.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn delete(&self, path: &str, options: impl IntoIterator<Item = RequestOption>) -> Result<Response> {
        self.request(Method::Delete, path, options).await
    }

    /// Executes a request.
    ///
    /// 1. The execution policy is resolved from the client default, the
    ///    request's typed directives and any reserved directive headers;
    ///    the reserved headers are removed either way.
    /// 2. The request is submitted. A failed submission is retried at once
    ///    while retries remain, so `n` retries means at most `n + 1`
    ///    submissions. Every transport error is retried.
    /// 3. A status outside the acceptable set fails, carrying the response.
    /// 4. A streamed response is returned as is. Otherwise the body is read
    ///    into memory and the content length set to its size.
    ///
    /// # Errors
    ///
    /// Every error is prefixed `"{name}: {METHOD} {url}"` and is one of:
    /// [`Error::InvalidDirective`], the transport error (no retries),
    /// [`Error::RetriesExceeded`] wrapping the last transport error,
    /// [`Error::UnexpectedStatus`], [`Error::ReadingBody`] or
    /// [`Error::NoResponseBody`].
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let context = format!("{}: {} {}", self.name, request.method(), request.url());
        self.run(request).await.map_err(|err| err.context(context))
    }

    async fn run(&self, mut request: Request) -> Result<Response> {
        let policy = ExecutionPolicy::resolve(&mut request, self.max_retries)?;

        let response = self.submit(&request, policy.max_retries).await?;

        let status = response.status();
        if !policy.accepts(status) {
            warn!(client = %self.name, status, "unexpected status code");
            return Err(Error::UnexpectedStatus {
                status,
                response: Box::new(response),
            });
        }

        if policy.stream_response {
            return Ok(response);
        }

        materialize(response, policy.response_body_required).await
    }

    async fn submit(&self, request: &Request, max_retries: u32) -> Result<Response> {
        let mut remaining = max_retries;
        loop {
            debug!(client = %self.name, method = %request.method(), url = %request.url(), "submitting request");
            match self.transport.submit(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if max_retries == 0 => return Err(err),
                Err(err) if remaining == 0 => {
                    warn!(client = %self.name, error = %err, max_retries, "retries exhausted");
                    return Err(Error::retries_exceeded(err));
                }
                Err(err) => {
                    remaining -= 1;
                    warn!(client = %self.name, error = %err, remaining, "submission failed, retrying");
                }
            }
        }
    }
}

async fn materialize(mut response: Response, body_required: bool) -> Result<Response> {
    match response.take_body().collect().await {
        Err(source) => {
            response.set_body(Body::Empty, Some(0));
            Err(Error::ReadingBody {
                source: Box::new(source),
                response: Box::new(response),
            })
        }
        Ok(bytes) if bytes.is_empty() => {
            response.set_body(Body::Empty, Some(0));
            if body_required {
                return Err(Error::NoResponseBody {
                    response: Box::new(response),
                });
            }
            Ok(response)
        }
        Ok(bytes) => {
            let content_length = bytes.len() as u64;
            response.set_body(Body::Full(bytes), Some(content_length));
            Ok(response)
        }
    }
}

/// Builder for [`Client`].
///
/// Configuration failures are collected and reported together by
/// [`ClientBuilder::build`].
///
/// # Example
///
/// ```
/// use courier::{Client, TransportConfig};
/// use std::time::Duration;
///
/// let client = Client::builder("github")
///     .base_url("https://api.github.com")
///     .max_retries(2)
///     .transport_config(TransportConfig::default().with_timeout(Duration::from_secs(5)))
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(client.max_retries(), 2);
/// ```
pub struct ClientBuilder {
    name: String,
    base_url: Option<Url>,
    transport: Option<BoxTransport>,
    transport_config: TransportConfig,
    max_retries: u32,
    layers: Vec<LayerFn>,
    errors: Vec<Error>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("max_retries", &self.max_retries)
            .field("layers_count", &self.layers.len())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Create a builder; `name` identifies the client in errors.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            transport: None,
            transport_config: TransportConfig::default(),
            max_retries: 0,
            layers: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Set the base URL; it must be absolute.
    #[must_use]
    pub fn base_url(mut self, base_url: &str) -> Self {
        match Url::parse(base_url) {
            Ok(url) if url.cannot_be_a_base() => self.errors.push(Error::invalid_url(format!(
                "{base_url}: URL must be absolute"
            ))),
            Ok(url) => self.base_url = Some(url),
            Err(err) => self
                .errors
                .push(Error::invalid_url(format!("{base_url}: {err}"))),
        }
        self
    }

    /// Set the transport; defaults to a [`HyperTransport`].
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(BoxTransport::new(transport));
        self
    }

    /// Configure the default [`HyperTransport`]; ignored when a transport is set.
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Set the default maximum number of retries (0 by default).
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Decorate the transport with a layer.
    ///
    /// Each layer wraps the transport built so far, so the last layer added
    /// is the outermost.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxTransport> + Send + 'static,
        L::Service: Transport + 'static,
    {
        self.layers
            .push(Box::new(move |transport| BoxTransport::new(layer.layer(transport))));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitialisingClient`] holding every configuration
    /// failure, including a missing base URL.
    pub fn build(mut self) -> Result<Client> {
        let base_url = self.base_url.take();
        match base_url {
            Some(base_url) if self.errors.is_empty() => Ok(self.build_on(base_url)),
            base_url => {
                if base_url.is_none() && self.errors.is_empty() {
                    self.errors.push(Error::invalid_url("no base url configured"));
                }
                Err(Error::InitialisingClient(self.errors))
            }
        }
    }

    pub(crate) fn build_on(self, base_url: Url) -> Client {
        let mut transport = self
            .transport
            .unwrap_or_else(|| BoxTransport::new(HyperTransport::with_config(self.transport_config)));
        for layer in self.layers {
            transport = layer(transport);
        }

        Client {
            name: self.name,
            base_url,
            transport,
            max_retries: self.max_retries,
        }
    }
}
