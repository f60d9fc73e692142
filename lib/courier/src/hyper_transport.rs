//! The default [`Transport`]: hyper-util with rustls.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use courier_core::{
    Body, Error, Headers, Request, Response, Result, Transport, canonical_header_key,
};
use futures_util::TryStreamExt;
use http_body_util::{BodyStream, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::config::TransportConfig;
use crate::connector::https_connector;

/// Transport submitting requests over the network with hyper-util.
///
/// Connections are pooled per transport and TLS is provided by rustls.
/// The response body is returned as a live [`Body::Stream`]; the client
/// decides whether to read it.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: TransportConfig,
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        let connector = https_connector(config.connect_timeout());

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host())
            .build(connector);

        Self { inner, config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, values) in headers.iter() {
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }

        let body = body.map_or_else(Full::default, Full::new);
        builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    fn extract_headers(headers: &http::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (canonical_header_key(name.as_str()), v.to_string()))
            })
            .collect()
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Transport for HyperTransport {
    async fn submit(&self, request: Request) -> Result<Response> {
        let deadline = self
            .config
            .submission_deadline(Instant::now(), request.deadline());

        debug!(method = %request.method(), url = %request.url(), "submitting request");
        let hyper_request = Self::build_hyper_request(request)?;

        let pending = self.inner.request(hyper_request);
        let response = match deadline {
            Some(deadline) => tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), pending)
                .await
                .map_err(|_| Error::Timeout)?,
            None => pending.await,
        }
        .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());
        let content_length = headers
            .get("Content-Length")
            .and_then(|value| value.parse::<u64>().ok());

        let stream = BodyStream::new(response.into_body())
            .map_ok(|frame| frame.into_data().unwrap_or_default())
            .map_err(|e| Error::connection(e.to_string()));

        Ok(Response::new(status, headers, Body::from_stream(stream)).with_content_length(content_length))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_core::Method;

    use super::*;

    #[test]
    fn transport_config_is_kept() {
        let transport =
            HyperTransport::with_config(TransportConfig::default().with_timeout(Duration::from_secs(60)));
        assert_eq!(transport.config().timeout(), Some(Duration::from_secs(60)));
        assert!(format!("{transport:?}").contains("HyperTransport"));
    }

    #[test]
    fn hyper_request_carries_every_header_value() {
        let url = url::Url::parse("http://localhost/items").expect("url");
        let mut request = Request::new(Method::Post, url);
        request.headers_mut().add("Accept", "text/plain");
        request.headers_mut().add("Accept", "application/json");
        request.set_body(Some(Bytes::from_static(b"{}")));

        let hyper_request = HyperTransport::build_hyper_request(request).expect("request");

        assert_eq!(hyper_request.method(), http::Method::POST);
        assert_eq!(hyper_request.headers().get_all("accept").iter().count(), 2);
    }

    #[test]
    fn response_headers_are_canonicalized() {
        let mut map = http::HeaderMap::new();
        map.insert("content-type", http::HeaderValue::from_static("text/plain"));
        let headers = HyperTransport::extract_headers(&map);
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
    }
}
