//! HTTP client decorator with retries, status acceptance and body handling.
//!
//! A [`Client`] joins request paths onto a base URL, applies
//! [`RequestOption`]s and submits requests through a [`Transport`]:
//! - failed submissions are retried at once, up to a configurable count
//! - responses with an unacceptable status are returned as errors
//! - bodies are read into memory unless streaming was requested
//!
//! The default transport is [`HyperTransport`]; [`mock`] provides a
//! transport for testing code built on a client.
//!
//! # Example
//!
//! ```no_run
//! use courier::{Client, option};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> courier::Result<()> {
//! let client = Client::builder("users")
//!     .base_url("https://api.example.com")
//!     .max_retries(2)
//!     .build()?;
//!
//! let response = client
//!     .get("/users/42", [option::accept_json(), option::accept_status([404])])
//!     .await?;
//! if response.status() == 200 {
//!     let user: User = response.json().await?;
//!     println!("{} is user {}", user.name, user.id);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connector;
mod hyper_transport;
pub mod middleware;
pub mod mock;
pub mod prelude;

pub use client::{Client, ClientBuilder};
pub use config::TransportConfig;
pub use connector::https_connector;
pub use hyper_transport::HyperTransport;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use courier_core::{
    ACCEPT_STATUS_HEADER, Body, BodyStream, BoxTransport, ContentType, DEFAULT_ACCEPT_STATUS,
    Directives, Error, ErrorKind, ExecutionPolicy, Headers, MAX_RETRIES_HEADER, Method,
    RESERVED_HEADERS, RESPONSE_BODY_REQUIRED_HEADER, Request, RequestOption, Response, Result,
    STREAM_RESPONSE_HEADER, Transport, TransportFuture, apply_options, canonical_header_key,
    from_json, join_url, map_from_multipart_form_data, to_form, to_json, to_query_string,
    unmarshal_json,
};
pub use courier_core::{multipart, option};

pub use url;
