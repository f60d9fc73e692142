//! Core types and contracts for the courier HTTP client.
//!
//! This crate provides the foundational types used by courier:
//! - [`Method`], [`Headers`], [`Request`], [`Response`] and [`Body`]
//! - [`Error`], [`ErrorKind`] and [`Result`] - Error handling
//! - [`Transport`] and [`BoxTransport`] - The submission contract
//! - [`Directives`] and [`ExecutionPolicy`] - Per-request execution policy
//! - [`option`] - Request options
//! - [`multipart`] - Multipart form data encoding and decoding

mod body;
mod decode;
mod directive;
mod error;
mod headers;
mod method;
pub mod multipart;
pub mod option;
pub mod prelude;
mod request;
mod response;
mod transport;

pub use body::{Body, BodyStream, ContentType, from_json, to_form, to_json, to_query_string};
pub use decode::{map_from_multipart_form_data, unmarshal_json};
pub use directive::{
    ACCEPT_STATUS_HEADER, DEFAULT_ACCEPT_STATUS, Directives, ExecutionPolicy, MAX_RETRIES_HEADER,
    RESERVED_HEADERS, RESPONSE_BODY_REQUIRED_HEADER, STREAM_RESPONSE_HEADER,
};
pub use error::{Error, ErrorKind, Result};
pub use headers::{Headers, canonical_header_key};
pub use method::Method;
pub use option::{RequestOption, apply_options};
pub use request::{Request, join_url};
pub use response::Response;
pub use transport::{BoxTransport, Transport, TransportFuture};
