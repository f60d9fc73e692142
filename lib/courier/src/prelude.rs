//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions for
//! easy glob importing:
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::mock::{MockClient, new_mock_client};
pub use crate::{
    Body, Client, ClientBuilder, ContentType, Error, ErrorKind, Headers, HyperTransport, Method,
    Request, RequestOption, Response, Result, Transport, TransportConfig, from_json, option,
    to_json, unmarshal_json,
};
pub use serde::{Deserialize, Serialize};
