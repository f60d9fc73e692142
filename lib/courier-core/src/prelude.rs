//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    Body, BoxTransport, ContentType, Error, ErrorKind, Headers, Method, Request, RequestOption,
    Response, Result, Transport, from_json, to_json, unmarshal_json,
};
