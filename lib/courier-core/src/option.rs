//! Request options.
//!
//! A [`RequestOption`] mutates a [`Request`] before it is executed. Clients
//! apply options in the order given and stop at the first failure, which is
//! reported with its 1-based position.
//!
//! ```
//! use courier_core::option::{self, apply_options};
//! use courier_core::{Method, Request};
//!
//! let url = url::Url::parse("https://api.example.com/items").expect("url");
//! let mut request = Request::new(Method::Get, url);
//! apply_options(
//!     &mut request,
//!     [
//!         option::accept_json(),
//!         option::query_param("page", 2),
//!         option::max_retries(3),
//!     ],
//! )
//! .expect("options");
//!
//! assert_eq!(request.url().as_str(), "https://api.example.com/items?page=2");
//! assert_eq!(request.header("Accept"), Some("application/json"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use url::form_urlencoded;

use crate::multipart::{MultipartOptions, body_from_map};
use crate::{ContentType, Error, Request, Result, canonical_header_key, to_form, to_json, to_query_string};

type ApplyFn = Box<dyn FnOnce(&mut Request) -> Result<()> + Send>;

/// A deferred mutation of a [`Request`].
pub struct RequestOption(ApplyFn);

impl RequestOption {
    /// Wraps a closure as an option.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Request) -> Result<()> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    /// Applies the option.
    ///
    /// # Errors
    ///
    /// Returns the option's own failure.
    pub fn apply(self, request: &mut Request) -> Result<()> {
        (self.0)(request)
    }
}

impl fmt::Debug for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestOption(..)")
    }
}

/// Applies options in order, stopping at the first failure.
///
/// # Errors
///
/// Returns [`Error::RequestOption`] carrying the 1-based position of the
/// failing option; later options are not applied.
pub fn apply_options(
    request: &mut Request,
    options: impl IntoIterator<Item = RequestOption>,
) -> Result<()> {
    for (index, option) in options.into_iter().enumerate() {
        option.apply(request).map_err(|source| Error::RequestOption {
            position: index + 1,
            source: Box::new(source),
        })?;
    }
    Ok(())
}

/// Sets a header, canonicalizing the key.
pub fn header(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let key = canonical_header_key(&key.into());
    let value = value.into();
    RequestOption::new(move |rq| {
        rq.headers_mut().set(key, value);
        Ok(())
    })
}

/// Sets a header using the key exactly as given.
pub fn non_canonical_header(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let key = key.into();
    let value = value.into();
    RequestOption::new(move |rq| {
        rq.headers_mut().set(key, value);
        Ok(())
    })
}

/// Sets the `Content-Type` header.
pub fn content_type(value: impl Into<String>) -> RequestOption {
    header("Content-Type", value)
}

/// Adds an `Accept` header value.
pub fn accept(value: impl Into<String>) -> RequestOption {
    let value = value.into();
    RequestOption::new(move |rq| {
        rq.headers_mut().add("Accept", value);
        Ok(())
    })
}

/// Adds `Accept: application/json`.
pub fn accept_json() -> RequestOption {
    accept(ContentType::Json.as_str())
}

/// Sets the request body.
pub fn body(data: impl Into<Bytes>) -> RequestOption {
    let data = data.into();
    RequestOption::new(move |rq| {
        rq.set_body(Some(data));
        Ok(())
    })
}

/// Sets a JSON body and `Content-Type: application/json`.
///
/// The value is serialized when the option is created; a serialization
/// failure is reported when it is applied.
pub fn json_body<T: serde::Serialize + ?Sized>(value: &T) -> RequestOption {
    encoded_body(to_json(value), ContentType::Json.as_str().to_string())
}

/// Sets a form URL-encoded body and its `Content-Type`.
pub fn form_body<T: serde::Serialize + ?Sized>(value: &T) -> RequestOption {
    encoded_body(to_form(value), ContentType::FormUrlEncoded.as_str().to_string())
}

/// Sets a `multipart/form-data` body built from map items.
///
/// See [`body_from_map`] for how items become parts.
pub fn multipart_form_data_from_map<'a, K, V, I>(
    items: I,
    options: &MultipartOptions<K, V>,
) -> RequestOption
where
    K: 'a,
    V: 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    match body_from_map(items, options) {
        Ok((content_type, data)) => encoded_body(Ok(data), content_type),
        Err(err) => RequestOption::new(move |_| Err(err)),
    }
}

fn encoded_body(encoded: Result<Bytes>, content_type: String) -> RequestOption {
    RequestOption::new(move |rq| {
        let data = encoded?;
        rq.headers_mut().set("Content-Type", content_type);
        rq.set_body(Some(data));
        Ok(())
    })
}

/// Appends query parameters; a `None` value adds the key alone (`?flag`).
///
/// Keys and values are URL encoded. Parameters are appended in iteration
/// order after any existing query.
pub fn query<K, V, I>(params: I) -> RequestOption
where
    K: AsRef<str>,
    V: fmt::Display,
    I: IntoIterator<Item = (K, Option<V>)>,
{
    let encoded: Vec<String> = params
        .into_iter()
        .map(|(key, value)| encode_param(key.as_ref(), value.map(|value| value.to_string()).as_deref()))
        .collect();
    RequestOption::new(move |rq| {
        for param in encoded {
            append_query(rq, &param);
        }
        Ok(())
    })
}

/// Appends query parameters from a map, ordered by key.
pub fn query_map<V: fmt::Display>(params: &BTreeMap<String, Option<V>>) -> RequestOption {
    query(params.iter().map(|(key, value)| (key, value.as_ref())))
}

/// Appends one `key=value` query parameter.
///
/// ```
/// use courier_core::option::{apply_options, query_param};
/// use courier_core::{Method, Request};
///
/// let url = url::Url::parse("http://example.com/").expect("url");
/// let mut request = Request::new(Method::Get, url);
/// apply_options(&mut request, [query_param("'a map'", "key=value")]).expect("query");
///
/// assert_eq!(request.url().query(), Some("%27a+map%27=key%3Dvalue"));
/// ```
pub fn query_param(key: impl AsRef<str>, value: impl fmt::Display) -> RequestOption {
    let encoded = encode_param(key.as_ref(), Some(&value.to_string()));
    RequestOption::new(move |rq| {
        append_query(rq, &encoded);
        Ok(())
    })
}

/// Appends a query key with no value.
pub fn query_flag(key: impl AsRef<str>) -> RequestOption {
    let encoded = encode_param(key.as_ref(), None);
    RequestOption::new(move |rq| {
        append_query(rq, &encoded);
        Ok(())
    })
}

/// Appends the fields of a serializable value as query parameters.
pub fn query_struct<T: serde::Serialize + ?Sized>(value: &T) -> RequestOption {
    let encoded = to_query_string(value);
    RequestOption::new(move |rq| {
        let encoded = encoded?;
        if !encoded.is_empty() {
            append_query(rq, &encoded);
        }
        Ok(())
    })
}

/// Replaces the query string; the value is expected to be URL encoded.
pub fn raw_query(query: impl Into<String>) -> RequestOption {
    let query = query.into();
    RequestOption::new(move |rq| {
        let query = (!query.is_empty()).then_some(query.as_str());
        rq.url_mut().set_query(query);
        Ok(())
    })
}

fn encode_param(key: &str, value: Option<&str>) -> String {
    let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
    match value {
        Some(value) => {
            let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
            format!("{key}={value}")
        }
        None => key,
    }
}

fn append_query(rq: &mut Request, param: &str) {
    let query = match rq.url().query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{param}"),
        _ => param.to_string(),
    };
    rq.url_mut().set_query(Some(&query));
}

/// Adds an `Authorization: Bearer` header with a token obtained from
/// `token` when the option is applied.
///
/// # Errors
///
/// The option fails with the provider's error, prefixed `bearer token`.
pub fn bearer_token<F>(token: F) -> RequestOption
where
    F: FnOnce(&Request) -> Result<String> + Send + 'static,
{
    RequestOption::new(move |rq| {
        let token = token(rq).map_err(|err| err.context("bearer token"))?;
        rq.headers_mut().add("Authorization", format!("Bearer {token}"));
        Ok(())
    })
}

/// Overrides the client's maximum retry count for this request.
pub fn max_retries(max_retries: u32) -> RequestOption {
    RequestOption::new(move |rq| {
        rq.directives_mut().set_max_retries(max_retries);
        Ok(())
    })
}

/// Adds acceptable status codes; 200 is always acceptable.
pub fn accept_status(codes: impl IntoIterator<Item = u16>) -> RequestOption {
    let codes: Vec<u16> = codes.into_iter().collect();
    RequestOption::new(move |rq| {
        rq.directives_mut().accept_status(codes);
        Ok(())
    })
}

/// Requires a non-empty response body.
pub fn response_body_required() -> RequestOption {
    RequestOption::new(|rq| {
        rq.directives_mut().require_response_body();
        Ok(())
    })
}

/// Returns the response without reading its body.
pub fn stream_response() -> RequestOption {
    RequestOption::new(|rq| {
        rq.directives_mut().stream();
        Ok(())
    })
}

/// Sets the request deadline to `timeout` from when the option is applied.
pub fn timeout(timeout: Duration) -> RequestOption {
    RequestOption::new(move |rq| {
        rq.set_deadline(Some(Instant::now() + timeout));
        Ok(())
    })
}

/// Sets the request deadline.
pub fn deadline(deadline: Instant) -> RequestOption {
    RequestOption::new(move |rq| {
        rq.set_deadline(Some(deadline));
        Ok(())
    })
}
