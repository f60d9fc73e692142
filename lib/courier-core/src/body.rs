//! Message bodies and body serialization utilities.

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;

use crate::Result;

/// A live body: chunks of bytes arriving over time.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A response body.
///
/// [`Body::Empty`] is the canonical "no body" value. It is distinct from a
/// [`Body::Full`] holding zero bytes or a drained [`Body::Stream`]; use
/// [`Body::is_no_body`] to test for it.
#[derive(Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// A fully materialized, re-readable body.
    Full(Bytes),
    /// A live stream, not yet read.
    Stream(BodyStream),
}

impl Body {
    /// Wraps a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Returns `true` for the canonical "no body" value.
    #[must_use]
    pub const fn is_no_body(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if the body is a live stream.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// The bytes of a materialized body.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Full(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by a streaming body.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut stream) => {
                let mut collected = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    collected.extend_from_slice(&chunk?);
                }
                Ok(collected.freeze())
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Body::Empty"),
            Self::Full(bytes) => f.debug_tuple("Body::Full").field(bytes).finish(),
            Self::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Full(Bytes::from(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Full(Bytes::from(text))
    }
}

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
///
/// # Errors
///
/// Returns an error if form serialization fails.
pub fn to_form<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_html_form::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// `Vec<T>` fields become repeated parameters (`tags=a&tags=b`).
///
/// # Errors
///
/// Returns an error if query serialization fails.
pub fn to_query_string<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "user.address.city").
///
/// # Example
///
/// ```
/// use courier_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::Error;

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json");
        assert_eq!(ContentType::Json.to_string(), "application/json");
        assert_eq!(ContentType::OctetStream.as_str(), "application/octet-stream");
    }

    #[test]
    fn body_identity() {
        assert!(Body::Empty.is_no_body());
        assert!(!Body::Full(Bytes::new()).is_no_body());
        assert!(Body::from_stream(stream::empty()).is_stream());
        assert_eq!(Body::from("abc").as_bytes().map(Bytes::len), Some(3));
    }

    #[tokio::test]
    async fn collect_stream_concatenates_chunks() {
        let body = Body::from_stream(stream::iter([
            Ok(Bytes::from_static(b"hello, ")),
            Ok(Bytes::from_static(b"world")),
        ]));
        let bytes = body.collect().await.expect("collect");
        assert_eq!(bytes.as_ref(), b"hello, world");
    }

    #[tokio::test]
    async fn collect_stream_surfaces_error() {
        let body = Body::from_stream(stream::iter([
            Ok(Bytes::from_static(b"partial")),
            Err(Error::connection("reset by peer")),
        ]));
        let err = body.collect().await.expect_err("stream error");
        assert!(err.is_connection());
    }

    #[test]
    fn to_form_serialize() {
        #[derive(serde::Serialize)]
        struct Login {
            username: String,
            password: String,
        }

        let login = Login {
            username: "alice".to_string(),
            password: "secret".to_string(),
        };

        let bytes = to_form(&login).expect("serialize");
        assert_eq!(bytes.as_ref(), b"username=alice&password=secret");
    }

    #[test]
    fn to_query_string_with_vec() {
        #[derive(serde::Serialize)]
        struct Filter {
            tags: Vec<String>,
        }

        let filter = Filter {
            tags: vec!["a".to_string(), "b".to_string()],
        };

        let query = to_query_string(&filter).expect("serialize");
        assert_eq!(query, "tags=a&tags=b");
    }

    #[test]
    fn from_json_missing_field_error_with_path() {
        #[derive(Debug, serde::Deserialize)]
        struct Address {
            #[allow(dead_code)]
            city: String,
        }

        #[derive(Debug, serde::Deserialize)]
        struct User {
            #[allow(dead_code)]
            address: Address,
        }

        let err = from_json::<User>(br#"{"address":{}}"#).expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("address"), "Expected path 'address' in error: {msg}");
        assert!(msg.contains("city"), "Expected field 'city' mentioned in error: {msg}");
    }
}
