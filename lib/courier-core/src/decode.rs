//! Decoding response bodies.

use std::collections::HashMap;
use std::hash::Hash;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::multipart::parse_form_data;
use crate::{Error, Response, Result};

/// Reads a response body and decodes it as JSON.
///
/// # Errors
///
/// Returns [`Error::ReadingBody`] if the body cannot be read and
/// [`Error::InvalidJson`] if it is not valid JSON for `T`.
///
/// # Example
///
/// ```
/// use courier_core::{Body, Headers, Response, unmarshal_json};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let response = Response::new(200, Headers::new(), Body::from(r#"{"id":1}"#));
/// let value: serde_json::Value = unmarshal_json(response).await.expect("json");
/// assert_eq!(value["id"], 1);
/// # }
/// ```
pub async fn unmarshal_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(Error::InvalidJson)
}

/// Reads a `multipart/form-data` response into a map.
///
/// Each part is passed to `transform` as (field name, filename, content);
/// the filename is empty when the part has none. Later parts replace
/// earlier ones with the same key.
///
/// # Errors
///
/// Returns [`Error::ReadingBody`] if the body cannot be read,
/// [`Error::Multipart`] if the content type or body is malformed, and the
/// first error raised by `transform`.
pub async fn map_from_multipart_form_data<K, V, F>(
    response: Response,
    mut transform: F,
) -> Result<HashMap<K, V>>
where
    K: Eq + Hash,
    F: FnMut(&str, &str, Bytes) -> Result<(K, V)>,
{
    let content_type = response.header("Content-Type").unwrap_or_default().to_string();
    let body = response.bytes().await?;

    let mut items = HashMap::new();
    for part in parse_form_data(&content_type, &body)? {
        let name = part.name().to_string();
        let filename = part.filename().unwrap_or_default().to_string();
        let (key, value) = transform(&name, &filename, part.into_data())?;
        items.insert(key, value);
    }
    Ok(items)
}
