//! Multipart form data encoding and decoding.
//!
//! [`Form`] and [`Part`] build a `multipart/form-data` body. [`body_from_map`]
//! builds one from the items of a map through a per-item transform, and
//! [`parse_form_data`] splits a received body back into its parts.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use courier_core::multipart::{MultipartOptions, body_from_map};
//!
//! let items = BTreeMap::from([("greeting", "hello")]);
//! let options = MultipartOptions::new().boundary("XYZ");
//! let (content_type, body) = body_from_map(&items, &options).expect("encode");
//!
//! assert_eq!(content_type, "multipart/form-data; boundary=XYZ");
//! assert!(body.starts_with(b"--XYZ\r\n"));
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// The boundary used when none is configured.
pub const DEFAULT_BOUNDARY: &str = "boundary";

const OCTET_STREAM: &str = "application/octet-stream";

/// A single part in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Create a new part with the given name and data.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Create a file part, typed `application/octet-stream`.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(OCTET_STREAM.to_string()),
            data: data.into(),
        }
    }

    /// Form field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filename, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Part data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume into the data.
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// A multipart form containing multiple parts.
#[derive(Debug, Clone)]
pub struct Form {
    parts: Vec<Part>,
    boundary: String,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            parts: Vec::new(),
            boundary: DEFAULT_BOUNDARY.to_string(),
        }
    }
}

impl Form {
    /// Create an empty form using [`DEFAULT_BOUNDARY`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty form with a custom boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Multipart`] if the boundary is empty, longer than 70
    /// characters, ends with a space or contains a character not allowed by
    /// RFC 2046.
    pub fn with_boundary(boundary: impl Into<String>) -> Result<Self> {
        let boundary = boundary.into();
        validate_boundary(&boundary)?;
        Ok(Self {
            parts: Vec::new(),
            boundary,
        })
    }

    /// Add a part to the form.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// The boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The Content-Type header value for this form.
    ///
    /// The boundary is quoted when it contains a MIME special character.
    #[must_use]
    pub fn content_type(&self) -> String {
        if self.boundary.bytes().any(is_tspecial) {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        } else {
            format!("multipart/form-data; boundary={}", self.boundary)
        }
    }

    /// Convert the form into (content-type header value, body bytes).
    #[must_use]
    pub fn into_body(self) -> (String, Bytes) {
        let content_type = self.content_type();
        let body = self.encode();
        (content_type, body)
    }

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                buf.put_slice(b"\r\n");
            }
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(escape_quotes(&part.name).as_bytes());
            buf.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(escape_quotes(filename).as_bytes());
                buf.put_slice(b"\"");
            }
            buf.put_slice(b"\r\n");

            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }

            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
        }

        if !self.parts.is_empty() {
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        buf.freeze()
    }
}

/// A form field produced by a [`MultipartOptions`] transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Field name.
    pub name: String,
    /// Filename; may be empty.
    pub filename: String,
    /// Field content.
    pub data: Bytes,
}

impl FormField {
    /// Create a field.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            data: data.into(),
        }
    }
}

type Transform<K, V> = Box<dyn Fn(&K, &V) -> Result<FormField> + Send + Sync>;

/// Options for [`body_from_map`]: a boundary and a per-item transform.
pub struct MultipartOptions<K, V> {
    boundary: String,
    transform: Transform<K, V>,
}

impl<K: fmt::Display + 'static, V: fmt::Display + 'static> MultipartOptions<K, V> {
    /// Options using [`DEFAULT_BOUNDARY`] and the default transform.
    ///
    /// The default transform uses the key as the field name, an empty
    /// filename and the value's string form as the content.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transform(|key: &K, value: &V| {
            Ok(FormField::new(key.to_string(), "", value.to_string()))
        })
    }
}

impl<K: fmt::Display + 'static, V: fmt::Display + 'static> Default for MultipartOptions<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MultipartOptions<K, V> {
    /// Options using [`DEFAULT_BOUNDARY`] and a custom transform.
    #[must_use]
    pub fn with_transform<F>(transform: F) -> Self
    where
        F: Fn(&K, &V) -> Result<FormField> + Send + Sync + 'static,
    {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
            transform: Box::new(transform),
        }
    }

    /// Sets the boundary string.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }
}

impl<K, V> fmt::Debug for MultipartOptions<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartOptions")
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

/// Encodes map items as a `multipart/form-data` body.
///
/// Every item becomes a file part through the configured transform. Parts
/// are written in iteration order, so pass a `BTreeMap` for a stable body.
///
/// Returns the Content-Type header value and the body.
///
/// # Errors
///
/// Returns [`Error::Multipart`] for an invalid boundary, or the first error
/// raised by the transform.
pub fn body_from_map<'a, K, V, I>(items: I, options: &MultipartOptions<K, V>) -> Result<(String, Bytes)>
where
    K: 'a,
    V: 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut form = Form::with_boundary(options.boundary.as_str())?;
    for (key, value) in items {
        let field = (options.transform)(key, value)?;
        form = form.part(Part::file(field.name, field.filename, field.data));
    }
    Ok(form.into_body())
}

/// Splits a `multipart/form-data` body into its parts.
///
/// `content_type` is the value of the Content-Type header; its `boundary`
/// parameter (quoted or not) delimits the parts.
///
/// # Errors
///
/// Returns [`Error::Multipart`] if the content type has no boundary or the
/// body is not well formed.
pub fn parse_form_data(content_type: &str, body: &[u8]) -> Result<Vec<Part>> {
    let boundary = media_type_param(content_type, "boundary")
        .ok_or_else(|| Error::multipart(format!("no boundary in content type: {content_type:?}")))?;
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let start = find(body, delimiter).ok_or_else(|| Error::multipart("no opening boundary"))?;
    let (_, mut rest) = body.split_at(start + delimiter.len());

    let mut parts = Vec::new();
    loop {
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        rest = strip_line_break(rest).ok_or_else(|| Error::multipart("malformed boundary line"))?;

        let end = find_next_delimiter(rest, delimiter)
            .ok_or_else(|| Error::multipart("unexpected end of body"))?;
        let (raw, _) = rest.split_at(end.content_end);
        parts.push(parse_part(raw)?);
        (_, rest) = rest.split_at(end.delimiter_end);
    }
}

struct Delimiter {
    content_end: usize,
    delimiter_end: usize,
}

/// Finds the next delimiter that starts a line.
fn find_next_delimiter(haystack: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let mut offset = 0;
    loop {
        let (_, tail) = haystack.split_at(offset);
        let at = offset + find(tail, delimiter)?;
        let (before, _) = haystack.split_at(at);
        let content_end = if before.ends_with(b"\r\n") {
            Some(at - 2)
        } else if before.ends_with(b"\n") {
            Some(at - 1)
        } else {
            None
        };
        let delimiter_end = at + delimiter.len();
        if let Some(content_end) = content_end {
            return Some(Delimiter {
                content_end,
                delimiter_end,
            });
        }
        offset = delimiter_end;
    }
}

fn parse_part(raw: &[u8]) -> Result<Part> {
    let (head, data): (&[u8], &[u8]) = if let Some(data) = strip_line_break(raw) {
        (&[], data)
    } else if let Some(at) = find(raw, b"\r\n\r\n") {
        let (head, tail) = raw.split_at(at);
        (head, tail.get(4..).unwrap_or_default())
    } else if let Some(at) = find(raw, b"\n\n") {
        let (head, tail) = raw.split_at(at);
        (head, tail.get(2..).unwrap_or_default())
    } else {
        return Err(Error::multipart("part has no header terminator"));
    };

    let head = std::str::from_utf8(head).map_err(|e| Error::multipart(format!("part headers: {e}")))?;
    let mut name = String::new();
    let mut filename = None;
    let mut content_type = None;
    for line in head.lines() {
        let Some((key, value)) = line.split_once(':') else {
            return Err(Error::multipart(format!("malformed part header: {line:?}")));
        };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("content-disposition") {
            name = media_type_param(value, "name").unwrap_or_default();
            filename = media_type_param(value, "filename");
        } else if key.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    Ok(Part {
        name,
        filename,
        content_type,
        data: Bytes::copy_from_slice(data),
    })
}

/// Value of a `;`-separated parameter in a header value such as
/// `multipart/form-data; boundary="abc"`. Quoted values are unescaped.
fn media_type_param(value: &str, param: &str) -> Option<String> {
    let mut rest = value.split_once(';')?.1;
    loop {
        rest = rest.trim_start();
        let (key, after) = rest.split_once('=')?;
        let after = after.trim_start();
        let (found, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            let mut unescaped = String::new();
            let mut chars = quoted.char_indices();
            let mut end = None;
            while let Some((at, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            unescaped.push(escaped);
                        }
                    }
                    '"' => {
                        end = Some(at + 1);
                        break;
                    }
                    c => unescaped.push(c),
                }
            }
            (unescaped, quoted.get(end?..)?)
        } else {
            let (found, remaining) = after.split_at(after.find(';').unwrap_or(after.len()));
            (found.trim_end().to_string(), remaining)
        };

        if key.trim().eq_ignore_ascii_case(param) {
            return Some(found);
        }
        rest = remaining.trim_start().strip_prefix(';')?;
    }
}

fn validate_boundary(boundary: &str) -> Result<()> {
    if boundary.is_empty() || boundary.len() > 70 {
        return Err(Error::multipart(format!(
            "invalid boundary length: {}",
            boundary.len()
        )));
    }
    for (at, b) in boundary.bytes().enumerate() {
        let allowed = b.is_ascii_alphanumeric()
            || matches!(b, b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?')
            || (b == b' ' && at + 1 != boundary.len());
        if !allowed {
            return Err(Error::multipart(format!("invalid boundary character: {:?}", char::from(b))));
        }
    }
    Ok(())
}

const fn is_tspecial(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=' | b' '
    )
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn strip_line_break(bytes: &[u8]) -> Option<&[u8]> {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
