//! Case-preserving header multimap.
//!
//! Keys are stored exactly as given. Use [`canonical_header_key`] (or the
//! canonical setters on requests and mock expectations) to normalise a key
//! before storing it; non-canonical keys round-trip verbatim.

use std::collections::BTreeMap;
use std::fmt;

/// Normalise a header key to its canonical MIME form.
///
/// The first letter and any letter following a hyphen are upper-cased, the
/// rest lower-cased. Keys containing a space or any byte that is not a valid
/// header token character are returned unchanged.
///
/// ```
/// use courier_core::canonical_header_key;
///
/// assert_eq!(canonical_header_key("content-type"), "Content-Type");
/// assert_eq!(canonical_header_key("X-API-KEY"), "X-Api-Key");
/// ```
#[must_use]
pub fn canonical_header_key(key: &str) -> String {
    if !key.bytes().all(is_token_byte) {
        return key.to_string();
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

const fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

/// An ordered header multimap keyed by exact header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all values of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// Appends `value` to the values of `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// First value of `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `key`.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `key` is present (with any value).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(key)
    }

    /// Removes every key equal to `key` ignoring ASCII case, returning the
    /// values of all removed keys in key order.
    pub fn remove_ignore_case(&mut self, key: &str) -> Option<Vec<String>> {
        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|candidate| candidate.eq_ignore_ascii_case(key))
            .cloned()
            .collect();
        if matching.is_empty() {
            return None;
        }
        Some(
            matching
                .iter()
                .filter_map(|candidate| self.entries.remove(candidate))
                .flatten()
                .collect(),
        )
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no header is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over keys and their values, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (key, value) in iter {
            headers.add(key, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, values) in &self.entries {
            for value in values {
                writeln!(f, "{key}: {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_keys() {
        assert_eq!(canonical_header_key("accept"), "Accept");
        assert_eq!(canonical_header_key("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_key("WWW-AUTHENTICATE"), "Www-Authenticate");
        assert_eq!(canonical_header_key("bad key"), "bad key");
    }

    #[test]
    fn set_replaces_and_add_appends() {
        let mut headers = Headers::new();
        headers.add("Accept", "text/plain");
        headers.add("Accept", "application/json");
        assert_eq!(headers.get_all("Accept").len(), 2);
        assert_eq!(headers.get("Accept"), Some("text/plain"));

        headers.set("Accept", "*/*");
        assert_eq!(headers.get_all("Accept"), ["*/*".to_string()]);
    }

    #[test]
    fn lookups_are_exact_case() {
        let headers: Headers = [("sessionid", "abc")].into_iter().collect();
        assert!(headers.contains("sessionid"));
        assert!(!headers.contains("Sessionid"));
    }

    #[test]
    fn remove_ignore_case_strips_all_spellings() {
        let mut headers: Headers = [("X-Flag", "1"), ("x-flag", "2"), ("Other", "3")]
            .into_iter()
            .collect();
        let removed = headers.remove_ignore_case("X-FLAG").expect("present");
        assert_eq!(removed, ["1".to_string(), "2".to_string()]);
        assert_eq!(headers.len(), 1);
        assert!(headers.remove_ignore_case("x-flag").is_none());
    }

    #[test]
    fn remove_and_len() {
        let mut headers: Headers = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.remove("A"), Some(vec!["1".to_string()]));
        assert!(headers.remove("A").is_none());
        assert_eq!(headers.len(), 1);
        assert!(!headers.is_empty());
    }
}
