//! MIME header handling.

use std::collections::BTreeMap;
use std::fmt;

/// Collection of header fields, each with an ordered list of values.
///
/// Field names are case-insensitive and stored in canonical form
/// (`content-type` becomes `Content-Type`). Fields render sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: BTreeMap<String, Vec<String>>,
}

/// Canonicalizes a header field name: every hyphen-separated word is
/// capitalized, except `ID` which is kept upper case (`Content-ID`,
/// `Message-ID`).
#[must_use]
pub fn canonical_name(name: &str) -> String {
    name.trim()
        .split('-')
        .map(|word| {
            if word.eq_ignore_ascii_case("id") {
                return "ID".to_string();
            }
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(canonical_name(name))
            .or_default()
            .push(value.into());
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(canonical_name(name), vec![value.into()]);
    }

    /// Sets all values of a header at once.
    pub fn set_all(&mut self, name: &str, values: Vec<String>) {
        self.headers.insert(canonical_name(name), values);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&canonical_name(name))
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&canonical_name(name))
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&canonical_name(name))
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.headers.remove(&canonical_name(name));
    }

    /// Moves every field of `other` into `self`, replacing fields that
    /// exist in both.
    pub fn extend(&mut self, other: Self) {
        self.headers.extend(other.headers);
    }

    /// Number of distinct fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Removes every field.
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Returns an iterator over all header lines, sorted by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("MIME-VERSION"), "Mime-Version");
        assert_eq!(canonical_name("content-id"), "Content-ID");
        assert_eq!(canonical_name("message-Id"), "Message-ID");
        assert_eq!(canonical_name(" x-mailer "), "X-Mailer");
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get_all("To"), ["alice@example.com", "bob@example.com"]);

        headers.set("to", "charlie@example.com");
        assert_eq!(headers.get_all("To"), ["charlie@example.com"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        assert!(headers.contains("subject"));

        headers.remove("SUBJECT");
        assert!(!headers.contains("Subject"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_extend_replaces() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "multipart/mixed");
        headers.set("Subject", "Hi");

        let mut other = Headers::new();
        other.set("content-type", "text/plain");
        headers.extend(other);

        assert_eq!(headers.get_all("Content-Type"), ["text/plain"]);
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_headers_display_sorted_crlf() {
        let mut headers = Headers::new();
        headers.add("to", "b@example.com");
        headers.add("from", "a@example.com");
        headers.add("to", "c@example.com");

        assert_eq!(
            headers.to_string(),
            "From: a@example.com\r\nTo: b@example.com\r\nTo: c@example.com\r\n"
        );
    }
}
