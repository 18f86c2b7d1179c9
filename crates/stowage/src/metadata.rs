use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Canonicalizes a metadata key: `_` becomes `-`, then MIME header casing applies.
///
/// Keys holding bytes that are not valid header token characters are returned as they are
/// after the `_` replacement.
///
/// ```rust
/// use stowage::canonical_key;
///
/// assert_eq!(canonical_key("CuSt0m_key"), "Cust0m-Key");
/// assert_eq!(canonical_key("content-TYPE"), "Content-Type");
/// ```
#[must_use]
pub fn canonical_key(key: &str) -> String {
    let key = key.replace('_', "-");
    if !key.bytes().all(is_token_byte) {
        return key;
    }

    let mut upper = true;
    key.chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() };
            upper = c == '-';
            out
        })
        .collect()
}

const fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'`'
                | b'|' | b'~'
        )
}

/// User metadata attached to an object.
///
/// Keys are canonicalized on every insert, lookup and removal, so keys that canonicalize
/// identically address the same entry. Iteration is sorted by canonical key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&canonical_key(key)).map(String::as_str)
    }

    /// Inserts a value, returning the previous value stored under the canonical key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        self.0.insert(canonical_key(key), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(&canonical_key(key))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&canonical_key(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Self::new();
        meta.extend(iter);
        meta
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for Metadata {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key.as_ref(), value);
        }
    }
}

impl From<BTreeMap<String, String>> for Metadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Metadata> for BTreeMap<String, String> {
    fn from(meta: Metadata) -> Self {
        meta.0
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An immutable snapshot of an object's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    name: String,
    size: u64,
    mod_time: DateTime<Utc>,
    content_type: String,
    metadata: Metadata,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            mod_time,
            content_type: String::new(),
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    /// Empty when the backend does not know the content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Attributes applied to an object when its writer commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    content_type: String,
    metadata: Metadata,
}

impl WriteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the content type recorded on commit"]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use = "Adds a metadata entry recorded on commit"]
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    #[must_use = "Replaces the metadata recorded on commit"]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Accessors that treat absent options as the zero configuration.
pub trait OptionsExt {
    fn content_type(self) -> String;
    fn metadata(self) -> Metadata;
}

impl OptionsExt for Option<&WriteOptions> {
    fn content_type(self) -> String {
        self.map(|o| o.content_type.clone()).unwrap_or_default()
    }

    fn metadata(self) -> Metadata {
        self.map(|o| o.metadata.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_canonicalize_to_one_entry() {
        let mut meta = Metadata::new();
        meta.insert("CuSt0m_key", "VaLu3");

        assert_eq!(meta.get("cust0m-key"), Some("VaLu3"));
        assert_eq!(meta.get("CUST0M_KEY"), Some("VaLu3"));
        assert_eq!(meta.iter().next(), Some((&"Cust0m-Key".to_owned(), &"VaLu3".to_owned())));

        meta.insert("cust0m-KEY", "other");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.remove("Cust0m_Key"), Some("other".to_owned()));
        assert!(meta.is_empty());
    }

    #[test]
    fn invalid_token_keys_are_kept() {
        assert_eq!(canonical_key("with space"), "with space");
        assert_eq!(canonical_key("ünï_code"), "ünï-code");
    }

    #[test]
    fn deserialized_metadata_is_canonical() {
        let meta: Metadata = serde_json::from_str(r#"{"x_amz_thing":"1"}"#).unwrap();
        assert_eq!(meta.get("X-Amz-Thing"), Some("1"));
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"X-Amz-Thing":"1"}"#);
    }

    #[test]
    fn absent_options_are_zero() {
        let none: Option<&WriteOptions> = None;
        assert_eq!(none.content_type(), "");
        assert!(none.metadata().is_empty());

        let opts = WriteOptions::new().with_content_type("text/plain").with_meta("a_b", "c");
        assert_eq!(Some(&opts).content_type(), "text/plain");
        assert_eq!(Some(&opts).metadata().get("A-B"), Some("c"));
    }
}
