//! Lexical confinement of object names under a root prefix.
//!
//! Names are never resolved against a real filesystem here: `..` segments are collapsed
//! lexically and can never climb above the root, so every confined name stays inside it.

use std::fmt;

/// Cleans `"/" + name`: repeated separators collapse, `.` segments vanish and `..` pops a
/// segment without ever climbing above `/`. The result is always rooted.
///
/// ```rust
/// use stowage::clean;
///
/// assert_eq!(clean("a//b/./c/.."), "/a/b");
/// assert_eq!(clean("../../etc/passwd"), "/etc/passwd");
/// assert_eq!(clean(""), "/");
/// ```
#[must_use]
pub fn clean(name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(name.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Joins `name` under `root` so that the result can never point outside of it.
///
/// An empty root yields the object-key form without a leading `/`.
#[must_use]
pub fn confine(root: &str, name: &str) -> String {
    let cleaned = clean(name);
    if root.is_empty() {
        return cleaned.trim_start_matches('/').to_owned();
    }

    let base = root.trim_end_matches('/');
    match (base.is_empty(), cleaned.as_str()) {
        (true, _) => cleaned,
        (false, "/") => base.to_owned(),
        (false, rest) => format!("{base}{rest}"),
    }
}

/// Normalizes a user supplied object name: `\` becomes `/` and separators are trimmed from
/// both ends.
#[must_use]
pub fn norm_object_name(name: &str) -> String {
    name.replace('\\', "/").trim_matches('/').to_owned()
}

/// A prefix that scopes object names inside a bucket.
///
/// The prefix is stored cleaned and without leading or trailing `/`, so `"/a/b/"`, `"a/b"` and
/// `"a//b/."` are the same namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self { prefix: confine("", prefix) }
    }

    /// The empty namespace: names map to themselves, cleaned.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Maps a namespace-relative name to the backend key.
    #[must_use]
    pub fn within(&self, name: &str) -> String {
        confine(&self.prefix, name)
    }

    /// Maps a backend key back to a namespace-relative name, or `None` when the key lies
    /// outside the namespace.
    #[must_use]
    pub fn strip<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let raw = raw.trim_start_matches('/');
        if self.prefix.is_empty() {
            return Some(raw);
        }

        let rest = raw.strip_prefix(self.prefix.as_str())?;
        if !rest.starts_with('/') {
            return None;
        }
        let rest = rest.trim_start_matches('/');
        (!rest.is_empty()).then_some(rest)
    }
}

impl From<&str> for Namespace {
    fn from(prefix: &str) -> Self {
        Self::new(prefix)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}
