use crate::error::Result;
use crate::namespace::Namespace;
use crate::registry::parse_url;
use url::Url;

/// A bucket URL split into `scheme://bucket/prefix/rel`.
///
/// Without a `*` the path is cut at its last `/`. With a `*` the prefix ends at the last `/`
/// before the first `*`, so the glob part stays in `rel`. Query and fragment are ignored.
///
/// ```rust
/// use stowage::BucketUrl;
///
/// let url = BucketUrl::parse("s3://bkt/pre/fix/*/x.txt").unwrap();
/// assert_eq!(url.bucket(), "bkt");
/// assert_eq!(url.prefix(), "/pre/fix/");
/// assert_eq!(url.rel(), "*/x.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUrl {
    scheme: String,
    bucket: String,
    prefix: String,
    rel: String,
}

impl BucketUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self::from_url(&parse_url(raw)?))
    }

    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let (prefix, rel) = split_path(url.path());
        Self {
            scheme: url.scheme().to_owned(),
            bucket: url.host_str().unwrap_or_default().to_owned(),
            prefix: prefix.to_owned(),
            rel: rel.to_owned(),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// The prefix as a [`Namespace`].
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.prefix)
    }
}

fn split_path(path: &str) -> (&str, &str) {
    // A bare root carries no prefix.
    if path == "/" {
        return ("", "");
    }

    let head = path.find('*').map_or(path, |star| &path[..star]);
    match head.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    }
}
