use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stowage::{BucketError, Result, Url};

pub(crate) const DEFAULT_PAGE_SIZE: usize = 256;

/// Settings for a filesystem bucket, as read from a config file or a `file://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Directory that holds the objects.
    pub root: PathBuf,
    /// Where writers stage their temporary files. Defaults to `<root>/.stowtmp`.
    pub tmp_dir: Option<PathBuf>,
    /// Create the root when it is missing.
    pub create: bool,
    /// Entries listed per blocking directory walk step.
    pub page_size: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            tmp_dir: None,
            create: true,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FsConfig {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Reads a config from `file://[host]/path?tmpdir=..&create=..&page_size=..`.
    ///
    /// A host is treated as the first segment of a relative root, so `file://data/objects`
    /// points at `data/objects`.
    pub fn from_url(url: &Url) -> Result<Self> {
        let root = match url.host_str().filter(|h| !h.is_empty() && *h != "localhost") {
            Some(host) => PathBuf::from(host).join(url.path().trim_start_matches('/')),
            None => url.to_file_path().map_err(|()| invalid(url, "Path is not a local file path"))?,
        };

        let mut config = Self::new(root);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "tmpdir" if !value.is_empty() => {
                    config.tmp_dir = Some(PathBuf::from(value.as_ref()));
                },
                "create" => {
                    config.create =
                        value.parse().map_err(|_| invalid(url, "create must be a boolean"))?;
                },
                "page_size" => {
                    config.page_size = value
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid(url, "page_size must be a positive integer"))?;
                },
                _ => {},
            }
        }

        Ok(config)
    }
}

fn invalid(url: &Url, reason: &'static str) -> BucketError {
    BucketError::InvalidUrl { message: url.to_string().into(), context: Some(reason.into()) }
}
