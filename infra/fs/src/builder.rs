use crate::bucket::{FsBucket, FsInner};
use crate::config::{DEFAULT_PAGE_SIZE, FsConfig};
use nanoid::nanoid;
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use stowage::{BucketErrorExt, Result};
use tokio::fs;
use tracing::info;

/// Name of the staging directory created under the root when no `tmp_dir` is given.
pub const STAGING_DIR: &str = ".stowtmp";

#[derive(Debug, Clone)]
struct BuildConfig {
    tmp_dir: Option<PathBuf>,
    create: bool,
    page_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { tmp_dir: None, create: true, page_size: DEFAULT_PAGE_SIZE }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct FsBucketBuilder<S: Sealed = NoRoot> {
    state: S,
    config: BuildConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> FsBucketBuilder<S> {
    #[must_use = "Sets the directory where writers stage temporary files"]
    pub fn tmp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tmp_dir = Some(path.into());
        self
    }

    #[must_use = "Sets whether the root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    #[must_use = "Sets how many entries one directory walk step lists"]
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> FsBucketBuilder<N> {
        FsBucketBuilder { state, config: self.config }
    }
}

impl FsBucketBuilder<NoRoot> {
    #[must_use = "Creates a new bucket builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory of the bucket"]
    pub fn root(self, path: impl Into<PathBuf>) -> FsBucketBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }

    /// Starts from a deserialized or URL-derived [`FsConfig`].
    #[must_use = "The bucket is not initialized until you call .connect()"]
    pub fn from_config(config: FsConfig) -> FsBucketBuilder<WithRoot> {
        let mut builder = Self::new().root(config.root).create(config.create);
        builder.config.tmp_dir = config.tmp_dir;
        builder.page_size(config.page_size)
    }
}

impl FsBucketBuilder<WithRoot> {
    /// Consumes the configuration and opens the bucket.
    ///
    /// 1. **Bootstrapping**: creates the root directory if `create(true)` was set.
    /// 2. **Canonicalization**: resolves the root and the staging directory to physical paths,
    ///    so later symlink checks compare like with like.
    /// 3. **Self-Healing**: removes stale temporary files left in the staging directory by
    ///    writers that never finished.
    ///
    /// The staging directory itself is created lazily by the first writer.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::Io`](stowage::BucketError::Io) if the root does not exist and
    /// `create` is false, or if it cannot be created or resolved.
    pub async fn connect(self) -> Result<FsBucket> {
        let WithRoot(root) = self.state;
        let root = if root.as_os_str().is_empty() { PathBuf::from(".") } else { root };

        if self.config.create {
            fs::create_dir_all(&root)
                .await
                .context(format!("Failed to bootstrap bucket root: {}", root.display()))?;
            info!(path = %root.display(), "Bootstrapped bucket root directory");
        }

        let canonical = fs::canonicalize(&root)
            .await
            .context(format!("Failed to resolve bucket root: {}", root.display()))?;

        let staging = match self.config.tmp_dir {
            Some(dir) => {
                let resolved = fs::canonicalize(&dir).await;
                resolved.unwrap_or(dir)
            },
            None => canonical.join(STAGING_DIR),
        };

        let bucket = FsBucket {
            inner: Arc::new(FsInner {
                root: canonical,
                staging,
                page_size: self.config.page_size,
                instance: nanoid!(10),
                tmp_counter: AtomicU64::new(1),
            }),
        };

        bucket.purge_tmp().await;

        Ok(bucket)
    }
}
