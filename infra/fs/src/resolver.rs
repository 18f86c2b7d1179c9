use crate::bucket::FsBucket;
use crate::builder::FsBucketBuilder;
use crate::config::FsConfig;
use std::path::PathBuf;
use std::sync::Arc;
use stowage::{Bucket, BucketError, Context, Resolver, Result, Url, confine};
use tracing::debug;

/// Opens the bucket described by a `file://` URL. See [`FsConfig::from_url`].
pub async fn resolve_url(ctx: Context, url: Url) -> Result<Arc<dyn Bucket>> {
    ctx.check()?;
    let config = FsConfig::from_url(&url)?;
    debug!(root = %config.root.display(), "Opening filesystem bucket");

    let bucket = FsBucketBuilder::from_config(config).connect().await?;
    Ok(Arc::new(bucket))
}

/// Builds a resolver that maps every URL of its scheme to a directory under `root`.
///
/// The URL's host and path select the subdirectory and are confined lexically, so
/// `tenant://acme/reports` opens `<root>/acme/reports` and no `..` climbs above `root`.
/// Register it under a scheme of your choice:
///
/// ```rust,no_run
/// use std::path::PathBuf;
///
/// let resolver = stowage_fs::chroot_resolver(PathBuf::from("/srv/tenants"), None);
/// stowage::registry::register("tenant", resolver);
/// ```
pub fn chroot_resolver(root: PathBuf, tmp_dir: Option<PathBuf>) -> impl Resolver {
    move |ctx: Context, url: Url| {
        let root = root.clone();
        let tmp_dir = tmp_dir.clone();
        async move {
            ctx.check()?;
            let host = url.host_str().unwrap_or_default();
            let sub = confine("", &format!("{host}/{}", url.path()));
            let dir = sub.split('/').filter(|s| !s.is_empty()).fold(root, |p, s| p.join(s));

            let mut builder = FsBucket::builder().root(dir).create(true);
            if let Some(tmp_dir) = tmp_dir {
                builder = builder.tmp_dir(tmp_dir);
            }
            let bucket: Arc<dyn Bucket> = Arc::new(builder.connect().await?);
            Ok::<_, BucketError>(bucket)
        }
    }
}
