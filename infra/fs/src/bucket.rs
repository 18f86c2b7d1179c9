//! Local filesystem bucket.
//!
//! Objects are regular files below a canonical root directory. Every name is confined lexically
//! and then checked against the physical filesystem, so neither `..` segments nor symlinks can
//! reach outside the root.

use crate::builder::FsBucketBuilder;
use crate::error::normalize_io;
use crate::maintenance::{self, TMP_MARKER};
use crate::security;
use crate::walk::WalkSource;
use crate::writer::{FsWriter, remove_tmp, swap_into_place};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use stowage::{
    BoundedReader, Bucket, BucketError, BulkRemover, Context, Copier, Glob, ListIterator,
    Namespace, ObjectInfo, ObjectIterator, PagedIterator, Reader, Result, WriteOptions, Writer,
    collect_names, confine,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// The internal shared state of an [`FsBucket`].
#[derive(Debug)]
pub struct FsInner {
    /// The canonical directory holding the objects.
    pub(crate) root: PathBuf,
    /// Where writers stage temporary files.
    pub(crate) staging: PathBuf,
    pub(crate) page_size: usize,
    /// Random per-connection tag, keeping staged names of buckets sharing a root apart.
    pub(crate) instance: String,
    /// A unique counter used to generate temporary file names.
    pub(crate) tmp_counter: AtomicU64,
}

/// A [`Bucket`] backed by a local directory.
///
/// Writes are staged in a temporary file and renamed into place on commit, so readers only
/// ever see complete objects. The handle is reference-counted and cheap to clone.
///
/// # Example
///
/// ```rust
/// use stowage::{Bucket, Context, ops};
/// use stowage_fs::FsBucket;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> stowage::Result<()> {
/// # let tmp = tempfile::tempdir().unwrap();
/// # let root = tmp.path().join("objects");
/// let bucket = FsBucket::builder().root(&root).create(true).connect().await?;
/// let ctx = Context::background();
///
/// ops::write_object(&ctx, &bucket, "reports/2024.txt", b"all good", None).await?;
/// assert_eq!(bucket.head(&ctx, "reports/2024.txt").await?.size(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FsBucket {
    pub(crate) inner: Arc<FsInner>,
}

impl Deref for FsBucket {
    type Target = FsInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FsBucket {
    #[must_use = "The bucket is not initialized until you call .connect()"]
    pub fn builder() -> FsBucketBuilder {
        FsBucketBuilder::new()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Removes temporary files older than five minutes from the staging directory.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.staging).await;
    }

    /// Resolves `name` to its object key and physical path.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::PathEscape`] if the path leaves the root through a symlink or
    /// points into the staging directory.
    pub fn resolve(&self, name: &str) -> Result<(String, PathBuf)> {
        let (key, path) = security::resolve_object(&self.root, name)?;
        if path.starts_with(&self.staging) {
            return Err(BucketError::PathEscape {
                message: key.into(),
                context: Some("Name points into the staging directory".into()),
            });
        }
        Ok((key, path))
    }

    fn unique_tmp_path(&self, key: &str) -> PathBuf {
        let counter = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = key.rsplit('/').next().unwrap_or("object");
        self.staging.join(format!("{file_name}{TMP_MARKER}{}-{counter}", self.instance))
    }

    /// Objects are regular files; directories and symlinks are not, matching what glob lists.
    async fn file_info(key: &str, path: &Path) -> Result<std::fs::Metadata> {
        let meta = fs::symlink_metadata(path).await.map_err(|e| normalize_io(e, key))?;
        if !meta.is_file() {
            return Err(BucketError::not_found(key.to_owned()));
        }
        Ok(meta)
    }

    /// Deletes the file and then every parent directory it leaves empty, up to the root.
    async fn remove_file(&self, key: &str, path: &Path) -> Result<()> {
        if let Err(err) = fs::remove_file(path).await {
            let err = normalize_io(err, key);
            let is_dir = fs::metadata(path).await.is_ok_and(|m| m.is_dir());
            return if err.is_not_found() || is_dir { Ok(()) } else { Err(err) };
        }

        let mut parent = path.parent();
        while let Some(dir) = parent.filter(|d| *d != self.root && d.starts_with(&self.root)) {
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            parent = dir.parent();
        }

        debug!(name = key, "File deleted");
        Ok(())
    }
}

#[async_trait]
impl Bucket for FsBucket {
    async fn glob(&self, ctx: &Context, pattern: &str) -> Result<Box<dyn ObjectIterator>> {
        ctx.check()?;
        let glob = Glob::new(pattern)?;
        if glob.matches_nothing() {
            return Ok(Box::new(ListIterator::empty()));
        }

        let start = security::resolve_path(&self.root, &confine("", glob.literal_prefix()))?;
        let source = WalkSource::new(&self.root, &start, &self.staging, self.page_size);
        Ok(Box::new(PagedIterator::new(ctx, source, glob, Namespace::root())))
    }

    async fn head(&self, ctx: &Context, name: &str) -> Result<ObjectInfo> {
        ctx.check()?;
        let (key, path) = self.resolve(name)?;
        let meta = Self::file_info(&key, &path).await?;

        let mod_time = meta.modified().map_or(DateTime::UNIX_EPOCH, DateTime::<Utc>::from);
        Ok(ObjectInfo::new(key, meta.len(), mod_time))
    }

    async fn open(&self, ctx: &Context, name: &str) -> Result<Reader> {
        ctx.check()?;
        let (key, path) = self.resolve(name)?;
        Self::file_info(&key, &path).await?;

        let file = fs::File::open(&path).await.map_err(|e| normalize_io(e, &key))?;
        let meta = file.metadata().await.map_err(|e| normalize_io(e, &key))?;
        if !meta.is_file() {
            return Err(BucketError::not_found(key));
        }

        Ok(Box::new(BoundedReader::new(file, meta.len())))
    }

    async fn create(
        &self,
        ctx: &Context,
        name: &str,
        _options: Option<&WriteOptions>,
    ) -> Result<Box<dyn Writer>> {
        ctx.check()?;
        let (key, path) = self.resolve(name)?;
        let tmp = self.unique_tmp_path(&key);

        let writer = FsWriter::open(ctx, key, path, tmp).await?;
        Ok(Box::new(writer))
    }

    async fn remove(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.check()?;
        if confine("", name).is_empty() {
            return Ok(());
        }
        let (key, path) = self.resolve(name)?;
        self.remove_file(&key, &path).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn as_copier(&self) -> Option<&dyn Copier> {
        Some(self)
    }

    fn as_bulk_remover(&self) -> Option<&dyn BulkRemover> {
        Some(self)
    }
}

#[async_trait]
impl Copier for FsBucket {
    /// Copies into the staging directory, then renames over the destination.
    async fn copy(&self, ctx: &Context, src: &str, dst: &str) -> Result<()> {
        ctx.check()?;
        let (src_key, src_path) = self.resolve(src)?;
        let (dst_key, dst_path) = self.resolve(dst)?;
        Self::file_info(&src_key, &src_path).await?;

        let mut source = fs::File::open(&src_path).await.map_err(|e| normalize_io(e, &src_key))?;

        let tmp = self.unique_tmp_path(&dst_key);
        fs::create_dir_all(&self.staging).await.map_err(|e| normalize_io(e, &dst_key))?;
        let mut staged = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp)
            .await
            .map_err(|e| normalize_io(e, &dst_key))?;

        let copied = ctx
            .run(async {
                let io = |e| normalize_io(e, &dst_key);
                tokio::io::copy(&mut source, &mut staged).await.map_err(io)?;
                staged.flush().await.map_err(io)?;
                staged.sync_all().await.map_err(io)
            })
            .await;
        drop(staged);
        let published = match copied {
            Ok(()) => swap_into_place(&tmp, &dst_path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            remove_tmp(&tmp).await;
            return Err(err);
        }

        debug!(src = %src_key, dst = %dst_key, "File copied");
        Ok(())
    }
}

#[async_trait]
impl BulkRemover for FsBucket {
    async fn remove_all(&self, ctx: &Context, pattern: &str) -> Result<()> {
        let mut iter = self.glob(ctx, pattern).await?;
        let names = collect_names(iter.as_mut()).await?;

        for name in &names {
            ctx.check()?;
            let (key, path) = self.resolve(name)?;
            self.remove_file(&key, &path).await?;
        }

        debug!(pattern, removed = names.len(), "Files removed");
        Ok(())
    }
}
