//! In-memory reference bucket.
//!
//! [`InMemBucket`] defines the expected behaviour of the contract: every adapter's conformance
//! run is compared against what this bucket does.

use crate::bucket::{Bucket, BulkRemover, Copier, Reader};
use crate::context::Context;
use crate::error::{BucketError, Result};
use crate::glob::Glob;
use crate::iter::{Entry, ListIterator, ObjectIterator};
use crate::metadata::{ObjectInfo, WriteOptions};
use crate::namespace::Namespace;
use crate::write::{BufferedWriter, Publisher, Writer};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    info: ObjectInfo,
}

type ObjectMap = Arc<RwLock<FxHashMap<String, StoredObject>>>;

/// A bucket held entirely in process memory.
///
/// Clones share the same objects.
///
/// ```rust
/// use stowage::{Bucket, Context, InMemBucket, ops};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> stowage::Result<()> {
/// let ctx = Context::background();
/// let bucket = InMemBucket::new();
///
/// ops::write_object(&ctx, &bucket, "docs/readme.md", b"# hi", None).await?;
/// assert_eq!(bucket.head(&ctx, "docs/readme.md").await?.size(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemBucket {
    objects: ObjectMap,
}

impl InMemBucket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of all stored objects keyed by name.
    #[must_use]
    pub fn object_sizes(&self) -> BTreeMap<String, u64> {
        self.objects.read().iter().map(|(name, obj)| (name.clone(), obj.info.size())).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn key(name: &str) -> String {
        Namespace::root().within(name)
    }
}

#[derive(Debug)]
struct InMemPublisher {
    objects: ObjectMap,
}

#[async_trait]
impl Publisher for InMemPublisher {
    async fn publish(
        &self,
        ctx: &Context,
        name: &str,
        data: Bytes,
        options: &WriteOptions,
    ) -> Result<()> {
        ctx.check()?;
        let info = ObjectInfo::new(name, data.len() as u64, Utc::now())
            .with_content_type(options.content_type())
            .with_metadata(options.metadata().clone());

        self.objects.write().insert(name.to_owned(), StoredObject { data, info });
        Ok(())
    }
}

#[async_trait]
impl Bucket for InMemBucket {
    async fn glob(&self, ctx: &Context, pattern: &str) -> Result<Box<dyn ObjectIterator>> {
        ctx.check()?;
        let glob = Glob::new(pattern)?;
        if glob.matches_nothing() {
            return Ok(Box::new(ListIterator::empty()));
        }

        let mut entries: Vec<Entry> = self
            .objects
            .read()
            .iter()
            .filter(|(name, _)| glob.is_match(name))
            .map(|(_, obj)| Entry::from(&obj.info))
            .collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));

        Ok(Box::new(ListIterator::new(entries)))
    }

    async fn head(&self, ctx: &Context, name: &str) -> Result<ObjectInfo> {
        ctx.check()?;
        let key = Self::key(name);
        self.objects
            .read()
            .get(&key)
            .map(|obj| obj.info.clone())
            .ok_or_else(|| BucketError::not_found(key))
    }

    async fn open(&self, ctx: &Context, name: &str) -> Result<Reader> {
        ctx.check()?;
        let key = Self::key(name);
        let data = self
            .objects
            .read()
            .get(&key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| BucketError::not_found(key))?;

        Ok(Box::new(Cursor::new(data)))
    }

    async fn create(
        &self,
        ctx: &Context,
        name: &str,
        options: Option<&WriteOptions>,
    ) -> Result<Box<dyn Writer>> {
        ctx.check()?;
        let publisher = InMemPublisher { objects: Arc::clone(&self.objects) };
        Ok(Box::new(BufferedWriter::new(ctx, &Self::key(name), options, publisher)))
    }

    async fn remove(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.check()?;
        let key = Self::key(name);
        if self.objects.write().remove(&key).is_some() {
            debug!(name = %key, "Object removed");
        }
        Ok(())
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
impl Copier for InMemBucket {
    async fn copy(&self, ctx: &Context, src: &str, dst: &str) -> Result<()> {
        ctx.check()?;
        let (src, dst) = (Self::key(src), Self::key(dst));

        let mut objects = self.objects.write();
        let source = objects.get(&src).ok_or_else(|| BucketError::not_found(src.clone()))?;
        let info = ObjectInfo::new(dst.as_str(), source.info.size(), Utc::now())
            .with_content_type(source.info.content_type())
            .with_metadata(source.info.metadata().clone());
        let copied = StoredObject { data: source.data.clone(), info };
        objects.insert(dst.clone(), copied);
        drop(objects);

        debug!(%src, %dst, "Object copied");
        Ok(())
    }
}

#[async_trait]
impl BulkRemover for InMemBucket {
    async fn remove_all(&self, ctx: &Context, pattern: &str) -> Result<()> {
        ctx.check()?;
        let glob = Glob::new(pattern)?;
        if glob.matches_nothing() {
            return Ok(());
        }

        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|name, _| !glob.is_match(name));
        let removed = before - objects.len();
        drop(objects);

        debug!(pattern, removed, "Objects removed");
        Ok(())
    }
}
