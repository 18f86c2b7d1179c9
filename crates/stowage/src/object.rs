use crate::bucket::{Bucket, Reader};
use crate::context::Context;
use crate::error::Result;
use crate::memory::InMemBucket;
use crate::metadata::{ObjectInfo, WriteOptions};
use crate::registry;
use crate::write::Writer;
use std::sync::Arc;

/// A handle on one named object inside a bucket.
///
/// ```rust
/// use stowage::{Context, Object, ops};
/// use tokio::io::AsyncReadExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> stowage::Result<()> {
/// let ctx = Context::background();
/// let obj = Object::in_memory("notes/today.txt");
///
/// let mut writer = obj.create(&ctx, None).await?;
/// writer.write_all(b"remember the milk").await?;
/// writer.commit().await?;
///
/// let mut body = String::new();
/// obj.open(&ctx).await?.read_to_string(&mut body).await?;
/// assert_eq!(body, "remember the milk");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Object {
    bucket: Arc<dyn Bucket>,
    name: String,
}

impl Object {
    pub fn new(bucket: Arc<dyn Bucket>, name: impl Into<String>) -> Self {
        Self { bucket, name: name.into() }
    }

    /// An object in a fresh, private [`InMemBucket`].
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemBucket::new()), name)
    }

    /// Resolves `url` through the registry; the URL path becomes the object name.
    pub async fn from_url(ctx: &Context, url: &str) -> Result<Self> {
        let (bucket, name) = registry::resolve_path(ctx, url).await?;
        Ok(Self { bucket, name })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn bucket(&self) -> &Arc<dyn Bucket> {
        &self.bucket
    }

    pub async fn head(&self, ctx: &Context) -> Result<ObjectInfo> {
        self.bucket.head(ctx, &self.name).await
    }

    pub async fn open(&self, ctx: &Context) -> Result<Reader> {
        self.bucket.open(ctx, &self.name).await
    }

    pub async fn create(
        &self,
        ctx: &Context,
        options: Option<&WriteOptions>,
    ) -> Result<Box<dyn Writer>> {
        self.bucket.create(ctx, &self.name, options).await
    }

    pub async fn remove(&self, ctx: &Context) -> Result<()> {
        self.bucket.remove(ctx, &self.name).await
    }

    /// Closes the underlying bucket.
    pub async fn close(&self) -> Result<()> {
        self.bucket.close().await
    }
}
