use crate::context::Context;
use crate::error::Result;
use crate::iter::ObjectIterator;
use crate::metadata::{ObjectInfo, WriteOptions};
use crate::write::Writer;
use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncRead;

/// Byte stream of one object's content.
pub type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// The capability contract every storage backend implements.
///
/// Names are slash-separated and relative to the bucket (or to its namespace). Backends
/// differ in consistency, but all of them honour these rules:
///
/// - a missing object is reported as [`BucketError::NotFound`](crate::BucketError::NotFound);
/// - a writer publishes nothing until it commits, and the previous object stays readable until
///   then;
/// - `remove` and `close` are idempotent;
/// - every operation observes the [`Context`] it is given.
///
/// Optional capabilities are probed with [`as_copier`](Self::as_copier) and
/// [`as_bulk_remover`](Self::as_bulk_remover); the helpers in [`ops`](crate::ops) fall back to
/// the basic operations when a backend lacks them.
#[async_trait]
pub trait Bucket: Send + Sync + fmt::Debug {
    /// Lists the objects whose names match `pattern`. The empty pattern yields nothing.
    async fn glob(&self, ctx: &Context, pattern: &str) -> Result<Box<dyn ObjectIterator>>;

    async fn head(&self, ctx: &Context, name: &str) -> Result<ObjectInfo>;

    async fn open(&self, ctx: &Context, name: &str) -> Result<Reader>;

    /// Starts staging a new version of `name`. Never fails because the object exists.
    async fn create(
        &self,
        ctx: &Context,
        name: &str,
        options: Option<&WriteOptions>,
    ) -> Result<Box<dyn Writer>>;

    /// Removes `name`. Removing a missing object succeeds.
    async fn remove(&self, ctx: &Context, name: &str) -> Result<()>;

    /// Releases backend resources. Stored data is kept.
    async fn close(&self) -> Result<()>;

    fn as_copier(&self) -> Option<&dyn Copier> {
        None
    }

    fn as_bulk_remover(&self) -> Option<&dyn BulkRemover> {
        None
    }
}

/// Server-side copy within one bucket.
#[async_trait]
pub trait Copier: Send + Sync {
    async fn copy(&self, ctx: &Context, src: &str, dst: &str) -> Result<()>;
}

/// Native removal of every object matching a glob.
#[async_trait]
pub trait BulkRemover: Send + Sync {
    async fn remove_all(&self, ctx: &Context, pattern: &str) -> Result<()>;
}
