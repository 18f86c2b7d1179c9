//! Convenience operations built on the [`Bucket`] contract.
//!
//! Each helper uses a backend's native capability when it advertises one and otherwise falls
//! back to the basic operations every bucket supports.

use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::{BucketError, BucketErrorExt, Result};
use crate::iter::collect_names;
use crate::metadata::WriteOptions;
use crate::write::Writer;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const COPY_CHUNK: usize = 64 * 1024;

/// Writes `data` to `name` in one commit.
pub async fn write_object(
    ctx: &Context,
    bucket: &dyn Bucket,
    name: &str,
    data: &[u8],
    options: Option<&WriteOptions>,
) -> Result<()> {
    let mut writer = bucket.create(ctx, name, options).await?;
    if let Err(err) = writer.write_all(data).await {
        abandon(writer.as_mut()).await;
        return Err(err);
    }
    writer.commit().await
}

/// Reads the whole content of `name`.
pub async fn read_object(ctx: &Context, bucket: &dyn Bucket, name: &str) -> Result<Bytes> {
    let mut reader = bucket.open(ctx, name).await?;
    let mut buf = Vec::new();
    ctx.run(async {
        reader.read_to_end(&mut buf).await.context(format!("Read failed: {name}"))?;
        Ok::<_, BucketError>(())
    })
    .await?;
    Ok(Bytes::from(buf))
}

/// Copies `src` to `dst` inside one bucket.
///
/// Without a native [`Copier`](crate::Copier) the content is streamed through a new writer,
/// which applies `options`; native copies keep the source's attributes.
pub async fn copy_object(
    ctx: &Context,
    bucket: &dyn Bucket,
    src: &str,
    dst: &str,
    options: Option<&WriteOptions>,
) -> Result<()> {
    if let Some(copier) = bucket.as_copier() {
        return copier.copy(ctx, src, dst).await;
    }

    let mut reader = bucket.open(ctx, src).await?;
    let mut writer = bucket.create(ctx, dst, options).await?;
    let mut chunk = vec![0u8; COPY_CHUNK];
    loop {
        let next = ctx.run(async { reader.read(&mut chunk).await.map_err(BucketError::from) });
        let read = match next.await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                abandon(writer.as_mut()).await;
                return Err(err);
            },
        };
        if let Err(err) = writer.write_all(&chunk[..read]).await {
            abandon(writer.as_mut()).await;
            return Err(err);
        }
    }
    writer.commit().await?;

    debug!(src, dst, "Object copied by streaming");
    Ok(())
}

/// Removes every object matching `pattern`. The empty pattern removes nothing.
pub async fn remove_all(ctx: &Context, bucket: &dyn Bucket, pattern: &str) -> Result<()> {
    if let Some(remover) = bucket.as_bulk_remover() {
        return remover.remove_all(ctx, pattern).await;
    }

    let mut iter = bucket.glob(ctx, pattern).await?;
    let names = collect_names(iter.as_mut()).await?;
    for name in &names {
        bucket.remove(ctx, name).await?;
    }

    debug!(pattern, removed = names.len(), "Objects removed one by one");
    Ok(())
}

async fn abandon(writer: &mut dyn Writer) {
    if let Err(err) = writer.discard().await {
        warn!(name = writer.name(), error = %err, "Failed to discard writer");
    }
}
