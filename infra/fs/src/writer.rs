use crate::error::normalize_io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage::{BucketError, BucketErrorExt, Context, Result, WriteState, Writer};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Stages an object in a temporary file and renames it over the target on commit.
///
/// Dropping a writer that never reached a terminal call removes its temporary file.
#[derive(Debug)]
pub(crate) struct FsWriter {
    ctx: Context,
    name: String,
    target: PathBuf,
    tmp: PathBuf,
    file: Option<fs::File>,
    state: WriteState,
}

impl FsWriter {
    pub(crate) async fn open(
        ctx: &Context,
        name: String,
        target: PathBuf,
        tmp: PathBuf,
    ) -> Result<Self> {
        if let Some(staging) = tmp.parent() {
            fs::create_dir_all(staging)
                .await
                .context(format!("Failed to create staging directory: {}", staging.display()))?;
        }

        let file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp)
            .await
            .context(format!("Temp creation failed: {}", tmp.display()))?;

        Ok(Self { ctx: ctx.clone(), name, target, tmp, file: Some(file), state: WriteState::Open })
    }

    async fn publish(&self, mut file: fs::File) -> Result<()> {
        self.ctx
            .run(async {
                file.flush().await.context("Write failed")?;
                file.sync_all().await.context("Hardware sync failed")?;
                Ok::<_, BucketError>(())
            })
            .await?;
        drop(file);

        self.ctx.check()?;
        swap_into_place(&self.tmp, &self.target).await
    }
}

#[async_trait::async_trait]
impl Writer for FsWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.state.ensure_open(&self.name)?;
        let Some(file) = self.file.as_mut() else {
            return Err(BucketError::writer_closed(&self.name));
        };

        let name = &self.name;
        self.ctx.run(async { file.write_all(buf).await.map_err(|e| normalize_io(e, name)) }).await?;
        Ok(buf.len())
    }

    async fn commit(&mut self) -> Result<()> {
        self.state.begin_commit(&self.name)?;
        let Some(file) = self.file.take() else {
            return Err(BucketError::writer_closed(&self.name));
        };

        if let Err(err) = self.publish(file).await {
            remove_tmp(&self.tmp).await;
            return Err(err);
        }

        self.state.finish_commit();
        debug!(name = %self.name, path = %self.target.display(), "File saved atomically");
        Ok(())
    }

    async fn discard(&mut self) -> Result<()> {
        self.state.begin_discard(&self.name)?;
        drop(self.file.take());
        remove_tmp(&self.tmp).await;

        debug!(name = %self.name, "Writer discarded");
        Ok(())
    }
}

impl Drop for FsWriter {
    fn drop(&mut self) {
        if matches!(self.state, WriteState::Open | WriteState::Aborted) {
            drop(self.file.take());
            match std::fs::remove_file(&self.tmp) {
                Ok(()) => debug!(name = %self.name, "Abandoned writer cleaned up"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => {
                    warn!(path = %self.tmp.display(), error = %err, "Temp file removal failed");
                },
            }
        }
    }
}

/// Moves a fully synced temporary file over `target`.
///
/// Parent directories are created as needed. Platforms that refuse to replace an existing
/// target get a remove-then-rename fallback.
pub(crate) async fn swap_into_place(tmp: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create parent directories for {}", target.display()))?;
    }

    if let Err(err) = fs::rename(tmp, target).await {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            fs::remove_file(target)
                .await
                .context(format!("Failed to replace existing file: {}", target.display()))?;
            fs::rename(tmp, target).await.context(format!(
                "Atomic swap failed: {} -> {}",
                tmp.display(),
                target.display()
            ))?;
        } else {
            return Err(BucketError::Io {
                source: Arc::new(err),
                context: Some(
                    format!("Atomic swap failed: {} -> {}", tmp.display(), target.display()).into(),
                ),
            });
        }
    }

    if let Some(parent) = target.parent() {
        sync_dir(parent).await;
    }
    Ok(())
}

pub(crate) async fn remove_tmp(tmp: &Path) {
    match fs::remove_file(tmp).await {
        Ok(()) => {},
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => warn!(path = %tmp.display(), error = %err, "Temp file removal failed"),
    }
}

async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}
