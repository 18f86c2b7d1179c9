//! Stage-then-commit write protocol.
//!
//! Bytes written to a [`Writer`] are invisible until [`commit`](Writer::commit) publishes them
//! atomically. [`discard`](Writer::discard) drops the staged bytes and leaves any previous
//! object untouched. Exactly one terminal call is accepted; the writer is finished once it has
//! been attempted, whatever the outcome.

use crate::context::Context;
use crate::error::{BucketError, Result};
use crate::metadata::WriteOptions;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::fmt;
use tracing::debug;

/// Lifecycle of a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteState {
    #[default]
    Open,
    Committed,
    Discarded,
    /// A commit was attempted and failed. Nothing was published.
    Aborted,
}

impl WriteState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }

    pub fn ensure_open(self, name: &str) -> Result<()> {
        if self.is_terminal() {
            return Err(BucketError::writer_closed(name));
        }
        Ok(())
    }

    /// Moves an open writer into the commit attempt. The state stays `Aborted` until
    /// [`finish_commit`](Self::finish_commit) confirms the publish.
    pub fn begin_commit(&mut self, name: &str) -> Result<()> {
        self.ensure_open(name)?;
        *self = Self::Aborted;
        Ok(())
    }

    pub const fn finish_commit(&mut self) {
        *self = Self::Committed;
    }

    pub fn begin_discard(&mut self, name: &str) -> Result<()> {
        self.ensure_open(name)?;
        *self = Self::Discarded;
        Ok(())
    }
}

/// A staging area for exactly one object.
#[async_trait]
pub trait Writer: Send + fmt::Debug {
    /// The object name this writer publishes to.
    fn name(&self) -> &str;

    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    async fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Publishes the staged bytes. Fails without publishing when the context is done.
    async fn commit(&mut self) -> Result<()>;

    /// Drops the staged bytes. Succeeds even when the context is done.
    async fn discard(&mut self) -> Result<()>;
}

/// One-shot upload target used by [`BufferedWriter`].
#[async_trait]
pub trait Publisher: Send + Sync + fmt::Debug {
    async fn publish(
        &self,
        ctx: &Context,
        name: &str,
        data: Bytes,
        options: &WriteOptions,
    ) -> Result<()>;
}

/// Stages writes in memory and hands the whole payload to a [`Publisher`] on commit.
///
/// This is the two-phase shim for backends whose native upload takes the complete object.
#[derive(Debug)]
pub struct BufferedWriter<P> {
    ctx: Context,
    name: String,
    options: WriteOptions,
    buffer: BytesMut,
    state: WriteState,
    publisher: P,
}

impl<P: Publisher> BufferedWriter<P> {
    pub fn new(ctx: &Context, name: &str, options: Option<&WriteOptions>, publisher: P) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_owned(),
            options: options.cloned().unwrap_or_default(),
            buffer: BytesMut::new(),
            state: WriteState::Open,
            publisher,
        }
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub const fn state(&self) -> WriteState {
        self.state
    }
}

#[async_trait]
impl<P: Publisher> Writer for BufferedWriter<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.state.ensure_open(&self.name)?;
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn commit(&mut self) -> Result<()> {
        self.state.begin_commit(&self.name)?;
        let data = std::mem::take(&mut self.buffer).freeze();

        self.ctx.check()?;
        let size = data.len();
        self.publisher.publish(&self.ctx, &self.name, data, &self.options).await?;

        self.state.finish_commit();
        debug!(name = %self.name, size, "Object committed");
        Ok(())
    }

    async fn discard(&mut self) -> Result<()> {
        self.state.begin_discard(&self.name)?;
        self.buffer = BytesMut::new();
        debug!(name = %self.name, "Writer discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    struct Recorder {
        published: Arc<Mutex<Vec<(String, Bytes)>>>,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(
            &self,
            _ctx: &Context,
            name: &str,
            data: Bytes,
            _options: &WriteOptions,
        ) -> Result<()> {
            self.published.lock().push((name.to_owned(), data));
            Ok(())
        }
    }

    #[test]
    fn state_machine_rejects_second_terminal() {
        let mut state = WriteState::Open;
        state.begin_commit("x").unwrap();
        assert_eq!(state, WriteState::Aborted);
        assert!(state.begin_discard("x").is_err());
        assert!(state.begin_commit("x").is_err());

        let mut state = WriteState::Open;
        state.begin_discard("x").unwrap();
        assert!(matches!(state.begin_commit("x"), Err(BucketError::WriterClosed { .. })));
    }

    #[tokio::test]
    async fn commit_publishes_staged_bytes() {
        let recorder = Recorder::default();
        let mut writer =
            BufferedWriter::new(&Context::background(), "a.txt", None, recorder.clone());
        writer.write_all(b"hello ").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        assert_eq!(writer.buffered(), 11);
        assert!(recorder.published.lock().is_empty());

        writer.commit().await.unwrap();
        assert_eq!(writer.state(), WriteState::Committed);
        assert_eq!(writer.buffered(), 0);

        let published = recorder.published.lock();
        let expected = [("a.txt".to_owned(), Bytes::from_static(b"hello world"))];
        assert_eq!(published.as_slice(), expected);
    }

    #[tokio::test]
    async fn cancelled_commit_publishes_nothing() {
        let recorder = Recorder::default();
        let (ctx, cancel) = Context::background().with_cancel();
        let mut writer = BufferedWriter::new(&ctx, "a.txt", None, recorder.clone());
        writer.write_all(b"data").await.unwrap();

        cancel.cancel();
        let err = writer.commit().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(recorder.published.lock().is_empty());
        assert_eq!(writer.buffered(), 0);
        assert!(writer.discard().await.is_err());
    }

    #[tokio::test]
    async fn discard_on_cancelled_context_succeeds() {
        let (ctx, cancel) = Context::background().with_cancel();
        let mut writer = BufferedWriter::new(&ctx, "a.txt", None, Recorder::default());
        writer.write_all(b"data").await.unwrap();
        cancel.cancel();

        writer.discard().await.unwrap();
        assert!(writer.write(b"more").await.is_err());
        assert!(writer.commit().await.is_err());
    }
}
