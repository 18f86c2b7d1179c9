use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

/// Yields exactly `len` bytes of the wrapped reader.
///
/// Bytes a transport delivers past the declared length are dropped, and a stream that ends
/// early fails with [`io::ErrorKind::UnexpectedEof`] instead of looking complete.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R> BoundedReader<R> {
    pub const fn new(inner: R, len: u64) -> Self {
        Self { inner, remaining: len }
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BoundedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining == 0 || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        let read = buf.filled().len() - before;

        if read == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("object ended {} bytes short of its content length", self.remaining),
            )));
        }

        let allowed = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let kept = read.min(allowed);
        buf.set_filled(before + kept);
        self.remaining -= kept as u64;

        Poll::Ready(Ok(()))
    }
}
