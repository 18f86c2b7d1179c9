//! Cancellation and deadline signal carried by every bucket operation.
//!
//! A [`Context`] is a cheap, cloneable handle. Derived contexts form a tree: cancelling a parent
//! cancels every live child, and a child's deadline is never later than its parent's.

use crate::error::{BucketError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct ContextInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    notify: Notify,
    children: Mutex<Vec<Weak<ContextInner>>>,
}

impl ContextInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cancellation signal and optional deadline for an operation.
///
/// ```rust
/// use stowage::Context;
///
/// let (ctx, cancel) = Context::background().with_cancel();
/// assert!(ctx.check().is_ok());
///
/// cancel.cancel();
/// assert!(ctx.err().is_some_and(|e| e.is_cancelled()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Cancels the [`Context`] it was created with, and all contexts derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<ContextInner>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Context {
    /// A root context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child context together with the handle that cancels it.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let child = self.child(None);
        let handle = CancelHandle { inner: Arc::clone(&child.inner) };
        (child, handle)
    }

    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.child(Some(deadline))
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Reports why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<BucketError> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(BucketError::Cancelled { context: None });
        }
        match self.inner.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                Some(BucketError::DeadlineExceeded { context: None })
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    pub fn check(&self) -> Result<()> {
        self.err().map_or(Ok(()), Err)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> BucketError {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(err) = self.err() {
                return err;
            }

            match self.inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = &mut notified => {},
                        () = tokio::time::sleep_until(deadline) => {},
                    }
                },
                None => notified.await,
            }
        }
    }

    /// Drives `fut` to completion unless the context finishes first.
    ///
    /// The future is dropped when the context wins the race, so callers must only pass work
    /// that is safe to abandon midway.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        let deadline = match (self.inner.deadline, deadline) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        let inner = Arc::new(ContextInner { deadline, ..ContextInner::default() });

        if self.inner.cancelled.load(Ordering::Acquire) {
            inner.cancelled.store(true, Ordering::Release);
        } else {
            let mut children = self.inner.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&inner));
            drop(children);

            // A cancel may have raced with registration.
            if self.inner.cancelled.load(Ordering::Acquire) {
                inner.cancel();
            }
        }

        Self { inner }
    }
}
