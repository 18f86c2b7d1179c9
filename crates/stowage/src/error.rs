use std::borrow::Cow;
use std::sync::Arc;

/// A specialized [`Result`] for bucket operations.
pub type Result<T, E = BucketError> = std::result::Result<T, E>;

/// The error taxonomy shared by every bucket backend.
///
/// Adapters translate their native failures into these variants, so callers can branch on the
/// kind of failure without knowing which store sits behind a [`Bucket`](crate::Bucket).
/// Sources are reference-counted so that an iterator can keep reporting a sticky error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BucketError {
    #[error("Object not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid glob pattern{}: {message}", format_context(.context))]
    InvalidPattern { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Operation cancelled{}", format_context(.context))]
    Cancelled { context: Option<Cow<'static, str>> },

    #[error("Deadline exceeded{}", format_context(.context))]
    DeadlineExceeded { context: Option<Cow<'static, str>> },

    #[error("Writer already committed or discarded{}: {message}", format_context(.context))]
    WriterClosed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("No resolver registered for scheme{}: {message}", format_context(.context))]
    UnknownScheme { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid bucket URL{}: {message}", format_context(.context))]
    InvalidUrl { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path escapes bucket root{}: {message}", format_context(.context))]
    PathEscape { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: Arc<std::io::Error>, context: Option<Cow<'static, str>> },

    #[error("Backend failure{}: {source}", format_context(.context))]
    Backend {
        source: Arc<dyn std::error::Error + Send + Sync>,
        context: Option<Cow<'static, str>>,
    },
}

impl BucketError {
    /// Builds the not-found sentinel for an object name.
    pub fn not_found(name: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: name.into(), context: None }
    }

    pub fn invalid_pattern(pattern: &str, reason: &'static str) -> Self {
        Self::InvalidPattern { message: pattern.to_owned().into(), context: Some(reason.into()) }
    }

    pub fn writer_closed(name: &str) -> Self {
        Self::WriterClosed { message: name.to_owned().into(), context: None }
    }

    /// Wraps an opaque backend error.
    pub fn backend<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend { source: Arc::new(source), context: None }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for both cancellation and an expired deadline.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }

    #[must_use]
    pub fn context_str(&self) -> Option<&str> {
        match self {
            Self::NotFound { context, .. }
            | Self::InvalidPattern { context, .. }
            | Self::Cancelled { context }
            | Self::DeadlineExceeded { context }
            | Self::WriterClosed { context, .. }
            | Self::UnknownScheme { context, .. }
            | Self::InvalidUrl { context, .. }
            | Self::PathEscape { context, .. }
            | Self::Io { context, .. }
            | Self::Backend { context, .. } => context.as_deref(),
        }
    }

    fn set_context(&mut self, value: Cow<'static, str>) {
        match self {
            Self::NotFound { context, .. }
            | Self::InvalidPattern { context, .. }
            | Self::Cancelled { context }
            | Self::DeadlineExceeded { context }
            | Self::WriterClosed { context, .. }
            | Self::UnknownScheme { context, .. }
            | Self::InvalidUrl { context, .. }
            | Self::PathEscape { context, .. }
            | Self::Io { context, .. }
            | Self::Backend { context, .. } => *context = Some(value),
        }
    }
}

impl From<std::io::Error> for BucketError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source: Arc::new(source), context: None }
    }
}

/// Adds `.context(...)` to results that convert into [`BucketError`].
pub trait BucketErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T>;
}

impl<T> BucketErrorExt<T> for Result<T, BucketError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            e.set_context(context.into());
            e
        })
    }
}

impl<T> BucketErrorExt<T> for std::result::Result<T, std::io::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T> {
        self.map_err(|source| BucketError::Io {
            source: Arc::new(source),
            context: Some(context.into()),
        })
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
