//! Cursor protocol for listing objects.
//!
//! Iterators are lazy and single-owner: they advance through `&mut self`, keep the first error
//! they hit, and can be closed at any point. Restarting means globbing again.

use crate::context::Context;
use crate::error::{BucketError, Result};
use crate::glob::Glob;
use crate::metadata::ObjectInfo;
use crate::namespace::Namespace;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

/// One listed object: name, size and modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    size: u64,
    mod_time: DateTime<Utc>,
}

impl Entry {
    pub fn new(name: impl Into<String>, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self { name: name.into(), size, mod_time }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    #[must_use]
    fn renamed(self, name: &str) -> Self {
        Self { name: name.to_owned(), ..self }
    }
}

impl From<&ObjectInfo> for Entry {
    fn from(info: &ObjectInfo) -> Self {
        Self::new(info.name(), info.size(), info.mod_time())
    }
}

/// A cursor over the objects selected by a glob.
///
/// The accessors describe the entry the last successful [`next`](Self::next) moved to; they
/// return empty values before the first advance and after exhaustion.
#[async_trait]
pub trait ObjectIterator: Send + fmt::Debug {
    /// Advances to the next entry. `false` means exhausted, closed or failed; check
    /// [`error`](Self::error) to tell them apart.
    async fn next(&mut self) -> bool;

    fn entry(&self) -> Option<&Entry>;

    fn name(&self) -> &str {
        self.entry().map_or("", Entry::name)
    }

    fn size(&self) -> u64 {
        self.entry().map_or(0, Entry::size)
    }

    fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.entry().map(Entry::mod_time)
    }

    /// The first error met while advancing, if any. Sticky.
    fn error(&self) -> Option<&BucketError>;

    /// Releases the iterator's resources. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Iterates an owned snapshot of entries.
#[derive(Debug, Default)]
pub struct ListIterator {
    entries: Vec<Entry>,
    pos: Option<usize>,
    closed: bool,
}

impl ListIterator {
    #[must_use]
    pub const fn new(entries: Vec<Entry>) -> Self {
        Self { entries, pos: None, closed: false }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ObjectIterator for ListIterator {
    async fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let next = self.pos.map_or(0, |p| p + 1).min(self.entries.len());
        self.pos = Some(next);
        next < self.entries.len()
    }

    fn entry(&self) -> Option<&Entry> {
        self.pos.and_then(|p| self.entries.get(p))
    }

    fn error(&self) -> Option<&BucketError> {
        None
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pos = None;
        self.entries.clear();
        Ok(())
    }
}

/// One batch of raw listing results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Entries named by their raw backend keys.
    pub entries: Vec<Entry>,
    /// No further page follows.
    pub last: bool,
}

impl Page {
    #[must_use]
    pub const fn more(entries: Vec<Entry>) -> Self {
        Self { entries, last: false }
    }

    #[must_use]
    pub const fn last(entries: Vec<Entry>) -> Self {
        Self { entries, last: true }
    }
}

/// A backend's paginated listing.
#[async_trait]
pub trait PageSource: Send + fmt::Debug {
    async fn fetch(&mut self, ctx: &Context) -> Result<Page>;

    /// Releases any listing handle. Called once when the iterator closes.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Lazily pages through a [`PageSource`], keeping only entries inside the namespace that match
/// the glob. Nothing is fetched before the first [`next`](ObjectIterator::next), and at most one
/// page is buffered.
#[derive(Debug)]
pub struct PagedIterator<S> {
    ctx: Context,
    source: S,
    glob: Glob,
    namespace: Namespace,
    page: VecDeque<Entry>,
    current: Option<Entry>,
    last: bool,
    err: Option<BucketError>,
    closed: bool,
}

impl<S: PageSource> PagedIterator<S> {
    pub fn new(ctx: &Context, source: S, glob: Glob, namespace: Namespace) -> Self {
        let last = glob.matches_nothing();
        Self {
            ctx: ctx.clone(),
            source,
            glob,
            namespace,
            page: VecDeque::new(),
            current: None,
            last,
            err: None,
            closed: false,
        }
    }

    fn accept(&self, entry: Entry) -> Option<Entry> {
        let name = self.namespace.strip(entry.name())?;
        if name.is_empty() || name.ends_with('/') || !self.glob.is_match(name) {
            return None;
        }
        let name = name.to_owned();
        Some(entry.renamed(&name))
    }
}

#[async_trait]
impl<S: PageSource> ObjectIterator for PagedIterator<S> {
    async fn next(&mut self) -> bool {
        self.current = None;
        if self.closed || self.err.is_some() {
            return false;
        }

        loop {
            if let Some(entry) = self.page.pop_front() {
                self.current = Some(entry);
                return true;
            }
            if self.last {
                return false;
            }

            let fetched = self.ctx.run(self.source.fetch(&self.ctx)).await;
            match fetched {
                Ok(page) => {
                    self.last = page.last;
                    let accepted: VecDeque<Entry> =
                        page.entries.into_iter().filter_map(|e| self.accept(e)).collect();
                    self.page = accepted;
                },
                Err(err) => {
                    self.err = Some(err);
                    return false;
                },
            }
        }
    }

    fn entry(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    fn error(&self) -> Option<&BucketError> {
        self.err.as_ref()
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        self.page.clear();
        self.source.close().await
    }
}

/// Drains an iterator into the names it yields, then closes it.
///
/// The iterator's sticky error wins over a close failure.
pub async fn collect_names(iter: &mut dyn ObjectIterator) -> Result<Vec<String>> {
    let mut names = Vec::new();
    while iter.next().await {
        names.push(iter.name().to_owned());
    }
    let err = iter.error().cloned();
    let closed = iter.close().await;

    match err {
        Some(err) => Err(err),
        None => closed.map(|()| names),
    }
}
