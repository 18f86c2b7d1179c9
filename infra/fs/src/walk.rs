use crate::security::object_name;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use stowage::{BucketError, Context, Entry, Page, PageSource, Result};
use walkdir::WalkDir;

/// Lists regular files below a start directory, one page per blocking task.
///
/// Symlinks are never followed and never listed; the staging directory is skipped. `head` and
/// `open` likewise refuse a symlinked file, but they do resolve names through a symlinked
/// directory that stays inside the root, which the walk does not descend into.
pub(crate) struct WalkSource {
    root: PathBuf,
    staging: PathBuf,
    page_size: usize,
    walk: Option<walkdir::IntoIter>,
}

impl fmt::Debug for WalkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkSource")
            .field("root", &self.root)
            .field("page_size", &self.page_size)
            .field("done", &self.walk.is_none())
            .finish_non_exhaustive()
    }
}

impl WalkSource {
    pub(crate) fn new(root: &Path, start: &Path, staging: &Path, page_size: usize) -> Self {
        let walk = WalkDir::new(start).follow_links(false).sort_by_file_name().into_iter();
        Self {
            root: root.to_path_buf(),
            staging: staging.to_path_buf(),
            page_size,
            walk: Some(walk),
        }
    }
}

#[async_trait::async_trait]
impl PageSource for WalkSource {
    async fn fetch(&mut self, _ctx: &Context) -> Result<Page> {
        let Some(walk) = self.walk.take() else {
            return Ok(Page::last(Vec::new()));
        };

        let root = self.root.clone();
        let staging = self.staging.clone();
        let page_size = self.page_size;
        let (walk, page) =
            tokio::task::spawn_blocking(move || next_page(walk, &root, &staging, page_size))
                .await
                .map_err(BucketError::backend)?;
        let page = page?;

        if !page.last {
            self.walk = Some(walk);
        }
        Ok(page)
    }

    async fn close(&mut self) -> Result<()> {
        self.walk = None;
        Ok(())
    }
}

fn next_page(
    mut walk: walkdir::IntoIter,
    root: &Path,
    staging: &Path,
    page_size: usize,
) -> (walkdir::IntoIter, Result<Page>) {
    let mut entries = Vec::with_capacity(page_size);

    loop {
        let Some(next) = walk.next() else {
            return (walk, Ok(Page::last(entries)));
        };

        let entry = match next {
            Ok(entry) => entry,
            // A missing start directory or an entry removed mid-walk lists nothing.
            Err(err) if vanished(&err) => continue,
            Err(err) => return (walk, Err(BucketError::from(std::io::Error::from(err)))),
        };

        if entry.file_type().is_dir() {
            if entry.path() == staging {
                walk.skip_current_dir();
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(name) = object_name(root, entry.path()) else {
            continue;
        };
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) if vanished(&err) => continue,
            Err(err) => return (walk, Err(BucketError::from(std::io::Error::from(err)))),
        };
        let mod_time = meta.modified().map_or(DateTime::UNIX_EPOCH, DateTime::<Utc>::from);
        entries.push(Entry::new(name, meta.len(), mod_time));

        if entries.len() >= page_size {
            return (walk, Ok(Page::more(entries)));
        }
    }
}

fn vanished(err: &walkdir::Error) -> bool {
    err.io_error().is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}
