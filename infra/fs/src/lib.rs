//! Local filesystem adapter for [`stowage`].
//!
//! [`FsBucket`] stores each object as a regular file below a root directory and implements the
//! full [`Bucket`](stowage::Bucket) contract, including native copy and bulk removal.
//!
//! # Core Features
//!
//! - **Sandbox Security**: Names are confined lexically, then checked against the canonical root
//!   so symlinks cannot lead outside of it.
//! - **Atomic Writes**: Writers stage into a unique temp file, `fsync` it and rename it over the
//!   target on commit.
//! - **Lazy Globbing**: Directory walks run on blocking tasks one page at a time, starting from
//!   the pattern's literal prefix.
//! - **Self-Healing**: Stale temp files left behind by crashed writers are purged on connect.
//!
//! # Examples
//!
//! ```rust
//! use stowage::{Context, ops, registry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stowage::Result<()> {
//! # let tmp = tempfile::tempdir().unwrap();
//! stowage_fs::register();
//!
//! let ctx = Context::background();
//! let url = format!("file://{}/data", tmp.path().display());
//! let bucket = registry::connect(&ctx, &url).await?;
//!
//! ops::write_object(&ctx, bucket.as_ref(), "notes/today.txt", b"ship it", None).await?;
//! assert_eq!(ops::read_object(&ctx, bucket.as_ref(), "notes/today.txt").await?, "ship it");
//! # Ok(())
//! # }
//! ```

mod bucket;
mod builder;
mod config;
mod error;
mod maintenance;
mod resolver;
mod security;
mod walk;
mod writer;

pub use bucket::{FsBucket, FsInner};
pub use builder::{FsBucketBuilder, NoRoot, STAGING_DIR, WithRoot};
pub use config::FsConfig;
pub use resolver::{chroot_resolver, resolve_url};

/// The URL scheme [`register`] installs.
pub const SCHEME: &str = "file";

/// Registers [`resolve_url`] for `file://` URLs.
///
/// # Panics
///
/// Panics when a resolver for `file` is already registered.
pub fn register() {
    stowage::registry::register(SCHEME, resolve_url);
}
