//! A uniform abstraction over bucket storage.
//!
//! Object stores, filesystems and remote file servers all reduce to the same contract: list,
//! read, write and delete objects named by slash-separated paths. Callers program against the
//! [`Bucket`] trait and pick a backend at runtime from a URL.
//!
//! # Core Features
//!
//! - **Atomic Writes**: A [`Writer`] stages bytes and publishes them in a single commit. A
//!   discarded or cancelled writer leaves the previous object untouched.
//! - **Lazy Globbing**: [`Bucket::glob`] returns an [`ObjectIterator`] that pages through the
//!   backend on demand and filters by [`Glob`] pattern.
//! - **Namespace Confinement**: [`confine`] and [`Namespace`] keep every name under its root,
//!   whatever `..` segments it contains.
//! - **Scheme Registry**: [`registry`] maps URL schemes to resolvers so that
//!   `registry::connect(&ctx, "file:///srv/data")` yields a ready bucket.
//! - **Reference Backend**: [`InMemBucket`] implements the full contract in memory.
//!
//! # Examples
//!
//! ```rust
//! use stowage::{Bucket, Context, InMemBucket, WriteOptions, collect_names};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stowage::Result<()> {
//! let ctx = Context::background();
//! let bucket = InMemBucket::new();
//!
//! let options = WriteOptions::new().with_content_type("text/plain");
//! let mut writer = bucket.create(&ctx, "reports/2024.txt", Some(&options)).await?;
//! writer.write_all(b"all good").await?;
//! writer.commit().await?;
//!
//! let mut iter = bucket.glob(&ctx, "reports/*.txt").await?;
//! assert_eq!(collect_names(iter.as_mut()).await?, ["reports/2024.txt"]);
//! # Ok(())
//! # }
//! ```

mod bucket;
mod context;
mod error;
mod glob;
mod iter;
mod memory;
mod metadata;
mod namespace;
mod object;
mod read;
mod url;
mod write;

#[cfg(any(test, feature = "conformance"))]
pub mod conformance;
pub mod ops;
pub mod registry;

pub use crate::url::BucketUrl;
pub use ::url::Url;
pub use bucket::{Bucket, BulkRemover, Copier, Reader};
pub use context::{CancelHandle, Context};
pub use error::{BucketError, BucketErrorExt, Result};
pub use glob::Glob;
pub use iter::{Entry, ListIterator, ObjectIterator, Page, PageSource, PagedIterator, collect_names};
pub use memory::InMemBucket;
pub use metadata::{Metadata, ObjectInfo, OptionsExt, WriteOptions, canonical_key};
pub use namespace::{Namespace, clean, confine, norm_object_name};
pub use object::Object;
pub use read::BoundedReader;
pub use registry::Resolver;
pub use write::{BufferedWriter, Publisher, WriteState, Writer};
