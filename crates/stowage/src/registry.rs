//! Process-wide table mapping URL schemes to bucket resolvers.
//!
//! Adapters register themselves once, typically from their own `register()` function, and
//! callers then obtain buckets from plain URLs:
//!
//! ```rust
//! use std::sync::Arc;
//! use stowage::{Bucket, BucketError, Context, InMemBucket, Url, registry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stowage::Result<()> {
//! registry::register("doc-mem", |_ctx: Context, _url: Url| async {
//!     let bucket: Arc<dyn Bucket> = Arc::new(InMemBucket::new());
//!     Ok::<_, BucketError>(bucket)
//! });
//!
//! let bucket = registry::connect(&Context::background(), "doc-mem://anything").await?;
//! assert!(bucket.head(&Context::background(), "missing").await.is_err());
//! # Ok(())
//! # }
//! ```

use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::{BucketError, Result};
use crate::namespace::{clean, norm_object_name};
use async_trait::async_trait;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use url::Url;

/// Builds a bucket from a URL.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, ctx: &Context, url: &Url) -> Result<Arc<dyn Bucket>>;
}

#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(Context, Url) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Arc<dyn Bucket>>> + Send,
{
    async fn resolve(&self, ctx: &Context, url: &Url) -> Result<Arc<dyn Bucket>> {
        (self)(ctx.clone(), url.clone()).await
    }
}

/// What a scheme resolves through.
#[derive(Clone)]
enum Registration {
    Resolver(Arc<dyn Resolver>),
    /// A fixed instance; the URL host becomes the first segment of object names.
    Bucket(Arc<dyn Bucket>),
}

static REGISTRY: LazyLock<Mutex<FxHashMap<String, Registration>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

fn insert(scheme: &str, registration: Registration) {
    let mut registry = REGISTRY.lock();
    if registry.contains_key(scheme) {
        drop(registry);
        panic!("stowage: resolver for scheme {scheme:?} is already registered");
    }
    registry.insert(scheme.to_owned(), registration);
    drop(registry);

    info!(scheme, "Registered bucket resolver");
}

/// Registers `resolver` for `scheme`.
///
/// # Panics
///
/// Panics when a resolver is already registered for `scheme`. Two adapters claiming one scheme
/// is a wiring bug that must not be resolved silently.
pub fn register<R>(scheme: &str, resolver: R)
where
    R: Resolver + 'static,
{
    insert(scheme, Registration::Resolver(Arc::new(resolver)));
}

/// Registers a fixed bucket instance for `scheme`; every URL with that scheme resolves to it.
///
/// [`resolve_path`] keeps the URL host as the first segment of the object name, so
/// `mem://a/x.txt` and `mem://b/x.txt` address different objects of the shared bucket.
///
/// # Panics
///
/// Panics when `scheme` is already registered.
pub fn register_bucket(scheme: &str, bucket: Arc<dyn Bucket>) {
    insert(scheme, Registration::Bucket(bucket));
}

/// Removes the resolver for `scheme`, returning whether one was registered.
pub fn unregister(scheme: &str) -> bool {
    REGISTRY.lock().remove(scheme).is_some()
}

#[must_use]
pub fn is_registered(scheme: &str) -> bool {
    REGISTRY.lock().contains_key(scheme)
}

fn lookup(url: &Url) -> Result<Registration> {
    let registration = REGISTRY.lock().get(url.scheme()).cloned();
    registration.ok_or_else(|| BucketError::UnknownScheme {
        message: url.scheme().to_owned().into(),
        context: Some(url.to_string().into()),
    })
}

/// Resolves a parsed URL through the resolver registered for its scheme.
pub async fn resolve(ctx: &Context, url: &Url) -> Result<Arc<dyn Bucket>> {
    ctx.check()?;
    let registration = lookup(url)?;

    debug!(scheme = url.scheme(), "Resolving bucket");
    match registration {
        Registration::Resolver(resolver) => resolver.resolve(ctx, url).await,
        Registration::Bucket(bucket) => Ok(bucket),
    }
}

/// Parses `raw` and resolves it.
pub async fn connect(ctx: &Context, raw: &str) -> Result<Arc<dyn Bucket>> {
    let url = parse_url(raw)?;
    resolve(ctx, &url).await
}

/// Splits `raw` into a bucket and the object name given by its path.
///
/// The resolver sees the URL with its path reset to `/`, so it builds the bucket and not a
/// handle on the object. For schemes bound with [`register_bucket`] the name is
/// `host/path`.
pub async fn resolve_path(ctx: &Context, raw: &str) -> Result<(Arc<dyn Bucket>, String)> {
    let mut url = parse_url(raw)?;
    ctx.check()?;
    let registration = lookup(&url)?;

    let path = match (&registration, url.host_str()) {
        (Registration::Bucket(_), Some(host)) if !host.is_empty() => {
            format!("{host}/{}", url.path())
        },
        _ => url.path().to_owned(),
    };
    let name = norm_object_name(&clean(&path));
    if name.is_empty() {
        return Err(BucketError::InvalidUrl {
            message: raw.to_owned().into(),
            context: Some("URL path does not name an object".into()),
        });
    }

    debug!(scheme = url.scheme(), name = %name, "Resolving object");
    let bucket = match registration {
        Registration::Resolver(resolver) => {
            url.set_path("/");
            resolver.resolve(ctx, &url).await?
        },
        Registration::Bucket(bucket) => bucket,
    };
    Ok((bucket, name))
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| BucketError::InvalidUrl {
        message: raw.to_owned().into(),
        context: Some(e.to_string().into()),
    })
}
