//! Runs the shared behavioural suite against the reference bucket and against a bucket
//! without native capabilities.

use async_trait::async_trait;
use stowage::conformance::{self, Supports};
use stowage::*;

const SUPPORTS: Supports = Supports { content_type: true, metadata: true };

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct PlainBucket(InMemBucket);

#[async_trait]
impl Bucket for PlainBucket {
    async fn glob(&self, ctx: &Context, pattern: &str) -> Result<Box<dyn ObjectIterator>> {
        self.0.glob(ctx, pattern).await
    }

    async fn head(&self, ctx: &Context, name: &str) -> Result<ObjectInfo> {
        self.0.head(ctx, name).await
    }

    async fn open(&self, ctx: &Context, name: &str) -> Result<Reader> {
        self.0.open(ctx, name).await
    }

    async fn create(
        &self,
        ctx: &Context,
        name: &str,
        options: Option<&WriteOptions>,
    ) -> Result<Box<dyn Writer>> {
        self.0.create(ctx, name, options).await
    }

    async fn remove(&self, ctx: &Context, name: &str) -> Result<()> {
        self.0.remove(ctx, name).await
    }

    async fn close(&self) -> Result<()> {
        self.0.close().await
    }
}

#[tokio::test]
async fn test_in_memory_bucket_conforms() {
    init_tracing();
    let bucket = InMemBucket::new();
    conformance::run_all(&bucket, SUPPORTS).await;
    conformance::many_files(&bucket).await;
    assert!(bucket.is_empty());
}

#[tokio::test]
async fn test_bucket_without_capabilities_conforms() {
    init_tracing();
    let bucket = PlainBucket::default();
    conformance::run_all(&bucket, SUPPORTS).await;
    assert!(bucket.0.is_empty());
}
