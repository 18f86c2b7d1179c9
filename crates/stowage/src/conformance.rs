//! Behavioural suite shared by every [`Bucket`] implementation.
//!
//! Each function exercises one part of the contract against an empty bucket, panics on the
//! first violation and leaves the bucket empty again. Adapters call them from their own tests:
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn globs() {
//!     stowage::conformance::globs(&my_bucket().await).await;
//! }
//! ```

use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::BucketError;
use crate::iter::collect_names;
use crate::metadata::{Metadata, WriteOptions};
use crate::ops;
use chrono::{TimeDelta, Utc};
use tokio::io::AsyncReadExt;

const TEST_DATA: &[u8] = b"TESTDATA";
const MANY_FILES: usize = 2121;

/// Optional attributes a backend stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Supports {
    pub content_type: bool,
    pub metadata: bool,
}

/// Writers publish on commit, refuse a second terminal call and keep the old object visible
/// until the new one commits.
pub async fn writes(bucket: &dyn Bucket) {
    let ctx = Context::background();

    let mut writer = bucket.create(&ctx, "blank.txt", None).await.expect("create");
    assert_eq!(glob(bucket, "*").await, Vec::<String>::new());
    writer.commit().await.expect("commit");
    assert_eq!(glob(bucket, "*").await, ["blank.txt"]);
    assert!(matches!(writer.discard().await, Err(BucketError::WriterClosed { .. })));
    assert!(writer.write(b"late").await.is_err());
    assert!(writer.commit().await.is_err());

    write_test_data(bucket, "path/to/file.txt").await;
    let mut writer = bucket.create(&ctx, "path/to/file.txt", None).await.expect("create");
    writer.write_all(b"replacement").await.expect("write");
    assert_eq!(read(bucket, "path/to/file.txt").await, TEST_DATA);
    writer.commit().await.expect("commit");
    assert_eq!(read(bucket, "path/to/file.txt").await, b"replacement");

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
}

/// A discarded writer publishes nothing and leaves an existing object alone.
pub async fn discards(bucket: &dyn Bucket) {
    let ctx = Context::background();

    let mut writer = bucket.create(&ctx, "blank.txt", None).await.expect("create");
    writer.write_all(b"never seen").await.expect("write");
    assert_eq!(num_entries(bucket, "*").await, 0);
    writer.discard().await.expect("discard");
    assert!(writer.commit().await.is_err());
    assert_eq!(num_entries(bucket, "*").await, 0);

    write_test_data(bucket, "kept.txt").await;
    let mut writer = bucket.create(&ctx, "kept.txt", None).await.expect("create");
    writer.write_all(b"overwrite").await.expect("write");
    writer.discard().await.expect("discard");
    assert_eq!(read(bucket, "kept.txt").await, TEST_DATA);

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
}

/// A commit on a cancelled context fails, publishes nothing and finishes the writer.
pub async fn aborts_on_cancel(bucket: &dyn Bucket) {
    let (ctx, cancel) = Context::background().with_cancel();

    let mut writer = bucket.create(&ctx, "blank.txt", None).await.expect("create");
    writer.write_all(TEST_DATA).await.expect("write");
    assert_eq!(num_entries(bucket, "*").await, 0);
    cancel.cancel();

    let err = writer.commit().await.expect_err("commit on cancelled context");
    assert!(err.is_cancelled(), "expected cancellation, got {err}");
    assert_eq!(num_entries(bucket, "*").await, 0);
    assert!(writer.discard().await.is_err());
}

/// Glob patterns select exactly the expected objects.
pub async fn globs(bucket: &dyn Bucket) {
    write_test_data(bucket, "path/a/first.txt").await;
    write_test_data(bucket, "path/b/second.txt").await;
    write_test_data(bucket, "path/a/third.json").await;

    for (pattern, expected) in [
        ("*", 0),
        ("", 0),
        ("path/*", 0),
        ("path/*/*", 3),
        ("*/*/*", 3),
        ("*/a/*", 2),
        ("*/b/*", 1),
        ("path/*/*.txt", 2),
        ("path/*/[ft]*", 2),
        ("path/*/[ft]*.json", 1),
        ("path/**/*.json", 1),
        ("**", 3),
    ] {
        assert_eq!(num_entries(bucket, pattern).await, expected, "pattern {pattern:?}");
    }

    let err = bucket.glob(&Context::background(), "path/[a").await.expect_err("bad pattern");
    assert!(matches!(err, BucketError::InvalidPattern { .. }));

    ops::remove_all(&Context::background(), bucket, "**").await.expect("remove all");
}

/// `head` reports attributes of stored objects and the not-found sentinel otherwise.
pub async fn heads(bucket: &dyn Bucket, supports: Supports) {
    let ctx = Context::background();
    write_test_data(bucket, "path/to/first.txt").await;

    let err = bucket.head(&ctx, "path/to/missing").await.expect_err("missing object");
    assert!(err.is_not_found(), "expected not found, got {err}");

    let info = bucket.head(&ctx, "path/to/first.txt").await.expect("head");
    assert_eq!(info.name(), "path/to/first.txt");
    assert_eq!(info.size(), TEST_DATA.len() as u64);
    assert!(Utc::now() - info.mod_time() < TimeDelta::minutes(1));

    if supports.metadata {
        let expected: Metadata = [("Cust0m-Key", "VaLu3")].into_iter().collect();
        assert_eq!(info.metadata(), &expected);
    }
    if supports.content_type {
        assert_eq!(info.content_type(), "text/plain");
    }

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
}

/// `open` streams exactly the committed bytes.
pub async fn reads(bucket: &dyn Bucket) {
    let ctx = Context::background();
    write_test_data(bucket, "path/to/first.txt").await;

    let Err(err) = bucket.open(&ctx, "path/to/missing").await else {
        panic!("opening a missing object succeeded");
    };
    assert!(err.is_not_found(), "expected not found, got {err}");

    let mut reader = bucket.open(&ctx, "path/to/first.txt").await.expect("open");
    let mut data = vec![0u8; 100];
    let mut size = 0;
    loop {
        let n = reader.read(&mut data[size..]).await.expect("read");
        if n == 0 {
            break;
        }
        size += n;
    }
    assert_eq!(&data[..size], TEST_DATA);
    drop(reader);

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
}

/// Removal is idempotent.
pub async fn removes(bucket: &dyn Bucket) {
    let ctx = Context::background();
    write_test_data(bucket, "path/to/first.txt").await;
    assert_eq!(num_entries(bucket, "**").await, 1);

    bucket.remove(&ctx, "path/to/first.txt").await.expect("remove");
    assert_eq!(num_entries(bucket, "**").await, 0);
    bucket.remove(&ctx, "path/to/first.txt").await.expect("remove again");
    bucket.remove(&ctx, "missing.txt").await.expect("remove missing");
    for name in ["", "/", "a/.."] {
        bucket.remove(&ctx, name).await.expect("remove root name");
    }
}

/// Writers on one name stage independently and the last commit wins.
///
/// `first` and `second` may be the same bucket or two handles on the same storage.
pub async fn concurrent_writers(first: &dyn Bucket, second: &dyn Bucket) {
    let ctx = Context::background();

    let mut a = first.create(&ctx, "shared/name.txt", None).await.expect("create a");
    let mut b = second.create(&ctx, "shared/name.txt", None).await.expect("create b");
    let mut c = first.create(&ctx, "shared/name.txt", None).await.expect("create c");
    a.write_all(b"from a").await.expect("write a");
    b.write_all(b"from b").await.expect("write b");
    c.write_all(b"from c").await.expect("write c");

    b.commit().await.expect("commit b");
    assert_eq!(read(first, "shared/name.txt").await, b"from b");
    a.commit().await.expect("commit a");
    assert_eq!(read(second, "shared/name.txt").await, b"from a");
    c.discard().await.expect("discard c");
    assert_eq!(read(first, "shared/name.txt").await, b"from a");
    assert_eq!(glob(second, "**").await, ["shared/name.txt"]);

    ops::remove_all(&ctx, first, "**").await.expect("remove all");
}

/// Copies work natively or through the streaming fallback.
pub async fn copies(bucket: &dyn Bucket) {
    let ctx = Context::background();
    write_test_data(bucket, "path/to/src.txt").await;
    assert_eq!(num_entries(bucket, "**").await, 1);

    ops::copy_object(&ctx, bucket, "path/to/src.txt", "path/to/dst.txt", None)
        .await
        .expect("copy");
    assert_eq!(num_entries(bucket, "**").await, 2);

    let info = bucket.head(&ctx, "path/to/dst.txt").await.expect("head copy");
    assert_eq!(info.name(), "path/to/dst.txt");
    assert_eq!(info.size(), TEST_DATA.len() as u64);
    assert!(Utc::now() - info.mod_time() < TimeDelta::minutes(1));
    assert_eq!(read(bucket, "path/to/dst.txt").await, TEST_DATA);

    let err = ops::copy_object(&ctx, bucket, "path/to/missing", "path/to/x", None)
        .await
        .expect_err("copying a missing object");
    assert!(err.is_not_found(), "expected not found, got {err}");

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
}

/// Bulk removal deletes exactly the matching objects.
pub async fn removes_all(bucket: &dyn Bucket) {
    let ctx = Context::background();
    for name in ["a/b.txt", "a/b/c.txt", "d.txt", "e/f.txt"] {
        write_test_data(bucket, name).await;
    }
    assert_eq!(num_entries(bucket, "**").await, 4);

    ops::remove_all(&ctx, bucket, "a/**").await.expect("remove a/**");
    assert_eq!(glob(bucket, "**").await, ["d.txt", "e/f.txt"]);

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
    assert_eq!(num_entries(bucket, "**").await, 0);
}

/// Listing stays complete across many objects, which forces paging in paged backends.
pub async fn many_files(bucket: &dyn Bucket) {
    let ctx = Context::background();
    for i in 0..MANY_FILES {
        let mut writer = bucket.create(&ctx, &many_name(i), None).await.expect("create");
        writer.commit().await.expect("commit");
    }

    assert_eq!(num_entries(bucket, "*/*").await, MANY_FILES);
    assert_eq!(num_entries(bucket, "**").await, MANY_FILES);

    ops::remove_all(&ctx, bucket, "**").await.expect("remove all");
    assert_eq!(num_entries(bucket, "**").await, 0);
}

/// Runs every check in order against one bucket.
pub async fn run_all(bucket: &dyn Bucket, supports: Supports) {
    writes(bucket).await;
    discards(bucket).await;
    aborts_on_cancel(bucket).await;
    globs(bucket).await;
    heads(bucket, supports).await;
    reads(bucket).await;
    removes(bucket).await;
    concurrent_writers(bucket, bucket).await;
    copies(bucket).await;
    removes_all(bucket).await;
}

/// `<letter>/<four letters>.txt`, unique per index.
fn many_name(i: usize) -> String {
    let letter = |n: usize| char::from(b'a' + u8::try_from(n % 26).unwrap_or(0));
    format!(
        "{}/{}{}{}{}.txt",
        letter(i),
        letter(i / 26),
        letter(i / 26 / 26),
        letter(i / 26 / 26 / 26),
        letter(i / 26 / 26 / 26 / 26)
    )
}

async fn glob(bucket: &dyn Bucket, pattern: &str) -> Vec<String> {
    let mut iter = bucket.glob(&Context::background(), pattern).await.expect("glob");
    let mut names = collect_names(iter.as_mut()).await.expect("iterate");
    names.sort();
    names
}

async fn num_entries(bucket: &dyn Bucket, pattern: &str) -> usize {
    glob(bucket, pattern).await.len()
}

async fn read(bucket: &dyn Bucket, name: &str) -> Vec<u8> {
    ops::read_object(&Context::background(), bucket, name).await.expect("read").to_vec()
}

async fn write_test_data(bucket: &dyn Bucket, name: &str) {
    let options =
        WriteOptions::new().with_content_type("text/plain").with_meta("CuSt0m_key", "VaLu3");
    ops::write_object(&Context::background(), bucket, name, TEST_DATA, Some(&options))
        .await
        .expect("write test data");
}
