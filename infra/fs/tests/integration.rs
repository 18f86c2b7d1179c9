use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::{Duration, SystemTime};
use stowage::*;
use stowage_fs::{FsBucket, STAGING_DIR, chroot_resolver};
use tempfile::TempDir;

async fn connect(temp: &TempDir) -> FsBucket {
    FsBucket::builder().root(temp.path()).connect().await.unwrap()
}

fn register_file_scheme() {
    static ONCE: Once = Once::new();
    ONCE.call_once(stowage_fs::register);
}

fn staged_files(bucket: &FsBucket) -> usize {
    std::fs::read_dir(bucket.staging_dir()).map_or(0, Iterator::count)
}

#[tokio::test]
async fn test_path_traversal_is_confined() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();

    let (key, path) = bucket.resolve("../../etc/passwd").unwrap();
    assert_eq!(key, "etc/passwd");
    assert!(path.starts_with(bucket.root()));

    ops::write_object(&ctx, &bucket, "foo/../../escape.txt", b"x", None).await.unwrap();
    assert!(bucket.root().join("escape.txt").is_file());
    assert_eq!(bucket.head(&ctx, "/escape.txt").await.unwrap().name(), "escape.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_blocked() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

    let bucket = connect(&temp).await;
    std::os::unix::fs::symlink(outside.path(), bucket.root().join("link")).unwrap();
    let ctx = Context::background();

    let err = bucket.head(&ctx, "link/secret.txt").await.unwrap_err();
    match err {
        BucketError::PathEscape { .. } => {},
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(bucket.create(&ctx, "link/new.txt", None).await.is_err());
    assert!(bucket.glob(&ctx, "link/*").await.is_err());

    let mut iter = bucket.glob(&ctx, "**").await.unwrap();
    assert!(collect_names(iter.as_mut()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_staging_is_hidden() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    assert_eq!(bucket.staging_dir(), bucket.root().join(STAGING_DIR));

    let mut writer = bucket.create(&ctx, "pending.txt", None).await.unwrap();
    writer.write_all(b"in flight").await.unwrap();
    assert_eq!(staged_files(&bucket), 1);

    let mut iter = bucket.glob(&ctx, "**").await.unwrap();
    assert!(collect_names(iter.as_mut()).await.unwrap().is_empty());

    let err = bucket.create(&ctx, ".stowtmp/sneaky.txt", None).await.unwrap_err();
    assert!(matches!(err, BucketError::PathEscape { .. }));

    writer.commit().await.unwrap();
    assert_eq!(staged_files(&bucket), 0);
}

#[tokio::test]
async fn test_dropped_writer_cleans_up() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();

    let mut writer = bucket.create(&ctx, "never.txt", None).await.unwrap();
    writer.write_all(b"lost").await.unwrap();
    drop(writer);

    assert_eq!(staged_files(&bucket), 0);
    assert!(bucket.head(&ctx, "never.txt").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_stale_temp_files_purged_on_connect() {
    let temp = TempDir::new().unwrap();
    let staging = temp.path().join(STAGING_DIR);
    std::fs::create_dir_all(&staging).unwrap();

    let stale = staging.join("old.txt.stowtmp.7");
    let file = std::fs::File::create(&stale).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(3600)).unwrap();
    drop(file);
    let fresh = staging.join("new.txt.stowtmp.8");
    std::fs::File::create(&fresh).unwrap();

    let _bucket = connect(&temp).await;
    assert!(!stale.exists());
    assert!(fresh.exists());
}

#[tokio::test]
async fn test_custom_tmp_dir() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("objects");
    let staging = temp.path().join("staging");
    let bucket = FsBucket::builder().root(&root).tmp_dir(&staging).connect().await.unwrap();
    let ctx = Context::background();

    let mut writer = bucket.create(&ctx, "a.txt", None).await.unwrap();
    writer.write_all(b"abc").await.unwrap();
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 1);
    writer.commit().await.unwrap();

    assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"abc");
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
}

#[tokio::test]
async fn test_directories_are_not_objects() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    ops::write_object(&ctx, &bucket, "dir/file.txt", b"x", None).await.unwrap();

    assert!(bucket.head(&ctx, "dir").await.unwrap_err().is_not_found());
    let Err(err) = bucket.open(&ctx, "dir").await else {
        panic!("opening a directory succeeded");
    };
    assert!(err.is_not_found());
    assert!(bucket.head(&ctx, "dir/file.txt/nested").await.unwrap_err().is_not_found());

    bucket.remove(&ctx, "dir").await.unwrap();
    assert!(bucket.root().join("dir/file.txt").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_files_are_not_objects() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    ops::write_object(&ctx, &bucket, "real.txt", b"x", None).await.unwrap();
    std::os::unix::fs::symlink(bucket.root().join("real.txt"), bucket.root().join("alias.txt"))
        .unwrap();

    assert!(bucket.head(&ctx, "alias.txt").await.unwrap_err().is_not_found());
    let Err(err) = bucket.open(&ctx, "alias.txt").await else {
        panic!("opening a symlink succeeded");
    };
    assert!(err.is_not_found());

    let mut iter = bucket.glob(&ctx, "*").await.unwrap();
    assert_eq!(collect_names(iter.as_mut()).await.unwrap(), ["real.txt"]);
}

#[tokio::test]
async fn test_remove_of_root_names_is_noop() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    ops::write_object(&ctx, &bucket, "a/keep.txt", b"x", None).await.unwrap();

    for name in ["", "/", "a/..", "../.."] {
        bucket.remove(&ctx, name).await.unwrap();
    }
    assert!(bucket.root().join("a/keep.txt").is_file());
}

#[tokio::test]
async fn test_create_ignores_temp_files_of_other_connections() {
    let temp = TempDir::new().unwrap();
    let first = connect(&temp).await;
    let second = connect(&temp).await;
    let ctx = Context::background();

    std::fs::create_dir_all(first.staging_dir()).unwrap();
    std::fs::write(first.staging_dir().join("x.txt.stowtmp.1"), b"leftover").unwrap();

    let mut a = first.create(&ctx, "x.txt", None).await.unwrap();
    let mut b = second.create(&ctx, "x.txt", None).await.unwrap();
    a.write_all(b"first").await.unwrap();
    b.write_all(b"second").await.unwrap();
    a.commit().await.unwrap();
    b.commit().await.unwrap();

    assert_eq!(ops::read_object(&ctx, &first, "x.txt").await.unwrap(), "second");
    assert_eq!(staged_files(&first), 1);
}

#[tokio::test]
async fn test_copy_streams_through_staging() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 253) as u8).collect();
    ops::write_object(&ctx, &bucket, "big.bin", &data, None).await.unwrap();

    let copier = bucket.as_copier().unwrap();
    copier.copy(&ctx, "big.bin", "backup/big.bin").await.unwrap();
    assert_eq!(ops::read_object(&ctx, &bucket, "backup/big.bin").await.unwrap(), data);
    assert_eq!(staged_files(&bucket), 0);

    let (cancelled, cancel) = ctx.with_cancel();
    cancel.cancel();
    let err = copier.copy(&cancelled, "big.bin", "other/big.bin").await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(staged_files(&bucket), 0);
    assert!(!bucket.root().join("other").exists());
}

#[tokio::test]
async fn test_remove_prunes_empty_parents() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    let ctx = Context::background();
    ops::write_object(&ctx, &bucket, "a/b/c/deep.txt", b"x", None).await.unwrap();
    ops::write_object(&ctx, &bucket, "a/keep.txt", b"x", None).await.unwrap();

    bucket.remove(&ctx, "a/b/c/deep.txt").await.unwrap();
    assert!(!bucket.root().join("a/b").exists());
    assert!(bucket.root().join("a/keep.txt").is_file());
    assert!(bucket.root().is_dir());
}

#[tokio::test]
async fn test_connect_without_create_requires_root() {
    let temp = TempDir::new().unwrap();
    let err = FsBucket::builder().root(temp.path().join("missing")).create(false).connect().await;
    match err {
        Err(BucketError::Io { .. }) => {},
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_glob_narrows_to_literal_prefix() {
    let temp = TempDir::new().unwrap();
    let bucket = FsBucket::builder().root(temp.path()).page_size(2).connect().await.unwrap();
    let ctx = Context::background();
    for name in ["logs/1.txt", "logs/2.txt", "logs/3.txt", "logs/4.log", "other/5.txt"] {
        ops::write_object(&ctx, &bucket, name, b"x", None).await.unwrap();
    }

    let mut iter = bucket.glob(&ctx, "logs/*.txt").await.unwrap();
    let names = collect_names(iter.as_mut()).await.unwrap();
    assert_eq!(names, ["logs/1.txt", "logs/2.txt", "logs/3.txt"]);

    let mut iter = bucket.glob(&ctx, "missing/dir/*").await.unwrap();
    assert!(collect_names(iter.as_mut()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_glob_observes_cancellation() {
    let temp = TempDir::new().unwrap();
    let bucket = connect(&temp).await;
    ops::write_object(&Context::background(), &bucket, "a.txt", b"x", None).await.unwrap();

    let (ctx, cancel) = Context::background().with_cancel();
    let mut iter = bucket.glob(&ctx, "*").await.unwrap();
    cancel.cancel();
    assert!(!iter.next().await);
    assert!(iter.error().is_some_and(BucketError::is_cancelled));
}

#[tokio::test]
async fn test_file_scheme_registered() {
    register_file_scheme();
    let temp = TempDir::new().unwrap();
    let ctx = Context::background();

    let url = format!("file://{}/data?page_size=8", temp.path().display());
    let bucket = registry::connect(&ctx, &url).await.unwrap();
    ops::write_object(&ctx, bucket.as_ref(), "x/y.txt", b"hello", None).await.unwrap();

    assert_eq!(std::fs::read(temp.path().join("data/x/y.txt")).unwrap(), b"hello");
}

#[cfg(unix)]
#[tokio::test]
async fn test_object_from_file_url() {
    register_file_scheme();
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let ctx = Context::background();

    let url = format!("file://{}/doc.txt?tmpdir={}/staging", root.display(), root.display());
    let object = Object::from_url(&ctx, &url).await.unwrap();
    assert!(object.name().ends_with("doc.txt"));

    let mut writer = object.create(&ctx, None).await.unwrap();
    writer.write_all(b"via url").await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(std::fs::read(root.join("doc.txt")).unwrap(), b"via url");
    assert_eq!(object.head(&ctx).await.unwrap().size(), 7);
}

#[tokio::test]
async fn test_chroot_resolver_confines_urls() {
    let temp = TempDir::new().unwrap();
    let root: PathBuf = temp.path().to_path_buf();
    let resolver = chroot_resolver(root.clone(), None);
    let ctx = Context::background();

    let url = Url::parse("tenant://acme/../../outside/reports").unwrap();
    let bucket: Arc<dyn Bucket> = resolver.resolve(&ctx, &url).await.unwrap();
    ops::write_object(&ctx, bucket.as_ref(), "q1.txt", b"up", None).await.unwrap();

    assert!(root.join("acme/outside/reports/q1.txt").is_file());
    assert!(!root.join("outside").exists());
}
