use serial_test::serial;
use std::sync::Arc;
use stowage::*;
use tokio::io::AsyncReadExt;

async fn read_all(obj: &Object, ctx: &Context) -> String {
    let mut out = String::new();
    obj.open(ctx).await.unwrap().read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_object_lifecycle() {
    let ctx = Context::background();
    let obj = Object::in_memory("path/to/file.txt");
    assert_eq!(obj.name(), "path/to/file.txt");
    assert!(obj.head(&ctx).await.unwrap_err().is_not_found());

    let mut writer = obj.create(&ctx, None).await.unwrap();
    writer.write_all(b"TESTDATA").await.unwrap();
    writer.commit().await.unwrap();

    let info = obj.head(&ctx).await.unwrap();
    assert_eq!(info.name(), "path/to/file.txt");
    assert_eq!(info.size(), 8);
    assert_eq!(read_all(&obj, &ctx).await, "TESTDATA");

    obj.remove(&ctx).await.unwrap();
    assert!(obj.open(&ctx).await.is_err());
    obj.remove(&ctx).await.unwrap();
    obj.close().await.unwrap();
}

#[tokio::test]
async fn test_blank_object_cycle() {
    let ctx = Context::background();
    let obj = Object::in_memory("blank.txt");

    let mut writer = obj.create(&ctx, None).await.unwrap();
    writer.commit().await.unwrap();
    assert_eq!(obj.head(&ctx).await.unwrap().size(), 0);
    assert!(writer.discard().await.is_err());

    obj.remove(&ctx).await.unwrap();
    assert!(obj.head(&ctx).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_objects_share_their_bucket() {
    let ctx = Context::background();
    let bucket: Arc<dyn Bucket> = Arc::new(InMemBucket::new());
    let a = Object::new(Arc::clone(&bucket), "a.txt");
    let b = Object::new(Arc::clone(a.bucket()), "b.txt");

    ops::write_object(&ctx, bucket.as_ref(), "a.txt", b"a", None).await.unwrap();
    ops::write_object(&ctx, bucket.as_ref(), "b.txt", b"bb", None).await.unwrap();

    assert_eq!(a.head(&ctx).await.unwrap().size(), 1);
    assert_eq!(b.head(&ctx).await.unwrap().size(), 2);
}

#[tokio::test]
#[serial]
async fn test_object_from_url() {
    let shared = InMemBucket::new();
    registry::register_bucket("obj-mem", Arc::new(shared.clone()));

    let ctx = Context::background();
    let obj = Object::from_url(&ctx, "obj-mem:///path/to/file.txt").await.unwrap();
    assert_eq!(obj.name(), "path/to/file.txt");

    let options = WriteOptions::new().with_content_type("text/plain");
    let mut writer = obj.create(&ctx, Some(&options)).await.unwrap();
    writer.write_all(b"TESTDATA").await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(read_all(&obj, &ctx).await, "TESTDATA");
    assert_eq!(obj.head(&ctx).await.unwrap().content_type(), "text/plain");
    assert_eq!(shared.object_sizes().get("path/to/file.txt"), Some(&8));

    let bare = Object::from_url(&ctx, "obj-mem://bucket").await.unwrap();
    assert_eq!(bare.name(), "bucket");
    assert!(Object::from_url(&ctx, "obj-mem:///").await.is_err());
    registry::unregister("obj-mem");
}
