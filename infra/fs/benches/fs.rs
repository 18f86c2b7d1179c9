use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use stowage::{Bucket, Context, collect_names, ops};
use stowage_fs::FsBucket;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Path Resolution & Security Validation
// ============================================================================

fn bench_path_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_resolution");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bucket =
        rt.block_on(async { FsBucket::builder().root(temp.path()).connect().await.unwrap() });

    group.bench_function("simple_name", |b| {
        b.iter(|| black_box(bucket.resolve("test.dat").unwrap()));
    });

    group.bench_function("nested_name", |b| {
        b.iter(|| black_box(bucket.resolve("foo/bar/baz/test.dat").unwrap()));
    });

    group.bench_function("traversal_name", |b| {
        b.iter(|| black_box(bucket.resolve("foo/../../bar/./test.dat").unwrap()));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Atomic Writes & Reads
// ============================================================================

fn bench_file_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_operations");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::background();
    let bucket =
        rt.block_on(async { FsBucket::builder().root(temp.path()).connect().await.unwrap() });

    let sizes = [("1KB", 1024), ("10KB", 10 * 1024), ("100KB", 100 * 1024)];

    for (name, size) in sizes {
        let data: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        let object = format!("bench_{name}.dat");

        group.bench_with_input(BenchmarkId::new("write", name), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                ops::write_object(&ctx, &bucket, &object, data, None).await.unwrap();
            });
        });

        group.bench_function(BenchmarkId::new("read", name), |b| {
            b.to_async(&rt).iter(|| async {
                black_box(ops::read_object(&ctx, &bucket, &object).await.unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Directory Globbing
// ============================================================================

fn bench_glob(c: &mut Criterion) {
    let mut group = c.benchmark_group("glob");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::background();
    let bucket = rt.block_on(async {
        let bucket = FsBucket::builder().root(temp.path()).connect().await.unwrap();
        for i in 0..500 {
            let name = format!("dir{}/file{i:04}.txt", i % 10);
            ops::write_object(&ctx, &bucket, &name, b"x", None).await.unwrap();
        }
        bucket
    });

    for pattern in ["dir3/*.txt", "*/*.txt", "**/file00*"] {
        group.bench_with_input(BenchmarkId::from_parameter(pattern), pattern, |b, pattern| {
            b.to_async(&rt).iter(|| async {
                let mut iter = bucket.glob(&ctx, pattern).await.unwrap();
                black_box(collect_names(iter.as_mut()).await.unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_path_resolution, bench_file_operations, bench_glob);
criterion_main!(benches);
