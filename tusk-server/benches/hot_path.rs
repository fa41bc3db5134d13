//! Benchmarks for the request hot paths: PATCH append and HEAD status

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tusk_core::test_utils::{patch_headers, patterned_bytes, tus_headers};
use tusk_core::*;
use tusk_engine::{FileStore, MemoryStore, StorageEngine, UploadStore};
use tusk_server::{ServerConfig, TusServer};

const CHUNK_SIZES: &[usize] = &[4 * 1024, 64 * 1024, 1024 * 1024];

fn create(server: &TusServer, length: usize) -> String {
    let response = server.handle_request(
        "POST",
        "/files",
        &tus_headers(&[(header::UPLOAD_LENGTH, &length.to_string())]),
        b"",
    );
    response.headers.get(header::LOCATION).unwrap().to_string()
}

fn bench_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch");

    let (engine, _temp) = StorageEngine::temp().unwrap();
    let backends: Vec<(&str, Arc<dyn UploadStore>)> = vec![
        ("memory", Arc::new(MemoryStore::new())),
        ("file", Arc::new(FileStore::new(engine).unwrap())),
    ];

    for (name, store) in backends {
        let server = TusServer::new(store, ServerConfig::default());

        for &size in CHUNK_SIZES {
            let data = patterned_bytes(size);
            let checksum = ChecksumRegistry::default().header_value("sha1", &data).unwrap();
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter_batched(
                    || create(&server, size),
                    |location| {
                        let mut headers = patch_headers(0);
                        headers.insert(header::UPLOAD_CHECKSUM, checksum.as_str());
                        let response = server.handle_request("PATCH", &location, &headers, &data);
                        assert_eq!(response.status, 200);
                        black_box(response);
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

fn bench_head(c: &mut Criterion) {
    let server = TusServer::new(Arc::new(MemoryStore::new()), ServerConfig::default());
    let location = create(&server, 1024);
    let headers = tus_headers(&[]);

    c.bench_function("head", |b| {
        b.iter(|| black_box(server.handle_request("HEAD", &location, &headers, b"")));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = bench_patch, bench_head
}
criterion_main!(benches);
