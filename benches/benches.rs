use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tiercache::memory::MemoryCache;
use tiercache::persistent::{FileCache, MemoryFileSystem};

fn string_cache(max_size: usize) -> MemoryCache<String> {
    MemoryCache::new(max_size, Duration::from_secs(60 * 60), |value: &String| {
        value.clone()
    })
}

fn memory_benchmarks(c: &mut Criterion) {
    c.bench_function("memory: set", |b| {
        let mut cache = string_cache(16 * 1024 * 1024);
        let mut counter = 0;
        b.iter(|| {
            counter += 1;
            cache.set(
                black_box(&format!("key-{}", counter % 1000)),
                "Lorem ipsum dolor sit amet".to_owned(),
                &["a", "b"],
            );
        })
    });

    c.bench_function("memory: get", |b| {
        let mut cache = string_cache(16 * 1024 * 1024);
        for index in 0..1000 {
            cache.set(&format!("key-{}", index), "Lorem".to_owned(), &["a"]);
        }

        let mut counter = 0;
        b.iter(|| {
            counter += 1;
            let _ = black_box(cache.get(&format!("key-{}", counter % 1000)));
        })
    });

    c.bench_function("memory: set with eviction", |b| {
        let mut cache = string_cache(16 * 1024);
        let mut counter = 0;
        b.iter(|| {
            counter += 1;
            cache.set(
                black_box(&format!("key-{}", counter)),
                "Lorem ipsum dolor sit amet".to_owned(),
                &["a"],
            );
        })
    });

    c.bench_function("memory: revalidate tags", |b| {
        let mut cache = string_cache(16 * 1024 * 1024);
        b.iter(|| {
            for index in 0..100 {
                let tag = if index % 2 == 0 { "even" } else { "odd" };
                cache.set(&format!("key-{}", index), "Lorem".to_owned(), &[tag]);
            }
            cache.revalidate_tags(black_box(&["even"]));
        })
    });
}

fn persistent_benchmarks(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("persistent: get", |b| {
        let cache = FileCache::new(Arc::new(MemoryFileSystem::new()), "cache");
        rt.block_on(cache.set("pages/home", b"<html></html>", &["pages"]))
            .unwrap();

        b.iter(|| {
            let _ = black_box(rt.block_on(cache.get("pages/home")));
        })
    });
}

criterion_group!(benches, memory_benchmarks, persistent_benchmarks);
criterion_main!(benches);
