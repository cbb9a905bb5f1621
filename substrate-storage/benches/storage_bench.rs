use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use substrate_core::memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance};
use substrate_storage::{ListFilter, StorageEngine};
use uuid::Uuid;

fn sample_memory(content: &str) -> MemoryRecord {
    let now = Utc::now();
    MemoryRecord {
        id: Uuid::new_v4(),
        content: content.to_string(),
        memory_type: MemoryType::Fact,
        layer: Layer::Stm,
        importance: Importance::new(0.5),
        confidence: Confidence::new(0.5),
        tags: Default::default(),
        entities: Default::default(),
        provenance: Provenance::explicit("bench"),
        supersedes: None,
        superseded_by: None,
        created_at: now,
        updated_at: now,
        accessed_at: now,
        access_count: 0,
        checksum: "bench".to_string(),
    }
}

fn bench_insert_memory(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    c.bench_function("insert_memory", |b| {
        b.iter(|| {
            let memory = sample_memory("the user prefers dark mode in all editors");
            engine.insert_memory(&memory).unwrap();
        })
    });
}

fn bench_get_memory(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    let memory = sample_memory("the user's timezone is set to UTC");
    engine.insert_memory(&memory).unwrap();
    let id = memory.id.to_string();

    c.bench_function("get_memory", |b| {
        b.iter(|| engine.get_memory(&id).unwrap())
    });
}

fn bench_fts5_search(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..200 {
        let memory = sample_memory(&format!("memory number {i} about rust systems programming patterns"));
        engine.insert_memory(&memory).unwrap();
    }

    c.bench_function("fts5_search_200_rows", |b| {
        b.iter(|| engine.search_fts5("rust systems", &ListFilter::default(), 10).unwrap())
    });
}

fn bench_vector_search(c: &mut Criterion) {
    let engine = StorageEngine::open_in_memory().unwrap();
    for i in 0..200 {
        let memory = sample_memory(&format!("vector bench memory {i}"));
        engine.insert_memory(&memory).unwrap();
        let vector: Vec<f32> = (0..32).map(|d| ((i + d) as f32).sin()).collect();
        engine
            .store_embedding(&memory.id.to_string(), "tfidf", "v1", 1, &vector)
            .unwrap();
    }
    let query: Vec<f32> = (0..32).map(|d| (d as f32).sin()).collect();

    c.bench_function("vector_search_200_rows", |b| {
        b.iter(|| engine.search_vector("tfidf", "v1", &query, 10).unwrap())
    });
}

criterion_group!(
    benches,
    bench_insert_memory,
    bench_get_memory,
    bench_fts5_search,
    bench_vector_search
);
criterion_main!(benches);
