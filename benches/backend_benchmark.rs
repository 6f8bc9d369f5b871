//! Criterion comparison of object lookups through the pooled backend against
//! a raw `rusqlite` query over the same file, plus contended inserts at a few
//! pool sizes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use prov_cpl::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;
use std::sync::{Arc, LazyLock};
use std::thread;
use tempfile::TempDir;

/// A seeded store shared by every lookup benchmark.
struct Dataset {
    _dir: TempDir,
    connection_string: String,
    path: String,
    names: Vec<String>,
}

static DATASET: LazyLock<Dataset> = LazyLock::new(|| {
    let count = object_count();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bench.db").to_string_lossy().into_owned();
    let connection_string = format!("Database={path};");
    let backend = connect(&connection_string, 1);
    let session = backend
        .create_session(&SessionDescriptor::new("bench", 1, "backend_benchmark"))
        .expect("session");

    let mut names: Vec<String> = (0..count).map(|i| format!("object-{i}")).collect();
    for name in &names {
        backend
            .create_object("bench", name, ObjectType::Entity, session)
            .expect("create object");
    }
    names.shuffle(&mut ChaCha8Rng::seed_from_u64(1_234_567_890));

    Dataset {
        _dir: dir,
        connection_string,
        path,
        names,
    }
});

/// Objects in the lookup dataset, from `BENCH_OBJECTS`.
fn object_count() -> usize {
    std::env::var("BENCH_OBJECTS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(1000)
}

fn connect(connection_string: &str, pool_size: usize) -> RelationalBackend {
    let options = BackendOptions::builder()
        .pool_size(pool_size)
        .db_type(DbType::Sqlite)
        .finish();
    RelationalBackend::connect(
        Arc::new(SqliteDriver::new_default().with_schema()),
        connection_string,
        options,
    )
    .expect("connect backend")
}

fn bench_lookup(c: &mut Criterion) {
    let dataset = &*DATASET;
    let mut group = c.benchmark_group("lookup_object");
    group.throughput(Throughput::Elements(dataset.names.len() as u64));

    let backend = connect(&dataset.connection_string, 1);
    group.bench_function("backend", |b| {
        b.iter(|| {
            for name in &dataset.names {
                black_box(backend.lookup_object("bench", name, None).expect("lookup"));
            }
        });
    });

    let raw = rusqlite::Connection::open(&dataset.path).expect("open raw");
    group.bench_function("rusqlite", |b| {
        b.iter(|| {
            let mut stmt = raw
                .prepare_cached(
                    "SELECT id FROM cpl_objects WHERE prefix = ?1 AND name = ?2 AND type <> 4 \
                     ORDER BY id DESC LIMIT 1",
                )
                .expect("prepare");
            for name in &dataset.names {
                let id: i64 = stmt
                    .query_row(("bench", name.as_str()), |row| row.get(0))
                    .expect("query");
                black_box(id);
            }
        });
    });
    group.finish();
}

fn bench_contended_inserts(c: &mut Criterion) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let mut group = c.benchmark_group("create_object_contended");
    group.throughput(Throughput::Elements((THREADS * PER_THREAD) as u64));
    group.sample_size(10);

    for pool_size in [1, 4] {
        let dir = tempfile::tempdir().expect("temp dir");
        let connection_string = format!("Database={};", dir.path().join("insert.db").display());
        let backend = connect(&connection_string, pool_size);
        let session = backend
            .create_session(&SessionDescriptor::new("bench", 1, "backend_benchmark"))
            .expect("session");

        group.bench_with_input(BenchmarkId::from_parameter(pool_size), &pool_size, |b, _| {
            b.iter(|| {
                thread::scope(|scope| {
                    for worker in 0..THREADS {
                        let backend = &backend;
                        scope.spawn(move || {
                            for i in 0..PER_THREAD {
                                let name = format!("{worker}-{i}");
                                black_box(
                                    backend
                                        .create_object("bench", &name, ObjectType::Entity, session)
                                        .expect("create"),
                                );
                            }
                        });
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup, bench_contended_inserts);
criterion_main!(benches);
