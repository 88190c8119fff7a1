use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use cuehistory::{EventHistory, LogicalTime, Metadata, Value};

const PATHS: [&str; 8] = [
    "/drums/kick",
    "/drums/snare",
    "/drums/hat/open",
    "/drums/hat/closed",
    "/bass/note",
    "/lead/note",
    "/osc/in/fader/1",
    "/osc/in/fader/2",
];

fn seeded_history(events: usize) -> EventHistory {
    let history = EventHistory::new();
    for i in 0..events {
        let path = PATHS[i % PATHS.len()];
        history
            .publish(LogicalTime::at(i as f64), path, Value::Int(i as i64), Metadata::new())
            .unwrap();
    }
    // Force the initial drain so queries measure traversal only.
    history.query_next(LogicalTime::at(0.0), "/", None).unwrap();
    history
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("history/publish");
    group.throughput(Throughput::Elements(1));
    group.bench_function("in_order", |b| {
        let history = EventHistory::new();
        let mut t = 0.0;
        b.iter(|| {
            t += 1.0;
            history
                .publish(LogicalTime::at(t), "/drums/kick", Value::Int(1), Metadata::new())
                .unwrap();
        });
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let history = seeded_history(8192);
    let mut group = c.benchmark_group("history/query");

    group.bench_function("exact_most_recent", |b| {
        b.iter(|| {
            history
                .query_most_recent(black_box(LogicalTime::at(4000.5)), "/drums/kick", None)
                .unwrap()
        });
    });

    group.bench_function("wildcard_next", |b| {
        b.iter(|| {
            history
                .query_next(black_box(LogicalTime::at(4000.5)), "/drums/*", None)
                .unwrap()
        });
    });

    group.bench_function("recursive_most_recent", |b| {
        b.iter(|| {
            history
                .query_most_recent(black_box(LogicalTime::at(4000.5)), "/**/note", None)
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_publish, bench_query);
criterion_main!(benches);
