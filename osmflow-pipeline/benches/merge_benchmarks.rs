//! Criterion benchmarks for merge-join throughput.
//!
//! Measures end-to-end change application (two source threads, one merge
//! thread, bounded queues) across stream sizes and queue capacities, to track
//! the cost of the handoff and detect regressions.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench --package osmflow-pipeline
//! ```

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use osmflow_core::test_support::{change, node};
use osmflow_core::{ChangeAction, ChangeContainer, EntityContainer, OrderingRegistry};
use osmflow_pipeline::{ChangeApplier, CollectSink, GraphBuilder, PipeRef, PipelineConfig};

/// Base snapshot sizes to benchmark.
const STREAM_SIZES: &[usize] = &[1_000, 10_000, 100_000];

/// Queue capacities to compare at the largest size.
const CAPACITIES: &[usize] = &[1, 10, 1_000];

/// A base of `size` nodes and a change stream touching every third one.
fn build_streams(size: usize) -> (Vec<EntityContainer>, Vec<ChangeContainer>) {
    let ids = 0..i64::try_from(size).unwrap_or(i64::MAX);
    let base = ids.clone().map(|id| node(id, 1)).collect();
    let changes = ids
        .step_by(3)
        .map(|id| {
            let action = match id % 2 {
                0 => ChangeAction::Modify,
                _ => ChangeAction::Delete,
            };
            change(action, node(id, 2))
        })
        .collect();
    (base, changes)
}

fn apply_once(
    base: Vec<EntityContainer>,
    changes: Vec<ChangeContainer>,
    capacity: usize,
) -> usize {
    let config = PipelineConfig::default()
        .with_queue_capacity(capacity)
        .expect("benchmark capacities are positive");
    let (sink, applied) = CollectSink::<EntityContainer>::new();
    let mut graph = GraphBuilder::new(OrderingRegistry::standard(), config);
    graph
        .source("base", "base", base)
        .and_then(|g| g.source("changes", "changes", changes))
        .and_then(|g| {
            g.merge(
                "apply",
                ChangeApplier,
                ["base".into(), "changes".into()],
                PipeRef::Default,
            )
        })
        .and_then(|g| g.sink("collect", PipeRef::Default, sink))
        .expect("benchmark graph wires");
    graph
        .build()
        .expect("benchmark graph builds")
        .run()
        .expect("benchmark pipeline runs");
    applied.take_items().len()
}

/// Benchmark change application across stream sizes at the default capacity.
fn bench_apply_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_change");
    group.measurement_time(Duration::from_secs(10));

    for &size in STREAM_SIZES {
        let (base, changes) = build_streams(size);
        group.throughput(Throughput::Elements(u64::try_from(size).unwrap_or(u64::MAX)));
        group.bench_with_input(BenchmarkId::new("elements", size), &size, |b, _| {
            b.iter(|| apply_once(base.clone(), changes.clone(), 10));
        });
    }

    group.finish();
}

/// Benchmark the effect of queue capacity on handoff overhead.
fn bench_queue_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_capacity");
    group.sample_size(20);
    let size = STREAM_SIZES.last().copied().unwrap_or(10_000);
    let (base, changes) = build_streams(size);

    for &capacity in CAPACITIES {
        group.throughput(Throughput::Elements(u64::try_from(size).unwrap_or(u64::MAX)));
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| apply_once(base.clone(), changes.clone(), capacity));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_apply_sizes, bench_queue_capacity);
criterion_main!(benches);
