//! Benchmarks for task selection and dependency ordering.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use deployflow::registry::{Task, TaskRegistry, TaskRegistryBuilder};
use deployflow::resolver::NetworkTable;

/// A layered registry: each task depends on up to three tasks of the
/// previous layer, registered in reverse so ordering has work to do.
fn layered_registry(layers: usize, width: usize) -> TaskRegistry {
    let mut tasks = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for i in 0..width {
            let table = NetworkTable::new().with_network("localhost", ["${deployer}"]);
            let mut task = Task::new(format!("T{layer}_{i}"), table).with_tag(format!("layer{layer}"));
            if layer > 0 {
                for d in 0..3.min(width) {
                    task = task.with_dependency(format!("T{}_{}", layer - 1, (i + d) % width));
                }
            }
            tasks.push(task);
        }
    }

    let mut builder = TaskRegistryBuilder::new();
    for task in tasks.into_iter().rev() {
        builder.register(task).expect("unique names");
    }
    builder.build().expect("acyclic")
}

fn ordering_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_dependency_order");
    for size in [10_usize, 50, 100] {
        let registry = layered_registry(size, 10);
        let all: Vec<&Task> = registry.iter().collect();
        group.bench_with_input(BenchmarkId::from_parameter(size * 10), &all, |b, all| {
            b.iter(|| registry.resolve_dependency_order(black_box(all)).expect("acyclic"));
        });
    }
    group.finish();
}

fn selection_benchmark(c: &mut Criterion) {
    let registry = layered_registry(100, 10);
    let tags: BTreeSet<String> = ["layer99".to_string()].into_iter().collect();

    c.bench_function("select_with_dependencies", |b| {
        b.iter(|| {
            let selected = registry.select_by_tags(black_box(&tags));
            registry.with_dependencies(&selected).len()
        });
    });
}

criterion_group!(benches, ordering_benchmark, selection_benchmark);
criterion_main!(benches);
