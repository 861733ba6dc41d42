//! Sampling and load benchmarks

use aqp_bench::bench::Method;
use aqp_bench::sampling::{SamplingPlan, Schedule, StopCondition, Strategy};
use aqp_bench::source::MemorySource;
use aqp_bench::store::{MemoryStore, TableStore};
use aqp_bench::tpch::{self, LineitemGenerator};
use aqp_bench::{BenchConfig, BenchmarkRunner, Materializer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

const ROWS: usize = 60_000;

fn lineitem() -> MemorySource {
    LineitemGenerator::new().generate_source(ROWS)
}

fn benchmark_methods(c: &mut Criterion) {
    let source = lineitem();
    let runner = BenchmarkRunner::new(BenchConfig::default()).unwrap();

    let mut group = c.benchmark_group("sample");
    group.sample_size(10);

    for method in Method::ALL {
        let plan = runner.plan(method, &source).unwrap();
        group.bench_with_input(BenchmarkId::new("method", method), &plan, |b, plan| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| black_box(plan.run(&source, &mut rng).unwrap().len()));
        });
    }

    group.finish();
}

fn benchmark_schedules(c: &mut Criterion) {
    let source = lineitem();
    let mut group = c.benchmark_group("stratified_schedule");
    group.sample_size(10);

    for (name, schedule) in [("round_robin", Schedule::RoundRobin), ("threads", Schedule::Threads)] {
        let plan = SamplingPlan::new(Strategy::ParallelSubsets { num_parallel: 16 })
            .with_stop(StopCondition::TotalRows(ROWS / 10))
            .with_schedule(schedule);
        group.bench_function(name, |b| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| black_box(plan.run(&source, &mut rng).unwrap().len()));
        });
    }

    group.finish();
}

fn benchmark_load_and_query(c: &mut Criterion) {
    let source = lineitem();
    let schema = tpch::lineitem_schema();

    c.bench_function("load_and_avg", |b| {
        b.iter(|| {
            let mut store = MemoryStore::new();
            store.create_table(&schema).unwrap();
            Materializer::load(&mut store, &schema, source.records(), 10_000).unwrap();
            let rows = store.execute_query(tpch::AVG).unwrap();
            black_box(rows.num_rows())
        })
    });
}

criterion_group!(
    benches,
    benchmark_methods,
    benchmark_schedules,
    benchmark_load_and_query
);
criterion_main!(benches);
