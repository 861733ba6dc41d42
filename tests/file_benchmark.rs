//! End-to-end benchmark over a generated lineitem file

use aqp_bench::bench::{BenchConfig, BenchmarkRunner, FailureStage, Method, ScheduleKind};
use aqp_bench::sampling::{SamplingPlan, StopCondition, Strategy};
use aqp_bench::source::{FileSource, MemorySource, RecordSource};
use aqp_bench::store::{MemoryStore, TableStore};
use aqp_bench::tpch::{self, LineitemGenerator};
use aqp_bench::Materializer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;

fn write_lineitem(dir: &Path, rows: usize) -> std::path::PathBuf {
    let path = dir.join("lineitem.tbl");
    LineitemGenerator::with_seed(1).write_tbl(&path, rows).unwrap();
    path
}

#[test]
fn test_benchmark_over_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_lineitem(dir.path(), 5_000);
    let source = FileSource::open(&path, tpch::lineitem_schema()).unwrap();
    assert_eq!(source.len(), 5_000);

    let config = BenchConfig::default()
        .with_trials(2)
        .with_sample_fraction(0.1);
    let mut runner = BenchmarkRunner::new(config).unwrap();
    runner.add_table(Arc::new(source)).unwrap();
    for query in tpch::bench_queries(&tpch::ALL_QUERIES).unwrap() {
        runner.add_query(query);
    }
    let report = runner.run().unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.datapoints.len(), 5 * 5);
    for query in tpch::ALL_QUERIES {
        let reference = report.datapoint(Method::Reference, query).unwrap();
        assert_eq!(reference.mean_absolute_percent_error, 0.0);
    }

    let series = report.series();
    assert_eq!(series.len(), 5);
    assert!(series.values().all(|(times, errors)| times.len() == 5 && errors.len() == 5));

    let json = serde_json::to_string(&series).unwrap();
    assert!(json.contains("\"stratified\""));
}

#[test]
fn test_preloaded_file_matches_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_lineitem(dir.path(), 300);
    let file = FileSource::open(&path, tpch::lineitem_schema()).unwrap();
    assert_eq!(file.path(), path.as_path());

    let memory = MemorySource::try_from_source(&file).unwrap();
    assert_eq!(memory.len(), 300);
    assert_eq!(memory.schema(), file.schema());
    let expected = LineitemGenerator::with_seed(1).generate(300);
    assert_eq!(memory.records(), expected.as_slice());
}

#[test]
fn test_threaded_schedule_matches_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_lineitem(dir.path(), 4_000);
    let source = FileSource::open(&path, tpch::lineitem_schema()).unwrap();

    let plan = SamplingPlan::new(Strategy::ParallelSubsets { num_parallel: 4 })
        .with_stop(StopCondition::TotalRows(400))
        .with_chunk_size(25)
        .with_schedule(ScheduleKind::Threads.into());
    let sample = plan.run(&source, &mut StdRng::seed_from_u64(42)).unwrap();
    assert!(sample.len() >= 400 && sample.len() <= 408);

    let mut store = MemoryStore::new();
    store.create_table(source.schema()).unwrap();
    let report = Materializer::load(&mut store, source.schema(), sample.records(), 100).unwrap();
    assert_eq!(report.rows, sample.len());
    let rows = store.execute_query(tpch::COUNT).unwrap();
    let total: f64 = rows.aggregate_values().unwrap().iter().sum();
    assert_eq!(total as usize, sample.len());
}

#[test]
fn test_truncated_file_fails_reference_but_not_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_lineitem(dir.path(), 3_000);
    let source = FileSource::open(&path, tpch::lineitem_schema()).unwrap();

    // Damage the file after indexing: reads past the cut now fail
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, &text[..text.len() / 2]).unwrap();

    let config = BenchConfig::default()
        .with_trials(1)
        .with_methods(vec![Method::Reference, Method::Contiguous, Method::Stats]);
    let mut runner = BenchmarkRunner::new(config).unwrap();
    runner.add_table(Arc::new(source)).unwrap();
    runner.add_query(tpch::bench_queries(&["avg"]).unwrap().remove(0));
    let report = runner.run().unwrap();

    // Reference reads past the cut; contiguous only reads the intact head
    // but has nothing to be scored against.
    let failure = report.failure(Method::Reference, "avg").unwrap();
    assert_eq!(failure.stage, FailureStage::Sampling);
    let contiguous = report.failure(Method::Contiguous, "avg").unwrap();
    assert_eq!(contiguous.stage, FailureStage::Statistics);
    assert!(report.datapoint(Method::Contiguous, "avg").is_none());

    // The stats pass reads the whole file, so only that method fails early
    let stats = report.failure(Method::Stats, "avg").unwrap();
    assert_eq!(stats.stage, FailureStage::Sampling);
    assert_eq!(report.failures.len(), 3);
}
