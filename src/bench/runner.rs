//! Benchmark driver
//!
//! For every method and trial: sample every table with the method's plan,
//! materialize the samples into a fresh store, run every query, and hand
//! the per-group results to the aggregator. A trial's elapsed time for a
//! query covers sampling, loading and the query itself.
//!
//! With a ledger directory, per-table state survives between runs: the
//! metadata method's offset ledger, the stats method's column statistics
//! and, when resuming, the offset the next contiguous load starts from.

use super::aggregate::{BenchmarkAggregator, BenchmarkReport, FailureStage, TrialResult};
use super::{BenchConfig, Method};
use crate::error::{BenchError, Result};
use crate::materialize::Materializer;
use crate::sampling::{
    ColumnStats, OffsetLedger, RowFilter, Sample, SamplingPlan, StopCondition, Strategy,
};
use crate::source::{Offset, RecordSource};
use crate::store::{MemoryStore, TableStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A named aggregate query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchQuery {
    pub name: String,
    pub sql: String,
}

impl BenchQuery {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

struct BenchTable {
    source: Arc<dyn RecordSource>,
    ledger: Arc<OffsetLedger>,
    stats: Option<Arc<ColumnStats>>,
    /// Start offset of the next contiguous load
    contiguous_offset: AtomicUsize,
}

/// Runs every configured method over a set of tables and queries
pub struct BenchmarkRunner {
    config: BenchConfig,
    tables: Vec<BenchTable>,
    queries: Vec<BenchQuery>,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tables: Vec::new(),
            queries: Vec::new(),
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Register a table. Its offset ledger, and its resume offset when
    /// resuming, are read from the ledger directory when one is configured.
    pub fn add_table(&mut self, source: Arc<dyn RecordSource>) -> Result<()> {
        let name = source.schema().name.clone();
        let ledger = match self.table_path(ledger_file, &name) {
            Some(path) => OffsetLedger::load(path)?,
            None => OffsetLedger::new(),
        };
        let saved_offset = match self.table_path(resume_file, &name) {
            Some(path) if self.config.resume_contiguous => load_resume_offset(&path)?,
            _ => None,
        };
        let contiguous_offset = match saved_offset {
            Some(offset) if offset < source.len() => offset,
            Some(_) => 0,
            None => self.config.contiguous_offset,
        };
        self.tables.push(BenchTable {
            source,
            ledger: Arc::new(ledger),
            stats: None,
            contiguous_offset: AtomicUsize::new(contiguous_offset),
        });
        Ok(())
    }

    pub fn add_query(&mut self, query: BenchQuery) {
        self.queries.push(query);
    }

    /// Offset ledger of a registered table
    pub fn ledger(&self, table: &str) -> Option<&OffsetLedger> {
        self.tables
            .iter()
            .find(|t| t.source.schema().name.eq_ignore_ascii_case(table))
            .map(|t| t.ledger.as_ref())
    }

    /// Offset the next contiguous load of a registered table starts from
    pub fn contiguous_offset(&self, table: &str) -> Option<Offset> {
        self.tables
            .iter()
            .find(|t| t.source.schema().name.eq_ignore_ascii_case(table))
            .map(|t| t.contiguous_offset.load(Ordering::SeqCst))
    }

    fn table_path(&self, file: fn(&Path, &str) -> PathBuf, table: &str) -> Option<PathBuf> {
        self.config.ledger_dir.as_ref().map(|dir| file(dir, table))
    }

    /// Run every method and score the results
    pub fn run(&mut self) -> Result<BenchmarkReport> {
        if self.tables.is_empty() || self.queries.is_empty() {
            return Err(BenchError::InvalidArgument(
                "at least one table and one query are required".into(),
            ));
        }

        // Reporting order, reference first
        let mut methods = self.config.methods.clone();
        methods.sort();
        methods.dedup();

        // A failed statistics pass only takes the stats method down
        let mut stats_failure = None;
        if methods.contains(&Method::Stats) {
            match self.compute_column_stats() {
                Ok(()) => {}
                Err(e) if e.is_strategy_failure() => {
                    warn!("Column statistics unavailable, skipping stats method: {}", e);
                    stats_failure = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        let mut aggregator = BenchmarkAggregator::new();
        for &method in &methods {
            if let (Method::Stats, Some(message)) = (method, &stats_failure) {
                for query in &self.queries {
                    aggregator.record_failure(
                        method,
                        &query.name,
                        FailureStage::Sampling,
                        message.clone(),
                    );
                }
                continue;
            }
            let start = Instant::now();
            for trial in 0..self.config.trials {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(trial as u64));
                self.run_trial(method, trial, &mut rng, &mut aggregator)?;
            }
            info!(
                "Method {} finished {} trial(s) in {:?}",
                method,
                self.config.trials,
                start.elapsed()
            );
        }

        self.save_table_state()?;
        Ok(aggregator.finish())
    }

    /// Statistics for every table: read from its stats file when one
    /// exists, otherwise computed in a full pass and saved
    fn compute_column_stats(&mut self) -> Result<()> {
        for idx in 0..self.tables.len() {
            if self.tables[idx].stats.is_some() {
                continue;
            }
            let source = self.tables[idx].source.clone();
            let schema = source.schema();
            let path = self.table_path(stats_file, &schema.name);

            let start = Instant::now();
            let loaded = match &path {
                Some(path) => ColumnStats::load(path, schema)?,
                None => None,
            };
            let stats = match loaded {
                Some(stats) => {
                    debug!("Column statistics for {} read from file", schema.name);
                    stats
                }
                None => {
                    let stats = ColumnStats::from_source(source.as_ref(), self.config.scan_chunk_size)?;
                    if let Some(path) = &path {
                        create_parent(path)?;
                        stats.save(path, schema)?;
                    }
                    stats
                }
            };
            debug!(
                "Column statistics for {} ready in {:?}",
                schema.name,
                start.elapsed()
            );
            self.tables[idx].stats = Some(Arc::new(stats));
        }
        Ok(())
    }

    fn save_table_state(&self) -> Result<()> {
        for table in &self.tables {
            let name = &table.source.schema().name;
            if let Some(path) = self.table_path(ledger_file, name) {
                create_parent(&path)?;
                table.ledger.save(&path)?;
            }
            if self.config.resume_contiguous {
                if let Some(path) = self.table_path(resume_file, name) {
                    create_parent(&path)?;
                    let offset = table.contiguous_offset.load(Ordering::SeqCst);
                    fs::write(&path, offset.to_string())?;
                }
            }
        }
        Ok(())
    }

    /// Sampling plan of `method` for one table
    pub fn plan(&self, method: Method, source: &dyn RecordSource) -> Result<SamplingPlan> {
        let table = self
            .tables
            .iter()
            .find(|t| t.source.schema().name == source.schema().name);
        let budget = self.config.sample_rows(source.len());
        let per_direction = (budget / 2).max(1);

        let plan = match method {
            Method::Reference => SamplingPlan::full(),
            Method::Metadata => {
                let ledger = table
                    .map(|t| t.ledger.clone())
                    .unwrap_or_else(|| Arc::new(OffsetLedger::new()));
                SamplingPlan::new(Strategy::RandomSubset)
                    .with_stop(StopCondition::RowLimit(per_direction))
                    .with_filter(RowFilter::Unseen(ledger))
            }
            Method::Stats => {
                let stats = match table.and_then(|t| t.stats.clone()) {
                    Some(stats) => stats,
                    None => Arc::new(ColumnStats::from_source(source, self.config.scan_chunk_size)?),
                };
                SamplingPlan::new(Strategy::RandomSubset)
                    .with_stop(StopCondition::RowLimit(per_direction))
                    .with_filter(RowFilter::WithinStdDevs {
                        stats,
                        k: self.config.outlier_std_devs,
                    })
            }
            Method::Contiguous => SamplingPlan::new(Strategy::SequentialSubset {
                offset: table
                    .map(|t| t.contiguous_offset.load(Ordering::SeqCst))
                    .unwrap_or(self.config.contiguous_offset),
            })
            .with_stop(StopCondition::RowLimit(budget)),
            Method::Stratified => SamplingPlan::new(Strategy::ParallelSubsets {
                num_parallel: self.config.num_strata,
            })
            .with_stop(StopCondition::TotalRows(budget)),
        };

        Ok(plan
            .with_chunk_size(self.config.scan_chunk_size)
            .with_schedule(self.config.schedule.into())
            .with_min_sampling_rows(self.config.min_sampling_rows))
    }

    fn run_trial(
        &self,
        method: Method,
        trial: usize,
        rng: &mut StdRng,
        aggregator: &mut BenchmarkAggregator,
    ) -> Result<()> {
        let prepared = match self.prepare_store(method, rng) {
            Ok(prepared) => prepared,
            Err((stage, e)) if e.is_strategy_failure() => {
                for query in &self.queries {
                    aggregator.record_failure(method, &query.name, stage, e.to_string());
                }
                return Ok(());
            }
            Err((_, e)) => return Err(e),
        };
        let (store, samples, setup_elapsed) = prepared;

        for query in &self.queries {
            let start = Instant::now();
            let outcome = store
                .execute_query(&query.sql)
                .and_then(|rows| rows.aggregate_values());
            let query_elapsed = start.elapsed();
            match outcome {
                Ok(values) => {
                    debug!(
                        "{} trial {} {}: {} group(s) in {:?}",
                        method,
                        trial,
                        query.name,
                        values.len(),
                        query_elapsed
                    );
                    aggregator.record_trial(
                        method,
                        &query.name,
                        TrialResult::new(values, setup_elapsed + query_elapsed),
                    );
                }
                Err(e) => {
                    aggregator.record_failure(method, &query.name, FailureStage::Query, e.to_string())
                }
            }
        }

        // Loaded offsets count as seen only once their sample was materialized
        if method == Method::Metadata {
            for (table, sample) in self.tables.iter().zip(&samples) {
                table.ledger.record(sample.offsets());
            }
        }
        if method == Method::Contiguous && self.config.resume_contiguous {
            for (table, sample) in self.tables.iter().zip(&samples) {
                if let Some(last) = sample.rows.last() {
                    // Wrap to the start once the end of the table is reached
                    let next = last.offset + 1;
                    let next = if next < table.source.len() { next } else { 0 };
                    table.contiguous_offset.store(next, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    /// Sample and load every table into a fresh store
    fn prepare_store(
        &self,
        method: Method,
        rng: &mut StdRng,
    ) -> std::result::Result<(MemoryStore, Vec<Sample>, Duration), (FailureStage, BenchError)> {
        let start = Instant::now();
        let mut store = MemoryStore::new();
        let mut samples = Vec::with_capacity(self.tables.len());

        for table in &self.tables {
            let source = table.source.as_ref();
            let schema = source.schema();
            let sample = self
                .plan(method, source)
                .and_then(|plan| plan.run(source, rng))
                .map_err(|e| (FailureStage::Sampling, e))?;

            store
                .create_table(schema)
                .map_err(|e| (FailureStage::Load, e))?;
            Materializer::load(
                &mut store,
                schema,
                sample.records(),
                self.config.load_chunk_size,
            )
            .map_err(|e| (FailureStage::Load, e))?;
            samples.push(sample);
        }
        Ok((store, samples, start.elapsed()))
    }
}

/// Path of the default ledger file for `table` inside `dir`
pub fn ledger_file(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.offsets", table.to_lowercase()))
}

/// Path of the column statistics file for `table` inside `dir`
pub fn stats_file(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.stats", table.to_lowercase()))
}

/// Path of the contiguous resume offset file for `table` inside `dir`
pub fn resume_file(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.resume", table.to_lowercase()))
}

fn load_resume_offset(path: &Path) -> Result<Option<Offset>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let offset = text.trim().parse::<Offset>().map_err(|_| {
        BenchError::Parse(format!(
            "invalid resume offset '{}' in {}",
            text.trim(),
            path.display()
        ))
    })?;
    Ok(Some(offset))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnKind, Record, TableSchema, Value};
    use crate::source::MemorySource;

    fn lineitem(n: usize) -> Arc<dyn RecordSource> {
        let schema = TableSchema::new(
            "lineitem",
            vec![
                ColumnDef::new("l_quantity", ColumnKind::Float),
                ColumnDef::new("l_returnflag", ColumnKind::Text),
            ],
        );
        let flags = ["A", "N", "R"];
        let records = (0..n)
            .map(|i| {
                Record::new(vec![
                    Value::Float((i % 50 + 1) as f64),
                    Value::Text(flags[i % 3].into()),
                ])
            })
            .collect();
        Arc::new(MemorySource::new(schema, records))
    }

    fn avg_query() -> BenchQuery {
        BenchQuery::new(
            "avg",
            "SELECT l_returnflag, AVG(l_quantity) FROM lineitem GROUP BY l_returnflag",
        )
    }

    fn runner(config: BenchConfig, n: usize) -> BenchmarkRunner {
        let mut runner = BenchmarkRunner::new(config).unwrap();
        runner.add_table(lineitem(n)).unwrap();
        runner.add_query(avg_query());
        runner
    }

    #[test]
    fn test_every_method_scored() {
        let config = BenchConfig::default().with_sample_fraction(0.05).with_trials(2);
        let report = runner(config, 6_000).run().unwrap();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.datapoints.len(), 5);
        let reference = report.datapoint(Method::Reference, "avg").unwrap();
        assert_eq!(reference.mean_absolute_percent_error, 0.0);
        for dp in &report.datapoints {
            assert!(dp.mean_absolute_percent_error.is_finite());
            assert_eq!(dp.trials, 2);
        }
    }

    #[test]
    fn test_small_table_loaded_in_full_by_every_method() {
        let report = runner(BenchConfig::default(), 600).run().unwrap();
        for dp in &report.datapoints {
            assert_eq!(dp.mean_absolute_percent_error, 0.0, "{}", dp.method);
        }
    }

    #[test]
    fn test_bad_contiguous_offset_fails_only_that_method() {
        let mut config = BenchConfig::default().with_trials(1);
        config.contiguous_offset = 10_000;
        let report = runner(config, 5_000).run().unwrap();
        let failure = report.failure(Method::Contiguous, "avg").unwrap();
        assert_eq!(failure.stage, FailureStage::Sampling);
        assert_eq!(report.datapoints.len(), 4);
    }

    #[test]
    fn test_unsupported_query_recorded() {
        let mut runner = runner(BenchConfig::default().with_trials(1), 2_000);
        runner.add_query(BenchQuery::new("bad", "SELECT MEDIAN(l_quantity) FROM lineitem"));
        let report = runner.run().unwrap();
        assert_eq!(report.failures.len(), 5);
        assert!(report
            .failures
            .iter()
            .all(|f| f.query == "bad" && f.stage == FailureStage::Query));
    }

    #[test]
    fn test_metadata_ledger_grows_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::default()
            .with_methods(vec![Method::Reference, Method::Metadata])
            .with_sample_fraction(0.02)
            .with_ledger_dir(dir.path());
        let mut runner = runner(config, 10_000);
        runner.run().unwrap();

        let loaded = runner.ledger("lineitem").unwrap().len();
        assert!(loaded > 0);
        let saved = OffsetLedger::load(ledger_file(dir.path(), "lineitem")).unwrap();
        assert_eq!(saved.len(), loaded);
    }

    #[test]
    fn test_stratified_draws_from_every_stratum() {
        let source = lineitem(60_000);
        let mut runner = BenchmarkRunner::new(BenchConfig::default()).unwrap();
        runner.add_table(source.clone()).unwrap();
        let plan = runner.plan(Method::Stratified, source.as_ref()).unwrap();
        let sample = plan
            .run(source.as_ref(), &mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(sample.len(), 600);
        assert_eq!(sample.windows.len(), 10);
        for w in &sample.windows {
            let in_stratum = sample
                .rows
                .iter()
                .filter(|r| r.offset >= w.lo && r.offset < w.hi)
                .count();
            assert!(in_stratum > 0, "no rows from stratum {:?}", w);
        }
    }

    #[test]
    fn test_column_stats_saved_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::default()
            .with_methods(vec![Method::Reference, Method::Stats])
            .with_trials(1)
            .with_ledger_dir(dir.path());
        runner(config.clone(), 5_000).run().unwrap();

        let path = stats_file(dir.path(), "lineitem");
        let schema = lineitem(1).schema().clone();
        let saved = ColumnStats::load(&path, &schema).unwrap().unwrap();
        assert_eq!(saved.column(0).unwrap().count(), 5_000);
        assert!(saved.column(1).is_none());

        // A later run reads the file instead of scanning the table
        std::fs::write(&path, "FieldName,mean,stddev,count\nl_quantity,bad,1,1\n").unwrap();
        let report = runner(config, 5_000).run().unwrap();
        let failure = report.failure(Method::Stats, "avg").unwrap();
        assert_eq!(failure.stage, FailureStage::Sampling);
        assert!(report.datapoint(Method::Reference, "avg").is_some());
    }

    #[test]
    fn test_contiguous_resumes_where_last_load_ended() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::default()
            .with_methods(vec![Method::Reference, Method::Contiguous])
            .with_sample_fraction(0.02)
            .with_resume_contiguous(true)
            .with_ledger_dir(dir.path());
        let mut first = runner(config.clone(), 10_000);
        assert_eq!(first.contiguous_offset("lineitem"), Some(0));
        first.run().unwrap();

        // Three trials of 200 rows each
        assert_eq!(first.contiguous_offset("lineitem"), Some(600));
        let saved = std::fs::read_to_string(resume_file(dir.path(), "lineitem")).unwrap();
        assert_eq!(saved, "600");

        let second = runner(config, 10_000);
        assert_eq!(second.contiguous_offset("lineitem"), Some(600));
    }

    #[test]
    fn test_contiguous_offset_fixed_without_resume() {
        let mut runner = runner(BenchConfig::default().with_trials(2), 10_000);
        runner.run().unwrap();
        assert_eq!(runner.contiguous_offset("lineitem"), Some(0));
    }

    #[test]
    fn test_metadata_plan_skips_saved_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let seen = OffsetLedger::new();
        seen.record(0..5_000);
        seen.save(ledger_file(dir.path(), "lineitem")).unwrap();

        let source = lineitem(10_000);
        let mut runner =
            BenchmarkRunner::new(BenchConfig::default().with_ledger_dir(dir.path())).unwrap();
        runner.add_table(source.clone()).unwrap();
        let plan = runner.plan(Method::Metadata, source.as_ref()).unwrap();
        let sample = plan
            .run(source.as_ref(), &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert!(!sample.is_empty());
        assert!(sample.offsets().iter().all(|&o| o >= 5_000));
    }

    #[test]
    fn test_trials_are_reproducible() {
        let config = BenchConfig::default()
            .with_methods(vec![Method::Reference, Method::Stratified, Method::Stats])
            .with_seed(7);
        let a = runner(config.clone(), 8_000).run().unwrap();
        let b = runner(config, 8_000).run().unwrap();
        for method in [Method::Stratified, Method::Stats] {
            assert_eq!(
                a.datapoint(method, "avg").unwrap().mean_absolute_percent_error,
                b.datapoint(method, "avg").unwrap().mean_absolute_percent_error
            );
        }
    }

    #[test]
    fn test_requires_tables_and_queries() {
        let mut runner = BenchmarkRunner::new(BenchConfig::default()).unwrap();
        assert!(runner.run().is_err());
    }
}
