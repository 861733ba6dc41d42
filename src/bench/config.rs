//! Benchmark configuration

use super::Method;
use crate::error::{BenchError, Result};
use crate::materialize::DEFAULT_LOAD_CHUNK_SIZE;
use crate::sampling::{Schedule, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_SAMPLING_ROWS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How parallel scans are interleaved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    #[default]
    RoundRobin,
    Threads,
}

impl From<ScheduleKind> for Schedule {
    fn from(kind: ScheduleKind) -> Self {
        match kind {
            ScheduleKind::RoundRobin => Schedule::RoundRobin,
            ScheduleKind::Threads => Schedule::Threads,
        }
    }
}

/// Settings for one benchmark run. Every field has a default, so a JSON
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Methods to run, in any order
    pub methods: Vec<Method>,
    pub trials: usize,
    /// Trial `t` is seeded with `seed + t`
    pub seed: u64,
    /// Share of each table a sampling method loads
    pub sample_fraction: f64,
    /// Number of strata for the stratified method
    pub num_strata: usize,
    /// Outlier threshold in standard deviations for the stats method
    pub outlier_std_devs: f64,
    /// Start offset of the contiguous method
    pub contiguous_offset: usize,
    /// Start each contiguous load where the previous one ended
    pub resume_contiguous: bool,
    /// Tables with fewer records are loaded in full by every method
    pub min_sampling_rows: usize,
    /// Records read per scan step
    pub scan_chunk_size: usize,
    /// Records per `bulk_insert` call
    pub load_chunk_size: usize,
    pub schedule: ScheduleKind,
    /// Directory holding per-table state between runs: `<table>.offsets`
    /// ledgers for the metadata method, `<table>.stats` column statistics
    /// for the stats method and `<table>.resume` contiguous offsets
    pub ledger_dir: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            methods: Method::ALL.to_vec(),
            trials: 3,
            seed: 42,
            sample_fraction: 0.01,
            num_strata: 10,
            outlier_std_devs: 2.0,
            contiguous_offset: 0,
            resume_contiguous: false,
            min_sampling_rows: DEFAULT_MIN_SAMPLING_ROWS,
            scan_chunk_size: DEFAULT_CHUNK_SIZE,
            load_chunk_size: DEFAULT_LOAD_CHUNK_SIZE,
            schedule: ScheduleKind::default(),
            ledger_dir: None,
        }
    }
}

impl BenchConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: BenchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn with_num_strata(mut self, num_strata: usize) -> Self {
        self.num_strata = num_strata;
        self
    }

    pub fn with_resume_contiguous(mut self, resume: bool) -> Self {
        self.resume_contiguous = resume;
        self
    }

    pub fn with_min_sampling_rows(mut self, rows: usize) -> Self {
        self.min_sampling_rows = rows;
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleKind) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_ledger_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ledger_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(BenchError::InvalidArgument(msg.to_string()));
        if self.methods.is_empty() {
            return invalid("at least one method is required");
        }
        if self.trials == 0 {
            return invalid("at least one trial is required");
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return invalid("sample fraction must be in (0, 1]");
        }
        if self.num_strata == 0 {
            return invalid("number of strata must be positive");
        }
        if !(self.outlier_std_devs.is_finite() && self.outlier_std_devs > 0.0) {
            return invalid("outlier threshold must be a positive number");
        }
        if self.scan_chunk_size == 0 || self.load_chunk_size == 0 {
            return invalid("chunk sizes must be positive");
        }
        Ok(())
    }

    /// Number of rows a sampling method targets for a table of `len` rows
    pub fn sample_rows(&self, len: usize) -> usize {
        ((self.sample_fraction * len as f64).floor() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.methods.len(), 5);
        assert_eq!(config.sample_rows(600_000), 6_000);
        assert_eq!(config.sample_rows(10), 1);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(BenchConfig::default().with_trials(0).validate().is_err());
        assert!(BenchConfig::default()
            .with_sample_fraction(1.5)
            .validate()
            .is_err());
        assert!(BenchConfig::default()
            .with_sample_fraction(f64::NAN)
            .validate()
            .is_err());
        assert!(BenchConfig::default().with_methods(vec![]).validate().is_err());
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trials": 5, "methods": ["reference", "stratified"], "schedule": "threads"}}"#
        )
        .unwrap();
        let config = BenchConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.trials, 5);
        assert_eq!(config.methods, vec![Method::Reference, Method::Stratified]);
        assert_eq!(config.schedule, ScheduleKind::Threads);
        assert_eq!(config.seed, 42);
    }
}
