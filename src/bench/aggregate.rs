//! Trial collection and scoring
//!
//! Trials are grouped per (method, query). Scoring a query compares the
//! per-group trial means of every method against the reference method's
//! means. A failure only removes its own (method, query) pair from the
//! report; other pairs are scored as usual.

use super::Method;
use crate::error::{BenchError, Result};
use crate::stats::{mean, mean_absolute_percent_error, trial_means};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Result of one query in one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Aggregate value per group, in group order
    pub values: Vec<f64>,
    pub elapsed: Duration,
}

impl TrialResult {
    pub fn new(values: Vec<f64>, elapsed: Duration) -> Self {
        Self { values, elapsed }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// All trials of one method for one query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialSet {
    pub trials: Vec<TrialResult>,
}

impl TrialSet {
    fn values(&self) -> Vec<Vec<f64>> {
        self.trials.iter().map(|t| t.values.clone()).collect()
    }

    fn times_ms(&self) -> Vec<f64> {
        self.trials.iter().map(TrialResult::elapsed_ms).collect()
    }
}

/// Scored (method, query) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub method: Method,
    pub query: String,
    pub mean_time_ms: f64,
    pub mean_absolute_percent_error: f64,
    pub trials: usize,
}

/// Pipeline stage a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Sampling,
    Load,
    Query,
    Statistics,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Sampling => "sampling",
            FailureStage::Load => "load",
            FailureStage::Query => "query",
            FailureStage::Statistics => "statistics",
        };
        write!(f, "{}", name)
    }
}

/// (method, query) pair that could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub method: Method,
    pub query: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone)]
enum Entry {
    Trials(TrialSet),
    Failed(FailureStage, String),
}

/// Collects trial results and scores them
#[derive(Debug, Clone, Default)]
pub struct BenchmarkAggregator {
    /// Keyed by (query, method); queries keep insertion order via `queries`
    entries: BTreeMap<(usize, Method), Entry>,
    queries: Vec<String>,
}

impl BenchmarkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn query_index(&mut self, query: &str) -> usize {
        match self.queries.iter().position(|q| q == query) {
            Some(idx) => idx,
            None => {
                self.queries.push(query.to_string());
                self.queries.len() - 1
            }
        }
    }

    /// Add one trial. Trials for a pair that already failed are dropped.
    pub fn record_trial(&mut self, method: Method, query: &str, trial: TrialResult) {
        let idx = self.query_index(query);
        match self
            .entries
            .entry((idx, method))
            .or_insert_with(|| Entry::Trials(TrialSet::default()))
        {
            Entry::Trials(set) => set.trials.push(trial),
            Entry::Failed(..) => {}
        }
    }

    /// Mark a pair as failed; its trials are discarded
    pub fn record_failure(
        &mut self,
        method: Method,
        query: &str,
        stage: FailureStage,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        warn!("{} / {} failed during {}: {}", method, query, stage, reason);
        let idx = self.query_index(query);
        self.entries
            .insert((idx, method), Entry::Failed(stage, reason));
    }

    /// Score every recorded pair
    pub fn finish(&self) -> BenchmarkReport {
        let mut report = BenchmarkReport::default();

        for (idx, query) in self.queries.iter().enumerate() {
            let methods: Vec<(Method, &Entry)> = self
                .entries
                .range((idx, Method::Reference)..=(idx, Method::Stratified))
                .map(|((_, m), e)| (*m, e))
                .collect();

            let reference_means = match self.entries.get(&(idx, Method::Reference)) {
                Some(Entry::Trials(set)) => trial_means(&set.values())
                    .map_err(|e| e.with_context(&format!("{} / {}", Method::Reference, query))),
                Some(Entry::Failed(..)) => Err(BenchError::InvalidArgument(
                    "reference method failed".into(),
                )),
                None => Err(BenchError::InvalidArgument(
                    "reference method was not run".into(),
                )),
            };

            for (method, entry) in methods {
                let set = match entry {
                    Entry::Trials(set) => set,
                    Entry::Failed(stage, reason) => {
                        report.failures.push(Failure {
                            method,
                            query: query.clone(),
                            stage: *stage,
                            reason: reason.clone(),
                        });
                        continue;
                    }
                };
                match Self::score(method, query, set, &reference_means) {
                    Ok(dp) => report.datapoints.push(dp),
                    Err(e) => {
                        warn!("{} / {} could not be scored: {}", method, query, e);
                        report.failures.push(Failure {
                            method,
                            query: query.clone(),
                            stage: FailureStage::Statistics,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        report
    }

    fn score(
        method: Method,
        query: &str,
        set: &TrialSet,
        reference_means: &Result<Vec<f64>>,
    ) -> Result<Datapoint> {
        let context = format!("{} / {}", method, query);
        let means = trial_means(&set.values()).map_err(|e| e.with_context(&context))?;
        let error = if method.is_reference() {
            // Reference vs itself
            0.0
        } else {
            let reference = reference_means
                .as_ref()
                .map_err(|e| BenchError::InvalidArgument(e.to_string()))?;
            mean_absolute_percent_error(reference, &means).map_err(|e| e.with_context(&context))?
        };
        let mean_time_ms = mean(&set.times_ms()).unwrap_or(0.0);
        Ok(Datapoint {
            method,
            query: query.to_string(),
            mean_time_ms,
            mean_absolute_percent_error: error,
            trials: set.trials.len(),
        })
    }
}

/// Scored benchmark run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub datapoints: Vec<Datapoint>,
    pub failures: Vec<Failure>,
}

/// Per-method `(mean times in ms, mean absolute percent errors)`, one entry per query
pub type Series = BTreeMap<Method, (Vec<f64>, Vec<f64>)>;

impl BenchmarkReport {
    /// Reporting artifact: method → (times, errors). Every method that appears in
    /// the report has an entry, possibly with empty lists.
    pub fn series(&self) -> Series {
        let mut series = Series::new();
        for f in &self.failures {
            series.entry(f.method).or_default();
        }
        for dp in &self.datapoints {
            let (times, errors) = series.entry(dp.method).or_default();
            times.push(dp.mean_time_ms);
            errors.push(dp.mean_absolute_percent_error);
        }
        series
    }

    pub fn datapoint(&self, method: Method, query: &str) -> Option<&Datapoint> {
        self.datapoints
            .iter()
            .find(|d| d.method == method && d.query == query)
    }

    pub fn failure(&self, method: Method, query: &str) -> Option<&Failure> {
        self.failures
            .iter()
            .find(|f| f.method == method && f.query == query)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<12} {:<10} {:>14} {:>10} {:>7}",
            "method", "query", "mean time ms", "MAPE %", "trials"
        )?;
        for dp in &self.datapoints {
            writeln!(
                f,
                "{:<12} {:<10} {:>14.3} {:>10.4} {:>7}",
                dp.method, dp.query, dp.mean_time_ms, dp.mean_absolute_percent_error, dp.trials
            )?;
        }
        for fail in &self.failures {
            writeln!(
                f,
                "{:<12} {:<10} FAILED ({}): {}",
                fail.method, fail.query, fail.stage, fail.reason
            )?;
        }
        Ok(())
    }
}
