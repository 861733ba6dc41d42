//! Stopping conditions for sampling scans
//!
//! A condition is plain configuration; the running state it is evaluated
//! against is owned by the scan. Every scan direction / partition starts
//! from a fresh [`ScanState`] obtained from [`StopCondition::begin`].
//!
//! Evaluation happens once before the first read (with no record) and then
//! after each admitted record, i.e. the record that satisfies a condition is
//! part of the sample.

use super::stats::RunningStats;
use super::Direction;
use crate::error::Result;
use crate::schema::Record;
use std::fmt;
use std::sync::Arc;

/// Outcome of evaluating a stopping condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verdict {
    /// Keep scanning
    Continue,
    /// Stop this scan only
    StopScan,
    /// Stop every scan of the current strategy invocation
    StopAll,
}

/// User-supplied stopping predicate
pub type StopFn = dyn Fn(Option<&Record>, &ScanState) -> Result<Verdict> + Send + Sync;

#[derive(Clone)]
pub enum StopCondition {
    Never,
    /// Stop the scan once it has admitted this many rows
    RowLimit(usize),
    /// Stop all scans once the invocation has admitted this many rows in total
    TotalRows(usize),
    /// Stop the scan once the running mean of `column` settles
    MeanConverged {
        column: usize,
        tolerance: f64,
        min_rows: usize,
    },
    /// The strongest verdict of all members wins
    Any(Vec<StopCondition>),
    Custom(Arc<StopFn>),
}

impl fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCondition::Never => write!(f, "Never"),
            StopCondition::RowLimit(n) => write!(f, "RowLimit({})", n),
            StopCondition::TotalRows(n) => write!(f, "TotalRows({})", n),
            StopCondition::MeanConverged {
                column,
                tolerance,
                min_rows,
            } => f
                .debug_struct("MeanConverged")
                .field("column", column)
                .field("tolerance", tolerance)
                .field("min_rows", min_rows)
                .finish(),
            StopCondition::Any(members) => f.debug_tuple("Any").field(members).finish(),
            StopCondition::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl StopCondition {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<&Record>, &ScanState) -> Result<Verdict> + Send + Sync + 'static,
    {
        StopCondition::Custom(Arc::new(f))
    }

    /// Fresh running state for one scan
    pub fn begin(&self, direction: Direction, partition: usize) -> ScanState {
        let mut columns = Vec::new();
        self.tracked_columns(&mut columns);
        columns.sort_unstable();
        columns.dedup();
        ScanState {
            direction,
            partition,
            rows: 0,
            total_rows: 0,
            trackers: columns
                .into_iter()
                .map(|c| (c, RunningStats::new()))
                .collect(),
        }
    }

    fn tracked_columns(&self, out: &mut Vec<usize>) {
        match self {
            StopCondition::MeanConverged { column, .. } => out.push(*column),
            StopCondition::Any(members) => {
                for m in members {
                    m.tracked_columns(out);
                }
            }
            _ => {}
        }
    }

    /// Invocation-wide row budget, if any member imposes one
    pub fn total_budget(&self) -> Option<usize> {
        match self {
            StopCondition::TotalRows(limit) => Some(*limit),
            StopCondition::Any(members) => members.iter().filter_map(|m| m.total_budget()).min(),
            _ => None,
        }
    }

    pub fn evaluate(&self, record: Option<&Record>, state: &ScanState) -> Result<Verdict> {
        let verdict = match self {
            StopCondition::Never => Verdict::Continue,
            StopCondition::RowLimit(limit) => {
                if state.rows >= *limit {
                    Verdict::StopScan
                } else {
                    Verdict::Continue
                }
            }
            StopCondition::TotalRows(limit) => {
                if state.total_rows >= *limit {
                    Verdict::StopAll
                } else {
                    Verdict::Continue
                }
            }
            StopCondition::MeanConverged {
                column,
                tolerance,
                min_rows,
            } => match state.tracker(*column) {
                Some(stats)
                    if record.is_some()
                        && stats.count() >= (*min_rows).max(2)
                        && stats.relative_mean_delta() <= *tolerance =>
                {
                    Verdict::StopScan
                }
                _ => Verdict::Continue,
            },
            StopCondition::Any(members) => {
                let mut strongest = Verdict::Continue;
                for m in members {
                    strongest = strongest.max(m.evaluate(record, state)?);
                }
                strongest
            }
            StopCondition::Custom(f) => f(record, state)?,
        };
        Ok(verdict)
    }
}

/// Running state of one scan direction / partition
#[derive(Debug, Clone)]
pub struct ScanState {
    direction: Direction,
    partition: usize,
    rows: usize,
    total_rows: usize,
    trackers: Vec<(usize, RunningStats)>,
}

impl ScanState {
    /// Account for an admitted record. `total_rows` is the invocation-wide
    /// admitted count including this record.
    pub(crate) fn admit(&mut self, record: &Record, total_rows: usize) {
        self.rows += 1;
        self.total_rows = total_rows;
        for (column, stats) in &mut self.trackers {
            if let Some(v) = record.get(*column).and_then(|v| v.as_f64()) {
                stats.push(v);
            }
        }
    }

    pub(crate) fn observe_total(&mut self, total_rows: usize) {
        self.total_rows = total_rows;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Rows admitted by this scan
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Rows admitted by all scans of the invocation
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn tracker(&self, column: usize) -> Option<&RunningStats> {
        self.trackers
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::schema::Value;

    fn rec(v: f64) -> Record {
        Record::new(vec![Value::Float(v)])
    }

    #[test]
    fn test_row_limit() {
        let cond = StopCondition::RowLimit(2);
        let mut state = cond.begin(Direction::Forward, 0);
        assert_eq!(cond.evaluate(None, &state).unwrap(), Verdict::Continue);
        state.admit(&rec(1.0), 1);
        assert_eq!(cond.evaluate(Some(&rec(1.0)), &state).unwrap(), Verdict::Continue);
        state.admit(&rec(1.0), 2);
        assert_eq!(cond.evaluate(Some(&rec(1.0)), &state).unwrap(), Verdict::StopScan);
    }

    #[test]
    fn test_zero_row_limit_stops_before_reading() {
        let cond = StopCondition::RowLimit(0);
        let state = cond.begin(Direction::Backward, 0);
        assert_eq!(cond.evaluate(None, &state).unwrap(), Verdict::StopScan);
    }

    #[test]
    fn test_any_prefers_global_stop() {
        let cond = StopCondition::Any(vec![StopCondition::RowLimit(1), StopCondition::TotalRows(1)]);
        let mut state = cond.begin(Direction::Forward, 3);
        state.admit(&rec(1.0), 1);
        assert_eq!(cond.evaluate(Some(&rec(1.0)), &state).unwrap(), Verdict::StopAll);
        assert_eq!(state.partition(), 3);
    }

    #[test]
    fn test_total_budget() {
        assert_eq!(StopCondition::TotalRows(7).total_budget(), Some(7));
        assert_eq!(StopCondition::RowLimit(7).total_budget(), None);
        let cond = StopCondition::Any(vec![
            StopCondition::TotalRows(30),
            StopCondition::RowLimit(1),
            StopCondition::TotalRows(12),
        ]);
        assert_eq!(cond.total_budget(), Some(12));
    }

    #[test]
    fn test_mean_converged() {
        let cond = StopCondition::MeanConverged {
            column: 0,
            tolerance: 0.01,
            min_rows: 3,
        };
        let mut state = cond.begin(Direction::Forward, 0);
        let values = [10.0, 30.0, 26.0, 22.0];
        let mut verdicts = Vec::new();
        for (i, v) in values.iter().enumerate() {
            state.admit(&rec(*v), i + 1);
            verdicts.push(cond.evaluate(Some(&rec(*v)), &state).unwrap());
        }
        assert_eq!(
            verdicts,
            vec![
                Verdict::Continue,
                Verdict::Continue,
                Verdict::Continue,
                Verdict::StopScan
            ]
        );
    }

    #[test]
    fn test_custom_error_propagates() {
        let cond = StopCondition::custom(|_, _| Err(BenchError::StopCondition("boom".into())));
        let state = cond.begin(Direction::Forward, 0);
        assert!(cond.evaluate(None, &state).is_err());
    }
}
