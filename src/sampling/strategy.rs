//! Sampling strategies
//!
//! Every strategy is the same machine configured differently:
//! 1. select windows (an anchor offset plus `[lo, hi)` bounds) over the source
//! 2. scan each window forward from the anchor and, for bidirectional
//!    strategies, backward from the anchor
//! 3. admit rows through the optional filter and stop per the condition
//!
//! Scans are scheduled round-robin one chunk at a time, or on rayon workers.
//! Either way each scan owns its cursor and the only shared state is the
//! admitted-row counter, the active-scan count and the cancellation flag.
//! Under an invocation-wide row budget a step reads at most an even share
//! of the remaining budget, so no single scan can drain it alone.

use super::filter::RowFilter;
use super::stop::{ScanState, StopCondition, Verdict};
use super::Direction;
use crate::error::{BenchError, Result};
use crate::schema::Record;
use crate::source::{Cursor, Offset, RecordSource, SampledRow};
use rand::Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default number of records read per scan step
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default small-table threshold of benchmark methods. Plans built with
/// [`SamplingPlan::new`] start at 0 and only opt in through
/// [`SamplingPlan::with_min_sampling_rows`].
pub const DEFAULT_MIN_SAMPLING_ROWS: usize = 1000;

/// Offset-selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Read the whole source from the start
    Full,
    /// Read forward from a caller-supplied offset
    SequentialSubset { offset: Offset },
    /// Read in both directions from one uniformly random offset
    RandomSubset,
    /// Read in both directions from the midpoint of each of `num_parallel` strata
    ParallelSubsets { num_parallel: usize },
}

impl Strategy {
    pub fn is_bidirectional(&self) -> bool {
        matches!(
            self,
            Strategy::RandomSubset | Strategy::ParallelSubsets { .. }
        )
    }

    /// Choose the windows to scan. `len` must be non-zero.
    pub fn select_windows<R: Rng + ?Sized>(
        &self,
        source: &dyn RecordSource,
        rng: &mut R,
    ) -> Result<Vec<Window>> {
        let len = source.len();
        let windows = match *self {
            Strategy::Full => vec![Window {
                lo: 0,
                anchor: source.seek(0)?.position(),
                hi: len,
            }],
            Strategy::SequentialSubset { offset } => vec![Window {
                lo: offset,
                anchor: source.seek(offset)?.position(),
                hi: len,
            }],
            Strategy::RandomSubset => {
                let anchor = rng.gen_range(0..len);
                vec![Window {
                    lo: 0,
                    anchor: source.seek(anchor)?.position(),
                    hi: len,
                }]
            }
            Strategy::ParallelSubsets { num_parallel } => {
                if num_parallel == 0 {
                    return Err(BenchError::InvalidArgument(
                        "parallel subsets need at least one partition".into(),
                    ));
                }
                let mut windows = Vec::with_capacity(num_parallel);
                for i in 0..num_parallel {
                    let lo = i * len / num_parallel;
                    let hi = (i + 1) * len / num_parallel;
                    if lo < hi {
                        let anchor = source.seek(lo + (hi - lo) / 2)?.position();
                        windows.push(Window { lo, anchor, hi });
                    }
                }
                windows
            }
        };
        Ok(windows)
    }
}

/// Region of the source scanned outward from `anchor`, within `[lo, hi)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub lo: Offset,
    pub anchor: Offset,
    pub hi: Offset,
}

/// How the scans of one invocation are interleaved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Step every active scan one chunk at a time, in turn
    #[default]
    RoundRobin,
    /// Run every scan on its own rayon task
    Threads,
}

/// Strategy + stopping condition + filter: one benchmark method's access path
#[derive(Debug, Clone)]
pub struct SamplingPlan {
    pub strategy: Strategy,
    pub stop: StopCondition,
    pub filter: Option<RowFilter>,
    pub chunk_size: usize,
    pub schedule: Schedule,
    pub min_sampling_rows: usize,
}

impl SamplingPlan {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            stop: StopCondition::Never,
            filter: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            schedule: Schedule::default(),
            min_sampling_rows: 0,
        }
    }

    /// Plan that reads every record
    pub fn full() -> Self {
        Self::new(Strategy::Full)
    }

    pub fn with_stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Load sources smaller than `rows` in full, unstopped and unfiltered
    pub fn with_min_sampling_rows(mut self, rows: usize) -> Self {
        self.min_sampling_rows = rows;
        self
    }

    /// Draw a sample from `source`.
    ///
    /// An empty source yields an empty sample. Any seek, read or condition
    /// failure aborts the invocation; no partial sample is returned.
    pub fn run<R: Rng + ?Sized>(&self, source: &dyn RecordSource, rng: &mut R) -> Result<Sample> {
        let start = Instant::now();
        let table = source.schema().name.clone();

        if self.chunk_size == 0 {
            return Err(BenchError::InvalidArgument(
                "chunk size must be positive".into(),
            ));
        }
        if source.is_empty() {
            return Ok(Sample::empty(table));
        }

        // Small sources are loaded whole and unfiltered
        let (strategy, stop, filter) = if source.len() < self.min_sampling_rows {
            (Strategy::Full, StopCondition::Never, None)
        } else if matches!(self.strategy, Strategy::Full) {
            (Strategy::Full, StopCondition::Never, self.filter.as_ref())
        } else {
            (self.strategy, self.stop.clone(), self.filter.as_ref())
        };

        let windows = strategy.select_windows(source, rng)?;
        let mut tasks = Vec::new();
        for (partition, w) in windows.iter().enumerate() {
            if w.anchor < w.hi {
                tasks.push(ScanTask::new(partition, Direction::Forward, w.anchor, w.hi, &stop));
            }
            if strategy.is_bidirectional() && w.lo < w.anchor {
                tasks.push(ScanTask::new(partition, Direction::Backward, w.anchor, w.lo, &stop));
            }
        }

        let ctx = ScanContext {
            source,
            stop: &stop,
            filter,
            chunk_size: self.chunk_size,
            budget: stop.total_budget(),
            admitted: AtomicUsize::new(0),
            active: AtomicUsize::new(tasks.len()),
            cancelled: AtomicBool::new(false),
        };

        let tasks = match self.schedule {
            Schedule::RoundRobin => ctx.run_round_robin(tasks)?,
            Schedule::Threads => ctx.run_threads(tasks)?,
        };

        let scanned = tasks.iter().map(|t| t.scanned).sum();
        let mut rows: Vec<SampledRow> = tasks.into_iter().flat_map(|t| t.rows).collect();
        rows.sort_unstable_by_key(|r| r.offset);
        debug_assert!(rows.windows(2).all(|p| p[0].offset < p[1].offset));

        let sample = Sample {
            table,
            rows,
            windows,
            scanned,
            elapsed: start.elapsed(),
        };
        debug!(
            "Sampled {} of {} rows from {} ({:?}, {} window(s), {} scanned) in {:?}",
            sample.len(),
            source.len(),
            sample.table,
            strategy,
            sample.windows.len(),
            sample.scanned,
            sample.elapsed
        );
        Ok(sample)
    }
}

/// Rows selected from one table by one strategy invocation
#[derive(Debug, Clone)]
pub struct Sample {
    pub table: String,
    /// Rows in source order, unique by offset
    pub rows: Vec<SampledRow>,
    pub windows: Vec<Window>,
    /// Records read, including ones rejected by the filter
    pub scanned: usize,
    pub elapsed: Duration,
}

impl Sample {
    fn empty(table: String) -> Self {
        Self {
            table,
            rows: Vec::new(),
            windows: Vec::new(),
            scanned: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn offsets(&self) -> Vec<Offset> {
        self.rows.iter().map(|r| r.offset).collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.rows.iter().map(|r| &r.record)
    }
}

/// One scan direction of one window
#[derive(Debug)]
struct ScanTask {
    direction: Direction,
    cursor: Cursor,
    /// `hi` for forward scans, `lo` for backward scans
    bound: Offset,
    state: ScanState,
    rows: Vec<SampledRow>,
    scanned: usize,
    done: bool,
}

impl ScanTask {
    fn new(
        partition: usize,
        direction: Direction,
        anchor: Offset,
        bound: Offset,
        stop: &StopCondition,
    ) -> Self {
        Self {
            direction,
            cursor: Cursor::at(anchor),
            bound,
            state: stop.begin(direction, partition),
            rows: Vec::new(),
            scanned: 0,
            done: false,
        }
    }

    fn remaining(&self) -> usize {
        match self.direction {
            Direction::Forward => self.bound.saturating_sub(self.cursor.position()),
            Direction::Backward => self.cursor.position().saturating_sub(self.bound),
        }
    }
}

struct ScanContext<'a> {
    source: &'a dyn RecordSource,
    stop: &'a StopCondition,
    filter: Option<&'a RowFilter>,
    chunk_size: usize,
    budget: Option<usize>,
    admitted: AtomicUsize,
    /// Scans still running on the threaded schedule
    active: AtomicUsize,
    cancelled: AtomicBool,
}

impl ScanContext<'_> {
    /// Evaluate the condition before any read
    fn prime(&self, task: &mut ScanTask) -> Result<Verdict> {
        task.state.observe_total(self.admitted.load(Ordering::SeqCst));
        let verdict = self.stop.evaluate(None, &task.state)?;
        if verdict != Verdict::Continue || task.remaining() == 0 {
            task.done = true;
        }
        Ok(verdict)
    }

    /// Even share of the remaining row budget among `active` scans
    fn share(&self, active: usize) -> usize {
        match self.budget {
            Some(budget) => {
                let left = budget.saturating_sub(self.admitted.load(Ordering::SeqCst));
                left.div_ceil(active.max(1)).max(1)
            }
            None => self.chunk_size,
        }
    }

    /// Read up to `cap` records and admit them, nearest the anchor first
    fn step(&self, task: &mut ScanTask, cap: usize) -> Result<Verdict> {
        let n = self.chunk_size.min(cap).min(task.remaining());
        let (chunk, cursor) = match task.direction {
            Direction::Forward => self.source.read_forward(task.cursor, n)?,
            Direction::Backward => self.source.read_backward(task.cursor, n)?,
        };
        task.cursor = cursor;

        let ordered: Box<dyn Iterator<Item = SampledRow>> = match task.direction {
            Direction::Forward => Box::new(chunk.into_iter()),
            Direction::Backward => Box::new(chunk.into_iter().rev()),
        };

        for row in ordered {
            if self.cancelled.load(Ordering::SeqCst) {
                task.done = true;
                return Ok(Verdict::StopAll);
            }
            task.scanned += 1;
            if let Some(filter) = self.filter {
                if !filter.admits(&row) {
                    continue;
                }
            }
            let total = self.admitted.fetch_add(1, Ordering::SeqCst) + 1;
            task.state.admit(&row.record, total);
            let verdict = self.stop.evaluate(Some(&row.record), &task.state)?;
            task.rows.push(row);
            if verdict != Verdict::Continue {
                task.done = true;
                return Ok(verdict);
            }
        }

        if n == 0 || task.remaining() == 0 {
            task.done = true;
        }
        Ok(Verdict::Continue)
    }

    fn run_round_robin(&self, mut tasks: Vec<ScanTask>) -> Result<Vec<ScanTask>> {
        for task in tasks.iter_mut() {
            if self.prime(task)? == Verdict::StopAll {
                return Ok(tasks);
            }
        }

        let mut rounds = 0usize;
        while tasks.iter().any(|t| !t.done) {
            rounds += 1;
            let share = self.share(tasks.iter().filter(|t| !t.done).count());
            for task in tasks.iter_mut().filter(|t| !t.done) {
                if self.step(task, share)? == Verdict::StopAll {
                    self.cancelled.store(true, Ordering::SeqCst);
                    debug!("Global stop after {} round(s)", rounds);
                    return Ok(tasks);
                }
            }
        }
        Ok(tasks)
    }

    fn run_threads(&self, tasks: Vec<ScanTask>) -> Result<Vec<ScanTask>> {
        tasks
            .into_par_iter()
            .map(|mut task| {
                if self.prime(&mut task)? == Verdict::StopAll {
                    self.cancelled.store(true, Ordering::SeqCst);
                }
                while !task.done && !self.cancelled.load(Ordering::SeqCst) {
                    let share = self.share(self.active.load(Ordering::SeqCst));
                    if self.step(&mut task, share)? == Verdict::StopAll {
                        self.cancelled.store(true, Ordering::SeqCst);
                    }
                }
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(task)
            })
            .collect()
    }
}
