//! Offset selection, scanning and stopping
//!
//! - `strategy`: where scans start and how they are scheduled
//! - `stop`: when a scan (or all scans) end
//! - `filter`: which scanned rows are admitted
//! - `stats` / `ledger`: the state the statistical and metadata filters consult

mod filter;
mod ledger;
mod stats;
mod stop;
mod strategy;

pub use filter::RowFilter;
pub use ledger::OffsetLedger;
pub use stats::{ColumnStats, RunningStats};
pub use stop::{ScanState, StopCondition, StopFn, Verdict};
pub use strategy::{
    Sample, SamplingPlan, Schedule, Strategy, Window, DEFAULT_CHUNK_SIZE,
    DEFAULT_MIN_SAMPLING_ROWS,
};

/// Scan direction relative to a window's anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Increasing offsets, starting at the anchor
    Forward,
    /// Decreasing offsets, starting just before the anchor
    Backward,
}
