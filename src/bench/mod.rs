//! Benchmark methods, driver and scoring

pub mod aggregate;
pub mod config;
pub mod method;
pub mod runner;

pub use aggregate::{
    BenchmarkAggregator, BenchmarkReport, Datapoint, Failure, FailureStage, Series, TrialResult,
    TrialSet,
};
pub use config::{BenchConfig, ScheduleKind};
pub use method::Method;
pub use runner::{ledger_file, resume_file, stats_file, BenchQuery, BenchmarkRunner};
