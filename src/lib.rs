//! Sampling-strategy benchmark for approximate aggregate queries
//!
//! Loads a table under several data-access methods (a full reference scan
//! and partial, sampled scans), runs the same aggregate queries against each
//! load, and scores every method by mean execution time and by mean
//! absolute percent error against the reference.

pub mod bench;
pub mod error;
pub mod materialize;
pub mod sampling;
pub mod schema;
pub mod source;
pub mod stats;
pub mod store;
pub mod tpch;

// Re-export main types
pub use bench::{BenchConfig, BenchQuery, BenchmarkReport, BenchmarkRunner, Method};
pub use error::{BenchError, Result};
pub use materialize::{LoadReport, Materializer};
pub use sampling::{RowFilter, Sample, SamplingPlan, StopCondition, Strategy, Verdict};
pub use schema::{parse_ddl, ColumnDef, ColumnKind, Record, TableSchema, Value};
pub use source::{FileSource, MemorySource, RecordSource};
pub use store::{MemoryStore, QueryRows, TableStore};
