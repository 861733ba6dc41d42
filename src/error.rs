//! Error types for the sampling benchmark

use thiserror::Error;

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Main error type for the benchmark harness
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Range error: offset {offset} outside [0, {len})")]
    Range { offset: usize, len: usize },

    #[error("Shape error in {context}: expected {expected}, got {actual}")]
    Shape {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Division error: undefined percent error in {context} at group {group} (result {result})")]
    Division {
        context: String,
        group: usize,
        result: f64,
    },

    #[error("Partial load of table {table}: {chunks_applied} chunk(s) applied before failure: {source}")]
    PartialLoad {
        table: String,
        chunks_applied: usize,
        #[source]
        source: Box<BenchError>,
    },

    #[error("Stop condition error: {0}")]
    StopCondition(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlparser::parser::ParserError> for BenchError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        BenchError::Parse(e.to_string())
    }
}

impl BenchError {
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        BenchError::Shape {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Prefix a statistics error's context, e.g. with the method and query it came from.
    pub fn with_context(self, prefix: &str) -> Self {
        match self {
            BenchError::Shape {
                context,
                expected,
                actual,
            } => BenchError::Shape {
                context: format!("{}: {}", prefix, context),
                expected,
                actual,
            },
            BenchError::Division {
                context,
                group,
                result,
            } => BenchError::Division {
                context: format!("{}: {}", prefix, context),
                group,
                result,
            },
            other => other,
        }
    }

    /// Strategy-level failures skip a single (method, query) pair instead of
    /// aborting the whole run.
    pub fn is_strategy_failure(&self) -> bool {
        matches!(
            self,
            BenchError::Range { .. }
                | BenchError::Io(_)
                | BenchError::Csv(_)
                | BenchError::Parse(_)
                | BenchError::PartialLoad { .. }
                | BenchError::StopCondition(_)
                | BenchError::Store(_)
        )
    }
}
