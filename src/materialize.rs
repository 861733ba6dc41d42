//! Chunked loading of sampled records into a table store

use crate::error::{BenchError, Result};
use crate::schema::{Record, TableSchema};
use crate::store::TableStore;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default number of records per `bulk_insert` call
pub const DEFAULT_LOAD_CHUNK_SIZE: usize = 10_000;

/// Outcome of one table load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
    pub chunks: usize,
    pub chunk_elapsed: Vec<Duration>,
    pub elapsed: Duration,
}

/// Loads records into a store in fixed-size chunks followed by one commit.
///
/// The table must already exist in the store. A failed insert is not
/// rolled back: chunks applied before it remain, and the error reports how
/// many there were.
pub struct Materializer;

impl Materializer {
    pub fn load<'a, I>(
        store: &mut dyn TableStore,
        schema: &TableSchema,
        records: I,
        chunk_size: usize,
    ) -> Result<LoadReport>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        if chunk_size == 0 {
            return Err(BenchError::InvalidArgument(
                "load chunk size must be positive".into(),
            ));
        }

        let start = Instant::now();
        let columns = schema.column_names();
        let mut report = LoadReport {
            table: schema.name.clone(),
            ..Default::default()
        };

        let partial = |chunks_applied: usize, source: BenchError| BenchError::PartialLoad {
            table: schema.name.clone(),
            chunks_applied,
            source: Box::new(source),
        };

        let mut records = records.into_iter().peekable();
        let mut chunk: Vec<Record> = Vec::with_capacity(chunk_size);
        while records.peek().is_some() {
            chunk.clear();
            chunk.extend(records.by_ref().take(chunk_size).cloned());

            let chunk_start = Instant::now();
            let inserted = store
                .bulk_insert(&schema.name, &columns, &chunk)
                .map_err(|e| partial(report.chunks, e))?;
            let chunk_elapsed = chunk_start.elapsed();

            report.rows += inserted;
            report.chunks += 1;
            report.chunk_elapsed.push(chunk_elapsed);
            debug!(
                "Inserted chunk {} into {} ({} rows) in {:?}",
                report.chunks, schema.name, inserted, chunk_elapsed
            );
        }

        if report.chunks > 0 {
            store
                .commit(&schema.name)
                .map_err(|e| partial(report.chunks, e))?;
        }

        report.elapsed = start.elapsed();
        info!(
            "Loaded {} rows into {} in {} chunk(s) ({:?})",
            report.rows, report.table, report.chunks, report.elapsed
        );
        Ok(report)
    }
}
