//! In-memory record source

use super::{RecordSource, SampledRow};
use crate::error::{BenchError, Result};
use crate::schema::{Record, TableSchema};

/// Record source over records already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: TableSchema,
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(schema: TableSchema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// Collect every record of another source into memory
    pub fn try_from_source(source: &dyn RecordSource) -> Result<Self> {
        let rows = source.read_range(0, source.len())?;
        Ok(Self::new(
            source.schema().clone(),
            rows.into_iter().map(|r| r.record).collect(),
        ))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl RecordSource for MemorySource {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<SampledRow>> {
        if start > end || end > self.records.len() {
            return Err(BenchError::Range {
                offset: end,
                len: self.records.len(),
            });
        }
        Ok(self.records[start..end]
            .iter()
            .enumerate()
            .map(|(i, record)| SampledRow {
                offset: start + i,
                record: record.clone(),
            })
            .collect())
    }
}
