//! Record sources
//!
//! A record source is a position-addressable, bidirectionally readable
//! sequence of records:
//! - `MemorySource`: records held in memory
//! - `FileSource`: a delimited flat file indexed by line

mod file;
mod memory;

pub use file::{FileSource, FileSourceOptions};
pub use memory::MemorySource;

use crate::error::{BenchError, Result};
use crate::schema::{Record, TableSchema};

/// Logical position of a record within a source (record index)
pub type Offset = usize;

/// Read position within a source.
///
/// A cursor at position `p` sits between record `p - 1` and record `p`:
/// forward reads start at `p`, backward reads end just before `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    position: Offset,
}

impl Cursor {
    pub(crate) fn at(position: Offset) -> Self {
        Self { position }
    }

    pub fn position(&self) -> Offset {
        self.position
    }
}

/// A record together with the offset it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct SampledRow {
    pub offset: Offset,
    pub record: Record,
}

/// Position-addressable record sequence
pub trait RecordSource: Send + Sync {
    /// Schema of the records produced by this source
    fn schema(&self) -> &TableSchema;

    /// Number of records; valid offsets are `[0, len)`
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position a cursor at `offset`. Offsets outside `[0, len)` fail with a range error.
    fn seek(&self, offset: Offset) -> Result<Cursor> {
        if offset >= self.len() {
            return Err(BenchError::Range {
                offset,
                len: self.len(),
            });
        }
        Ok(Cursor::at(offset))
    }

    /// Read the records in `[start, end)` in source order.
    fn read_range(&self, start: Offset, end: Offset) -> Result<Vec<SampledRow>>;

    /// Read up to `max_count` records starting at the cursor.
    ///
    /// Returns fewer than `max_count` records only at end of source.
    fn read_forward(&self, cursor: Cursor, max_count: usize) -> Result<(Vec<SampledRow>, Cursor)> {
        let start = cursor.position().min(self.len());
        let end = start.saturating_add(max_count).min(self.len());
        let rows = self.read_range(start, end)?;
        Ok((rows, Cursor::at(end)))
    }

    /// Read up to `max_count` records strictly preceding the cursor, in
    /// source order, not reversed.
    ///
    /// Returns fewer than `max_count` records only at start of source.
    fn read_backward(
        &self,
        cursor: Cursor,
        max_count: usize,
    ) -> Result<(Vec<SampledRow>, Cursor)> {
        let end = cursor.position().min(self.len());
        let start = end.saturating_sub(max_count);
        let rows = self.read_range(start, end)?;
        Ok((rows, Cursor::at(start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnKind, Value};

    fn source(n: i64) -> MemorySource {
        let schema = TableSchema::new("t", vec![ColumnDef::new("id", ColumnKind::Int)]);
        let records = (0..n).map(|i| Record::new(vec![Value::Int(i)])).collect();
        MemorySource::new(schema, records)
    }

    fn offsets(rows: &[SampledRow]) -> Vec<Offset> {
        rows.iter().map(|r| r.offset).collect()
    }

    #[test]
    fn test_seek_out_of_range() {
        let src = source(3);
        assert!(src.seek(2).is_ok());
        assert!(matches!(
            src.seek(3),
            Err(BenchError::Range { offset: 3, len: 3 })
        ));
        assert!(source(0).seek(0).is_err());
    }

    #[test]
    fn test_forward_and_backward_meet_without_gap() {
        let src = source(10);
        let cursor = src.seek(4).unwrap();

        let (fwd, end) = src.read_forward(cursor, 100).unwrap();
        assert_eq!(offsets(&fwd), vec![4, 5, 6, 7, 8, 9]);
        assert_eq!(end.position(), 10);

        let (back, start) = src.read_backward(cursor, 3).unwrap();
        assert_eq!(offsets(&back), vec![1, 2, 3]);
        let (rest, start) = src.read_backward(start, 3).unwrap();
        assert_eq!(offsets(&rest), vec![0]);
        assert_eq!(start.position(), 0);
    }

    #[test]
    fn test_read_at_bounds_is_empty() {
        let src = source(5);
        let (rows, cursor) = src.read_backward(src.seek(0).unwrap(), 4).unwrap();
        assert!(rows.is_empty());
        assert_eq!(cursor.position(), 0);

        let (rows, _) = src.read_forward(Cursor::at(5), 4).unwrap();
        assert!(rows.is_empty());
    }
}
