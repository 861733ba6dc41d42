//! Synthetic lineitem data generator
//!
//! Produces TPC-H shaped lineitem rows either in memory or as a `.tbl` file
//! (pipe-delimited, one trailing delimiter per line) that `FileSource` reads.

use crate::error::Result;
use crate::schema::{Record, Value};
use crate::source::MemorySource;
use crate::tpch::schema::lineitem_schema;
use csv::{QuoteStyle, WriterBuilder};
use rand::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

const RETURN_FLAGS: [&str; 3] = ["N", "R", "A"];
const LINE_STATUS: [&str; 2] = ["O", "F"];
const SHIP_INSTRUCT: [&str; 4] = [
    "DELIVER IN PERSON",
    "COLLECT COD",
    "NONE",
    "TAKE BACK RETURN",
];
const SHIP_MODE: [&str; 7] = ["REG AIR", "AIR", "RAIL", "SHIP", "TRUCK", "MAIL", "FOB"];

/// Lineitem generator
pub struct LineitemGenerator {
    rng: StdRng,
    current_order: i64,
    line_number: i64,
}

impl LineitemGenerator {
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            current_order: 1,
            line_number: 1,
        }
    }

    /// Generate the next row; `i` is its position in the table
    pub fn next_record(&mut self, i: usize) -> Record {
        // Move to the next order periodically
        if i > 0 && self.rng.gen_bool(0.25) {
            self.current_order += 1;
            self.line_number = 1;
        }
        let line = self.line_number;
        self.line_number += 1;

        let quantity = self.rng.gen_range(1..=50) as f64;
        let price = (self.rng.gen_range(90_000..10_000_000) as f64) / 100.0;
        let discount = (self.rng.gen_range(0..=10) as f64) / 100.0;
        let tax = (self.rng.gen_range(0..=8) as f64) / 100.0;
        let ship = self.date();
        let commit = self.date();
        let receipt = self.date();

        Record::new(vec![
            Value::Int(self.current_order),
            Value::Int((i % 200_000 + 1) as i64),
            Value::Int((i % 10_000 + 1) as i64),
            Value::Int(line),
            Value::Float(quantity),
            Value::Float(price),
            Value::Float(discount),
            Value::Float(tax),
            Value::Text(RETURN_FLAGS[self.rng.gen_range(0..RETURN_FLAGS.len())].into()),
            Value::Text(LINE_STATUS[i % LINE_STATUS.len()].into()),
            Value::Text(ship),
            Value::Text(commit),
            Value::Text(receipt),
            Value::Text(SHIP_INSTRUCT[i % SHIP_INSTRUCT.len()].into()),
            Value::Text(SHIP_MODE[i % SHIP_MODE.len()].into()),
            Value::Text("lineitem comment".into()),
        ])
    }

    fn date(&mut self) -> String {
        format!(
            "{}-{:02}-{:02}",
            self.rng.gen_range(1992..=1998),
            self.rng.gen_range(1..=12),
            self.rng.gen_range(1..=28)
        )
    }

    pub fn generate(&mut self, count: usize) -> Vec<Record> {
        (0..count).map(|i| self.next_record(i)).collect()
    }

    pub fn generate_source(&mut self, count: usize) -> MemorySource {
        MemorySource::new(lineitem_schema(), self.generate(count))
    }

    /// Write `count` rows to a `.tbl` file, creating parent directories
    pub fn write_tbl(&mut self, path: &Path, count: usize) -> Result<usize> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new()
            .delimiter(b'|')
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .from_writer(BufWriter::new(file));

        for i in 0..count {
            let record = self.next_record(i);
            let fields = record
                .values()
                .iter()
                .map(|v| v.to_string())
                .chain(std::iter::once(String::new()));
            writer.write_record(fields)?;
        }
        writer.flush()?;

        info!("Wrote {} lineitem rows to {}", count, path.display());
        Ok(count)
    }
}

impl Default for LineitemGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FileSource, RecordSource};

    #[test]
    fn test_generate_matches_schema() {
        let schema = lineitem_schema();
        let records = LineitemGenerator::new().generate(100);
        assert_eq!(records.len(), 100);
        for r in &records {
            assert_eq!(r.len(), schema.num_columns());
            let qty = r[4].as_f64().unwrap();
            assert!((1.0..=50.0).contains(&qty));
        }
    }

    #[test]
    fn test_same_seed_same_rows() {
        let a = LineitemGenerator::with_seed(9).generate(50);
        let b = LineitemGenerator::with_seed(9).generate(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tbl_round_trips_through_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineitem.tbl");
        LineitemGenerator::with_seed(3).write_tbl(&path, 25).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().all(|l| l.ends_with('|')));

        let source = FileSource::open(&path, lineitem_schema()).unwrap();
        assert_eq!(source.len(), 25);
        let rows = source.read_range(0, 25).unwrap();
        let expected = LineitemGenerator::with_seed(3).generate(25);
        let read: Vec<Record> = rows.into_iter().map(|r| r.record).collect();
        assert_eq!(read, expected);
    }
}
