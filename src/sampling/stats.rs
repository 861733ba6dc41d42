//! Per-column running statistics
//!
//! Uses Welford's online algorithm so that statistics can be accumulated in
//! a single streaming pass over a source. Table statistics persist as a
//! `FieldName,mean,stddev,count` file so later runs can skip the pass.

use crate::error::{BenchError, Result};
use crate::schema::{Record, TableSchema};
use crate::source::RecordSource;
use std::path::Path;

const STATS_HEADER: [&str; 4] = ["FieldName", "mean", "stddev", "count"];

/// Online mean / variance accumulator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
    previous_mean: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an accumulator from saved moments
    pub fn from_moments(count: usize, mean: f64, std_dev: f64) -> Self {
        Self {
            count,
            mean,
            m2: std_dev * std_dev * count as f64,
            previous_mean: mean,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.previous_mean = self.mean;
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Relative change of the mean caused by the most recent value.
    ///
    /// Falls back to the absolute change when the mean is zero.
    pub fn relative_mean_delta(&self) -> f64 {
        let delta = (self.mean - self.previous_mean).abs();
        if self.mean == 0.0 {
            delta
        } else {
            delta / self.mean.abs()
        }
    }
}

/// Mean and standard deviation of every numeric column of a table
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    columns: Vec<Option<RunningStats>>,
}

impl ColumnStats {
    /// Accumulate statistics from records. Only columns that hold at least
    /// one numeric value get statistics.
    pub fn from_records<'a, I>(num_columns: usize, records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut stats = Self {
            columns: vec![None; num_columns],
        };
        for record in records {
            stats.observe(record);
        }
        stats
    }

    /// One full read-only pass over a source, `chunk_size` records at a time
    pub fn from_source(source: &dyn RecordSource, chunk_size: usize) -> Result<Self> {
        let mut stats = Self {
            columns: vec![None; source.schema().num_columns()],
        };
        let chunk_size = chunk_size.max(1);
        let mut start = 0;
        while start < source.len() {
            let end = (start + chunk_size).min(source.len());
            for row in source.read_range(start, end)? {
                stats.observe(&row.record);
            }
            start = end;
        }
        Ok(stats)
    }

    fn observe(&mut self, record: &Record) {
        for (idx, value) in record.values().iter().enumerate() {
            if let (Some(v), Some(slot)) = (value.as_f64(), self.columns.get_mut(idx)) {
                slot.get_or_insert_with(RunningStats::new).push(v);
            }
        }
    }

    /// Read a statistics file written by [`ColumnStats::save`]. Returns
    /// `None` when the file does not exist.
    pub fn load(path: impl AsRef<Path>, schema: &TableSchema) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut stats = Self {
            columns: vec![None; schema.num_columns()],
        };
        for row in reader.records() {
            let row = row?;
            if row.len() != STATS_HEADER.len() {
                return Err(BenchError::Parse(format!(
                    "expected {} fields per line in {}, got {}",
                    STATS_HEADER.len(),
                    path.display(),
                    row.len()
                )));
            }
            let name = &row[0];
            let idx = schema
                .index_of(name)
                .ok_or_else(|| BenchError::ColumnNotFound(name.to_string()))?;
            let number = |i: usize| {
                row[i].trim().parse::<f64>().map_err(|_| {
                    BenchError::Parse(format!(
                        "invalid {} '{}' for {} in {}",
                        STATS_HEADER[i],
                        &row[i],
                        name,
                        path.display()
                    ))
                })
            };
            let (mean, std_dev, count) = (number(1)?, number(2)?, number(3)?);
            stats.columns[idx] = Some(RunningStats::from_moments(count as usize, mean, std_dev));
        }
        Ok(Some(stats))
    }

    /// Write one line per column that has statistics
    pub fn save(&self, path: impl AsRef<Path>, schema: &TableSchema) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(STATS_HEADER)?;
        for (column, stats) in schema.columns.iter().zip(&self.columns) {
            if let Some(stats) = stats {
                writer.write_record([
                    column.name.clone(),
                    stats.mean().to_string(),
                    stats.std_dev().to_string(),
                    stats.count().to_string(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn column(&self, idx: usize) -> Option<&RunningStats> {
        self.columns.get(idx).and_then(|c| c.as_ref())
    }

    /// True when every numeric field lies within `mean ± k·stddev` of its column
    pub fn within_std_devs(&self, record: &Record, k: f64) -> bool {
        record.values().iter().enumerate().all(|(idx, value)| {
            match (value.as_f64(), self.column(idx)) {
                (Some(v), Some(stats)) => {
                    let bound = k * stats.std_dev();
                    v >= stats.mean() - bound && v <= stats.mean() + bound
                }
                _ => true,
            }
        })
    }
}
