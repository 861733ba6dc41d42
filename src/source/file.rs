//! Delimited flat-file record source
//!
//! The file is indexed once on open: the byte offset at which every record
//! starts, plus an end sentinel. Reads seek straight to the byte range of
//! the requested records and parse only that slice.

use super::{RecordSource, SampledRow};
use crate::error::{BenchError, Result};
use crate::schema::TableSchema;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options for reading a delimited file
#[derive(Debug, Clone)]
pub struct FileSourceOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Whether the first line is a header to skip
    pub has_header: bool,
}

impl Default for FileSourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            has_header: false,
        }
    }
}

/// Record source backed by a delimited file on disk
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    schema: TableSchema,
    options: FileSourceOptions,
    /// Byte offset of each record, followed by the end-of-data offset
    line_starts: Vec<u64>,
    file: Mutex<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>, schema: TableSchema) -> Result<Self> {
        Self::open_with_options(path, schema, FileSourceOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        schema: TableSchema,
        options: FileSourceOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let line_starts = index_lines(&file, options.has_header)?;

        debug!(
            "Indexed {} records in {}",
            line_starts.len().saturating_sub(1),
            path.display()
        );

        Ok(Self {
            path,
            schema,
            options,
            line_starts,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line_number(&self, offset: usize) -> usize {
        offset + 1 + usize::from(self.options.has_header)
    }
}

/// Build the record start index. Blank lines are not records.
fn index_lines(file: &File, has_header: bool) -> Result<Vec<u64>> {
    let mut reader = BufReader::new(file);
    let mut starts = Vec::new();
    let mut line = Vec::new();
    let mut pos = 0u64;
    let mut end_of_data = 0u64;
    let mut skip_header = has_header;

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        let is_blank = line.iter().all(|b| matches!(b, b'\n' | b'\r'));
        if !is_blank {
            if skip_header {
                skip_header = false;
            } else {
                starts.push(pos);
                end_of_data = pos + n as u64;
            }
        }
        pos += n as u64;
    }

    if !starts.is_empty() {
        starts.push(end_of_data);
    }
    Ok(starts)
}

impl RecordSource for FileSource {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn len(&self) -> usize {
        self.line_starts.len().saturating_sub(1)
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<SampledRow>> {
        if start > end || end > self.len() {
            return Err(BenchError::Range {
                offset: end,
                len: self.len(),
            });
        }
        if start == end {
            return Ok(Vec::new());
        }

        let byte_start = self.line_starts[start];
        let byte_end = self.line_starts[end];
        let mut buf = vec![0u8; (byte_end - byte_start) as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(byte_start))?;
            file.read_exact(&mut buf)?;
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(buf.as_slice());

        let mut rows = Vec::with_capacity(end - start);
        for (i, result) in reader.records().enumerate() {
            let offset = start + i;
            let fields = result?;
            let record = self.schema.parse_fields(fields.iter()).map_err(|e| {
                BenchError::Parse(format!(
                    "{}:{}: {}",
                    self.path.display(),
                    self.line_number(offset),
                    e
                ))
            })?;
            rows.push(SampledRow { offset, record });
        }

        if rows.len() != end - start {
            return Err(BenchError::Parse(format!(
                "{}: expected {} records in range [{}, {}), parsed {}",
                self.path.display(),
                end - start,
                start,
                end,
                rows.len()
            )));
        }
        Ok(rows)
    }
}
