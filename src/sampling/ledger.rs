//! Ledger of offsets already loaded from a source
//!
//! Persisted as a flat list of comma-separated offsets so that a later run
//! can skip rows that an earlier run already materialized.

use crate::error::{BenchError, Result};
use crate::source::Offset;
use hashbrown::HashSet;
use parking_lot::RwLock;
use std::fs;
use std::path::Path;

/// Thread-safe set of loaded offsets
#[derive(Debug, Default)]
pub struct OffsetLedger {
    loaded: RwLock<HashSet<Offset>>,
}

impl OffsetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger file. A missing file yields an empty ledger.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let mut loaded = HashSet::new();
        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let offset = token.parse::<Offset>().map_err(|_| {
                BenchError::Parse(format!(
                    "invalid offset '{}' in ledger {}",
                    token,
                    path.display()
                ))
            })?;
            loaded.insert(offset);
        }
        Ok(Self {
            loaded: RwLock::new(loaded),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut offsets: Vec<Offset> = self.loaded.read().iter().copied().collect();
        offsets.sort_unstable();
        let mut text = String::with_capacity(offsets.len() * 8);
        for offset in offsets {
            text.push_str(&offset.to_string());
            text.push(',');
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn contains(&self, offset: Offset) -> bool {
        self.loaded.read().contains(&offset)
    }

    pub fn record<I>(&self, offsets: I)
    where
        I: IntoIterator<Item = Offset>,
    {
        self.loaded.write().extend(offsets);
    }

    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
