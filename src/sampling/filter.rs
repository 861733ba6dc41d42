//! Row admission filters applied while scanning
//!
//! A rejected row is read but not admitted into the sample, and it does not
//! count toward any stopping condition.

use super::ledger::OffsetLedger;
use super::stats::ColumnStats;
use crate::source::SampledRow;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum RowFilter {
    /// Admit rows whose numeric fields all lie within `mean ± k·stddev`
    WithinStdDevs { stats: Arc<ColumnStats>, k: f64 },
    /// Admit rows whose offsets are not in the ledger yet
    Unseen(Arc<OffsetLedger>),
    /// Admit rows accepted by every member
    All(Vec<RowFilter>),
}

impl RowFilter {
    pub fn admits(&self, row: &SampledRow) -> bool {
        match self {
            RowFilter::WithinStdDevs { stats, k } => stats.within_std_devs(&row.record, *k),
            RowFilter::Unseen(ledger) => !ledger.contains(row.offset),
            RowFilter::All(filters) => filters.iter().all(|f| f.admits(row)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Record, Value};

    fn row(offset: usize, v: f64) -> SampledRow {
        SampledRow {
            offset,
            record: Record::new(vec![Value::Float(v)]),
        }
    }

    #[test]
    fn test_combined_filters() {
        let records: Vec<Record> = [1.0, 1.0, 1.0, 1.0, 50.0]
            .iter()
            .map(|v| Record::new(vec![Value::Float(*v)]))
            .collect();
        let stats = Arc::new(ColumnStats::from_records(1, &records));
        let ledger = Arc::new(OffsetLedger::new());
        ledger.record([0]);

        let filter = RowFilter::All(vec![
            RowFilter::Unseen(ledger),
            RowFilter::WithinStdDevs { stats, k: 1.0 },
        ]);

        assert!(!filter.admits(&row(0, 1.0)));
        assert!(filter.admits(&row(1, 1.0)));
        assert!(!filter.admits(&row(4, 50.0)));
    }
}
