//! Benchmark methods

use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data-access method compared by the benchmark.
///
/// The declaration order is the reporting order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Full scan; the baseline every other method is scored against
    Reference,
    /// Random-offset scans that skip rows loaded by earlier runs
    Metadata,
    /// Random-offset scans that drop statistical outliers
    Stats,
    /// One forward scan from a fixed offset
    Contiguous,
    /// Bidirectional scans from the midpoint of every stratum
    Stratified,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Reference,
        Method::Metadata,
        Method::Stats,
        Method::Contiguous,
        Method::Stratified,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::Reference => "reference",
            Method::Metadata => "metadata",
            Method::Stats => "stats",
            Method::Contiguous => "contiguous",
            Method::Stratified => "stratified",
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Method::Reference)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Method {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BenchError::InvalidArgument(format!("unknown method: {}", s)))
    }
}
