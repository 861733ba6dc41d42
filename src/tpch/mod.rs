//! TPC-H lineitem: schema, data generator and aggregate queries

mod generator;
mod queries;
mod schema;

pub use generator::*;
pub use queries::*;
pub use schema::*;

use crate::bench::BenchQuery;

/// The named query set, ready for a benchmark runner
pub fn bench_queries(names: &[&str]) -> crate::error::Result<Vec<BenchQuery>> {
    names
        .iter()
        .map(|name| {
            get_query(name)
                .map(|sql| BenchQuery::new(name.to_lowercase(), sql))
                .ok_or_else(|| {
                    crate::error::BenchError::InvalidArgument(format!("unknown query: {}", name))
                })
        })
        .collect()
}
