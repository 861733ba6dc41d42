//! TPC-H lineitem schema

use crate::schema::{ColumnDef, ColumnKind, TableSchema};

/// `CREATE TABLE` statement for lineitem, as found in a TPC-H `schema.sql`
pub const LINEITEM_DDL: &str = "CREATE TABLE lineitem (
    l_orderkey INTEGER NOT NULL,
    l_partkey INTEGER NOT NULL,
    l_suppkey INTEGER NOT NULL,
    l_linenumber INTEGER NOT NULL,
    l_quantity DECIMAL(15,2) NOT NULL,
    l_extendedprice DECIMAL(15,2) NOT NULL,
    l_discount DECIMAL(15,2) NOT NULL,
    l_tax DECIMAL(15,2) NOT NULL,
    l_returnflag CHAR(1) NOT NULL,
    l_linestatus CHAR(1) NOT NULL,
    l_shipdate DATE NOT NULL,
    l_commitdate DATE NOT NULL,
    l_receiptdate DATE NOT NULL,
    l_shipinstruct CHAR(25) NOT NULL,
    l_shipmode CHAR(10) NOT NULL,
    l_comment VARCHAR(44) NOT NULL
);";

pub fn lineitem_schema() -> TableSchema {
    use ColumnKind::*;
    let columns = [
        ("l_orderkey", Int),
        ("l_partkey", Int),
        ("l_suppkey", Int),
        ("l_linenumber", Int),
        ("l_quantity", Float),
        ("l_extendedprice", Float),
        ("l_discount", Float),
        ("l_tax", Float),
        ("l_returnflag", Text),
        ("l_linestatus", Text),
        ("l_shipdate", Text),
        ("l_commitdate", Text),
        ("l_receiptdate", Text),
        ("l_shipinstruct", Text),
        ("l_shipmode", Text),
        ("l_comment", Text),
    ];
    TableSchema::new(
        "lineitem",
        columns
            .into_iter()
            .map(|(name, kind)| ColumnDef::new(name, kind))
            .collect(),
    )
}

/// Lineitem row count at a TPC-H scale factor
pub fn lineitem_rows(scale_factor: f64) -> usize {
    (6_000_000.0 * scale_factor) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_ddl;

    #[test]
    fn test_ddl_matches_schema() {
        let parsed = parse_ddl(LINEITEM_DDL).unwrap();
        assert_eq!(parsed, vec![lineitem_schema()]);
    }

    #[test]
    fn test_row_counts() {
        assert_eq!(lineitem_rows(1.0), 6_000_000);
        assert_eq!(lineitem_rows(0.01), 60_000);
    }
}
