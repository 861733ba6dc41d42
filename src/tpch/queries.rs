//! Aggregate queries over lineitem
//!
//! Every query aggregates `l_quantity` grouped by `l_returnflag`, so all of
//! them report one value per return flag (A, N, R).

pub const AVG: &str = r#"
SELECT
    l_returnflag,
    AVG(l_quantity) AS avg_qty
FROM
    lineitem
GROUP BY
    l_returnflag
ORDER BY
    l_returnflag
"#;

pub const COUNT: &str = r#"
SELECT
    l_returnflag,
    COUNT(*) AS count_order
FROM
    lineitem
GROUP BY
    l_returnflag
ORDER BY
    l_returnflag
"#;

pub const SUM: &str = r#"
SELECT
    l_returnflag,
    SUM(l_quantity) AS sum_qty
FROM
    lineitem
GROUP BY
    l_returnflag
ORDER BY
    l_returnflag
"#;

pub const MIN: &str = r#"
SELECT
    l_returnflag,
    MIN(l_quantity) AS min_qty
FROM
    lineitem
GROUP BY
    l_returnflag
ORDER BY
    l_returnflag
"#;

pub const MAX: &str = r#"
SELECT
    l_returnflag,
    MAX(l_quantity) AS max_qty
FROM
    lineitem
GROUP BY
    l_returnflag
ORDER BY
    l_returnflag
"#;

/// Query names in reporting order
pub const ALL_QUERIES: [&str; 5] = ["avg", "count", "sum", "min", "max"];

/// Get a query by name (case-insensitive)
pub fn get_query(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "avg" => Some(AVG),
        "count" => Some(COUNT),
        "sum" => Some(SUM),
        "min" => Some(MIN),
        "max" => Some(MAX),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_queries_resolve() {
        for name in ALL_QUERIES {
            assert!(get_query(name).is_some(), "{}", name);
        }
        assert_eq!(get_query("AVG"), Some(AVG));
        assert!(get_query("q1").is_none());
    }
}
