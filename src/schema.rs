//! Table schemas, records and scalar values

use crate::error::{BenchError, Result};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Scalar kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Int,
    Float,
    Text,
}

impl ColumnKind {
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Text => DataType::Utf8,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Int | ColumnKind::Float)
    }

    /// Map a SQL type name to a column kind.
    ///
    /// Matching is done on the rendered type so that `DECIMAL(15,2)`,
    /// `INTEGER` and `VARCHAR(25)` all resolve without caring about the
    /// parser's internal representation.
    pub fn from_sql_type(sql_type: &str) -> Self {
        let upper = sql_type.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "INT8" | "INT4" => {
                ColumnKind::Int
            }
            "DECIMAL" | "NUMERIC" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "REAL"
            | "FLOAT8" | "FLOAT4" => ColumnKind::Float,
            _ => ColumnKind::Text,
        }
    }
}

/// A single scalar field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a raw field according to the declared column kind.
    ///
    /// An empty field parses as `Null` for every kind.
    pub fn parse(raw: &str, kind: ColumnKind) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        match kind {
            ColumnKind::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| BenchError::Parse(format!("cannot parse '{}' as integer", raw))),
            ColumnKind::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| BenchError::Parse(format!("cannot parse '{}' as float", raw))),
            ColumnKind::Text => Ok(Value::Text(raw.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// An immutable, ordered tuple of field values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Arc<[Value]>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        &self.values[idx]
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Record::new(values)
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Table name plus ordered column list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Find a column index by case-insensitive name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name.to_lowercase(), c.kind.arrow_type(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Parse raw string fields into a record.
    ///
    /// A single trailing empty field is tolerated (TPC-H `.tbl` lines end
    /// with the delimiter).
    pub fn parse_fields<'a, I>(&self, fields: I) -> Result<Record>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut raw: Vec<&str> = fields.into_iter().collect();
        if raw.len() == self.columns.len() + 1 && raw.last().is_some_and(|f| f.is_empty()) {
            raw.pop();
        }
        if raw.len() != self.columns.len() {
            return Err(BenchError::Parse(format!(
                "table {}: expected {} fields, got {}",
                self.name,
                self.columns.len(),
                raw.len()
            )));
        }
        let values = raw
            .iter()
            .zip(self.columns.iter())
            .map(|(field, col)| Value::parse(field, col.kind))
            .collect::<Result<Vec<_>>>()?;
        Ok(Record::new(values))
    }
}

/// Parse `CREATE TABLE` statements into table schemas.
///
/// Statements other than `CREATE TABLE` are rejected.
pub fn parse_ddl(sql: &str) -> Result<Vec<TableSchema>> {
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql)?;

    statements
        .iter()
        .map(|stmt| match stmt {
            Statement::CreateTable(create) => {
                let columns = create
                    .columns
                    .iter()
                    .map(|c| {
                        ColumnDef::new(
                            c.name.value.clone(),
                            ColumnKind::from_sql_type(&c.data_type.to_string()),
                        )
                    })
                    .collect();
                Ok(TableSchema::new(create.name.to_string(), columns))
            }
            other => Err(BenchError::Unsupported(format!(
                "schema description may only contain CREATE TABLE, found: {}",
                other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(
            "t",
            vec![
                ColumnDef::new("id", ColumnKind::Int),
                ColumnDef::new("price", ColumnKind::Float),
                ColumnDef::new("flag", ColumnKind::Text),
            ],
        )
    }

    #[test]
    fn test_parse_fields() {
        let rec = schema().parse_fields(["1", "2.5", "A"]).unwrap();
        assert_eq!(rec[0], Value::Int(1));
        assert_eq!(rec[1], Value::Float(2.5));
        assert_eq!(rec[2], Value::Text("A".into()));
    }

    #[test]
    fn test_parse_fields_trailing_delimiter() {
        let rec = schema().parse_fields(["1", "2.5", "A", ""]).unwrap();
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_parse_fields_wrong_arity() {
        assert!(schema().parse_fields(["1", "2.5"]).is_err());
        assert!(schema().parse_fields(["x", "2.5", "A"]).is_err());
    }

    #[test]
    fn test_parse_ddl() {
        let ddl = "CREATE TABLE LINEITEM (L_ORDERKEY INTEGER NOT NULL, \
                   L_QUANTITY DECIMAL(15,2) NOT NULL, L_RETURNFLAG CHAR(1) NOT NULL); \
                   CREATE TABLE REGION (R_REGIONKEY INTEGER, R_NAME CHAR(25));";
        let tables = parse_ddl(ddl).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "LINEITEM");
        assert_eq!(
            tables[0].column_names(),
            vec!["L_ORDERKEY", "L_QUANTITY", "L_RETURNFLAG"]
        );
        assert_eq!(tables[0].columns[1].kind, ColumnKind::Float);
        assert_eq!(tables[0].columns[2].kind, ColumnKind::Text);
        assert_eq!(tables[1].index_of("r_name"), Some(1));
    }

    #[test]
    fn test_parse_ddl_rejects_other_statements() {
        assert!(parse_ddl("SELECT 1").is_err());
    }
}
