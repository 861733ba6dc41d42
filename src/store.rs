//! Table storage and aggregate query execution
//!
//! `TableStore` is the seam between the materializer and whatever engine
//! holds the loaded rows. `MemoryStore` keeps every inserted chunk as an
//! Arrow `RecordBatch` and answers the grouped aggregate queries the
//! benchmark issues:
//!
//! ```text
//! SELECT [group cols,] AGG(col | *) [AS alias], ...
//! FROM table
//! [WHERE col op literal [AND ...]]
//! [GROUP BY cols]
//! ```
//!
//! `AGG` is one of COUNT, SUM, AVG, MIN, MAX. Output rows are always ordered
//! by group key ascending; an `ORDER BY` clause is accepted and ignored.

use crate::error::{BenchError, Result};
use crate::schema::{ColumnKind, Record, TableSchema, Value};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use hashbrown::HashMap;
use ordered_float::OrderedFloat;
use sqlparser::ast::{
    self, BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    SelectItem, SetExpr, Statement, TableFactor, UnaryOperator,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Storage collaborator for loaded samples
pub trait TableStore: Send + Sync {
    /// Create an empty table. Recreating an existing table replaces it.
    fn create_table(&mut self, schema: &TableSchema) -> Result<()>;

    /// Append records to `table`; `columns` names the fields in record order.
    /// Returns the number of rows inserted.
    fn bulk_insert(&mut self, table: &str, columns: &[String], records: &[Record]) -> Result<usize>;

    /// Make all inserted rows of `table` durable
    fn commit(&mut self, _table: &str) -> Result<()> {
        Ok(())
    }

    fn execute_query(&self, sql: &str) -> Result<QueryRows>;
}

/// Tabular query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Values of column `idx` as floats, one per row
    pub fn numeric_column(&self, idx: usize) -> Result<Vec<f64>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, values)| {
                values.get(idx).and_then(Value::as_f64).ok_or_else(|| {
                    BenchError::Store(format!(
                        "column {} of row {} is not numeric",
                        self.columns.get(idx).map(String::as_str).unwrap_or("?"),
                        row
                    ))
                })
            })
            .collect()
    }

    /// Values of the last column, i.e. the aggregate of a single-aggregate query
    pub fn aggregate_values(&self) -> Result<Vec<f64>> {
        match self.columns.len() {
            0 => Err(BenchError::Store("query returned no columns".into())),
            n => self.numeric_column(n - 1),
        }
    }

    /// Convert to a record batch. Each column's type is the widest of its values.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());
        for (idx, name) in self.columns.iter().enumerate() {
            let cells: Vec<&Value> = self.rows.iter().filter_map(|r| r.get(idx)).collect();
            let kind = if cells.iter().any(|v| matches!(v, Value::Text(_))) {
                ColumnKind::Text
            } else if cells.iter().any(|v| matches!(v, Value::Float(_))) {
                ColumnKind::Float
            } else {
                ColumnKind::Int
            };
            arrays.push(build_array(kind, cells.into_iter())?);
            fields.push(Field::new(name, kind.arrow_type(), true));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

#[derive(Debug)]
struct StoredTable {
    schema: TableSchema,
    arrow_schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl StoredTable {
    fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// In-memory Arrow-backed table store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, StoredTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.num_rows())
    }

    /// The batches inserted into `table`, one per `bulk_insert` call
    pub fn batches(&self, table: &str) -> Result<&[RecordBatch]> {
        Ok(&self.table(table)?.batches)
    }

    fn table(&self, name: &str) -> Result<&StoredTable> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| BenchError::TableNotFound(name.to_string()))
    }
}

impl TableStore for MemoryStore {
    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        let stored = StoredTable {
            schema: schema.clone(),
            arrow_schema: schema.arrow_schema(),
            batches: Vec::new(),
        };
        self.tables.insert(schema.name.to_lowercase(), stored);
        Ok(())
    }

    fn bulk_insert(&mut self, table: &str, columns: &[String], records: &[Record]) -> Result<usize> {
        let stored = self
            .tables
            .get_mut(&table.to_lowercase())
            .ok_or_else(|| BenchError::TableNotFound(table.to_string()))?;

        if columns.len() != stored.schema.num_columns() {
            return Err(BenchError::shape(
                format!("insert into {}", table),
                stored.schema.num_columns(),
                columns.len(),
            ));
        }
        // Position of each table column within the incoming records
        let mut positions = Vec::with_capacity(columns.len());
        for def in &stored.schema.columns {
            let pos = columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&def.name))
                .ok_or_else(|| BenchError::ColumnNotFound(def.name.clone()))?;
            positions.push(pos);
        }
        if let Some(bad) = records.iter().find(|r| r.len() != columns.len()) {
            return Err(BenchError::shape(
                format!("insert into {}", table),
                columns.len(),
                bad.len(),
            ));
        }

        let arrays = stored
            .schema
            .columns
            .iter()
            .zip(positions)
            .map(|(def, pos)| build_array(def.kind, records.iter().map(|r| &r[pos])))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| BenchError::Store(format!("insert into {}: {}", table, e)))?;

        let batch = RecordBatch::try_new(stored.arrow_schema.clone(), arrays)?;
        let rows = batch.num_rows();
        stored.batches.push(batch);
        Ok(rows)
    }

    fn execute_query(&self, sql: &str) -> Result<QueryRows> {
        let query = AggregateQuery::parse(sql)?;
        let table = self.table(&query.table)?;
        let result = query.execute(table)?;
        debug!(
            "Query on {} returned {} group(s) from {} row(s)",
            query.table,
            result.num_rows(),
            table.num_rows()
        );
        Ok(result)
    }
}

fn build_array<'a>(kind: ColumnKind, values: impl Iterator<Item = &'a Value>) -> Result<ArrayRef> {
    let array: ArrayRef = match kind {
        ColumnKind::Int => Arc::new(
            values
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i)),
                    other => Err(BenchError::Store(format!("expected integer, got {}", other))),
                })
                .collect::<Result<Int64Array>>()?,
        ),
        ColumnKind::Float => Arc::new(
            values
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    Value::Float(f) => Ok(Some(*f)),
                    other => Err(BenchError::Store(format!("expected float, got {}", other))),
                })
                .collect::<Result<Float64Array>>()?,
        ),
        ColumnKind::Text => Arc::new(
            values
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
    };
    Ok(array)
}

/// Read one cell of an array as a scalar value
fn cell(array: &ArrayRef, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
        return Value::Int(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
        return Value::Float(a.value(row));
    }
    if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
        return Value::Text(a.value(row).to_string());
    }
    Value::Null
}

/// Hashable, totally ordered form of a scalar value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum GroupValue {
    Null,
    Int64(i64),
    Float64(OrderedFloat<f64>),
    String(String),
}

impl From<Value> for GroupValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => GroupValue::Null,
            Value::Int(i) => GroupValue::Int64(i),
            Value::Float(f) => GroupValue::Float64(OrderedFloat(f)),
            Value::Text(s) => GroupValue::String(s),
        }
    }
}

impl From<GroupValue> for Value {
    fn from(v: GroupValue) -> Self {
        match v {
            GroupValue::Null => Value::Null,
            GroupValue::Int64(i) => Value::Int(i),
            GroupValue::Float64(f) => Value::Float(f.into_inner()),
            GroupValue::String(s) => Value::Text(s),
        }
    }
}

type GroupKey = Vec<GroupValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        write!(f, "{}", name)
    }
}

/// Accumulator state for one aggregate of one group
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum { int: i64, float: f64, any_float: bool, seen: bool },
    Avg { sum: f64, count: i64 },
    Min(Option<GroupValue>),
    Max(Option<GroupValue>),
}

impl Accumulator {
    fn new(func: AggregateFunction) -> Self {
        match func {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum {
                int: 0,
                float: 0.0,
                any_float: false,
                seen: false,
            },
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
        }
    }

    /// `None` is `COUNT(*)`'s row marker; `Some(Null)` is a null input
    fn update(&mut self, input: Option<Value>) {
        let value = match input {
            None => {
                if let Accumulator::Count(n) = self {
                    *n += 1;
                }
                return;
            }
            Some(Value::Null) => return,
            Some(v) => v,
        };
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum {
                int,
                float,
                any_float,
                seen,
            } => {
                *seen = true;
                match value {
                    Value::Int(i) => {
                        *int = int.saturating_add(i);
                        *float += i as f64;
                    }
                    Value::Float(f) => {
                        *any_float = true;
                        *float += f;
                    }
                    _ => {}
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(v) = value.as_f64() {
                    *sum += v;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => {
                let v = GroupValue::from(value);
                if current.as_ref().map_or(true, |c| v < *c) {
                    *current = Some(v);
                }
            }
            Accumulator::Max(current) => {
                let v = GroupValue::from(value);
                if current.as_ref().map_or(true, |c| v > *c) {
                    *current = Some(v);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Int(n),
            Accumulator::Sum { seen: false, .. } => Value::Null,
            Accumulator::Sum {
                float,
                any_float: true,
                ..
            } => Value::Float(float),
            Accumulator::Sum { int, .. } => Value::Int(int),
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { sum, count } => Value::Float(sum / count as f64),
            Accumulator::Min(v) | Accumulator::Max(v) => v.map(Value::from).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Comparison {
    fn from_operator(op: &BinaryOperator) -> Option<Self> {
        match op {
            BinaryOperator::Eq => Some(Comparison::Eq),
            BinaryOperator::NotEq => Some(Comparison::NotEq),
            BinaryOperator::Lt => Some(Comparison::Lt),
            BinaryOperator::LtEq => Some(Comparison::LtEq),
            BinaryOperator::Gt => Some(Comparison::Gt),
            BinaryOperator::GtEq => Some(Comparison::GtEq),
            _ => None,
        }
    }

    /// SQL semantics: any comparison involving NULL or mismatched kinds is false
    fn holds(&self, left: &Value, right: &Value) -> bool {
        let ordering = match (left, right) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(o) => o,
                    None => return false,
                },
                _ => return false,
            },
        };
        match self {
            Comparison::Eq => ordering.is_eq(),
            Comparison::NotEq => ordering.is_ne(),
            Comparison::Lt => ordering.is_lt(),
            Comparison::LtEq => ordering.is_le(),
            Comparison::Gt => ordering.is_gt(),
            Comparison::GtEq => ordering.is_ge(),
        }
    }
}

#[derive(Debug, Clone)]
struct Predicate {
    column: String,
    comparison: Comparison,
    literal: Value,
}

#[derive(Debug, Clone)]
enum OutputColumn {
    Group(String),
    Aggregate {
        func: AggregateFunction,
        /// `None` for `*`
        input: Option<String>,
    },
}

/// Parsed form of a supported aggregate query
#[derive(Debug, Clone)]
struct AggregateQuery {
    table: String,
    outputs: Vec<(String, OutputColumn)>,
    predicates: Vec<Predicate>,
    group_by: Vec<String>,
}

impl AggregateQuery {
    fn parse(sql: &str) -> Result<Self> {
        let dialect = GenericDialect {};
        let mut statements = Parser::parse_sql(&dialect, sql)?;
        if statements.len() != 1 {
            return Err(BenchError::Unsupported(format!(
                "expected a single statement, found {}",
                statements.len()
            )));
        }
        let query = match statements.remove(0) {
            Statement::Query(q) => q,
            other => {
                return Err(BenchError::Unsupported(format!(
                    "only SELECT is supported, found: {}",
                    other
                )))
            }
        };
        if query.limit.is_some() || query.offset.is_some() || query.with.is_some() {
            return Err(BenchError::Unsupported(
                "LIMIT, OFFSET and WITH are not supported".into(),
            ));
        }
        let body = *query.body;
        let select = match body {
            SetExpr::Select(select) => select,
            other => {
                return Err(BenchError::Unsupported(format!(
                    "only plain SELECT is supported, found: {}",
                    other
                )))
            }
        };
        if select.distinct.is_some() || select.having.is_some() {
            return Err(BenchError::Unsupported(
                "DISTINCT and HAVING are not supported".into(),
            ));
        }

        let table = match select.from.as_slice() {
            [twj] if twj.joins.is_empty() => match &twj.relation {
                TableFactor::Table { name, .. } => object_name(name),
                other => {
                    return Err(BenchError::Unsupported(format!(
                        "unsupported table reference: {}",
                        other
                    )))
                }
            },
            _ => {
                return Err(BenchError::Unsupported(
                    "exactly one table without joins is required".into(),
                ))
            }
        };

        let mut outputs = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, None),
                SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
                other => {
                    return Err(BenchError::Unsupported(format!(
                        "unsupported select item: {}",
                        other
                    )))
                }
            };
            let name = alias.unwrap_or_else(|| expr.to_string());
            outputs.push((name, output_column(expr)?));
        }

        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, modifiers) if modifiers.is_empty() => exprs
                .iter()
                .map(|e| {
                    column_name(e).ok_or_else(|| {
                        BenchError::Unsupported(format!("GROUP BY expression: {}", e))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(BenchError::Unsupported(format!(
                    "unsupported GROUP BY: {}",
                    other
                )))
            }
        };

        for (_, out) in &outputs {
            if let OutputColumn::Group(col) = out {
                if !group_by.iter().any(|g| g.eq_ignore_ascii_case(col)) {
                    return Err(BenchError::Unsupported(format!(
                        "column {} must appear in GROUP BY",
                        col
                    )));
                }
            }
        }

        let mut predicates = Vec::new();
        if let Some(selection) = &select.selection {
            collect_predicates(selection, &mut predicates)?;
        }

        Ok(Self {
            table,
            outputs,
            predicates,
            group_by,
        })
    }

    fn execute(&self, table: &StoredTable) -> Result<QueryRows> {
        let resolve = |name: &str| {
            table
                .schema
                .index_of(name)
                .ok_or_else(|| BenchError::ColumnNotFound(name.to_string()))
        };

        let group_idx = self
            .group_by
            .iter()
            .map(|c| resolve(c))
            .collect::<Result<Vec<_>>>()?;
        let predicate_idx = self
            .predicates
            .iter()
            .map(|p| resolve(&p.column))
            .collect::<Result<Vec<_>>>()?;

        let mut aggregates = Vec::new();
        let mut layout = Vec::with_capacity(self.outputs.len());
        for (_, out) in &self.outputs {
            match out {
                OutputColumn::Group(col) => {
                    let pos = self
                        .group_by
                        .iter()
                        .position(|g| g.eq_ignore_ascii_case(col))
                        .ok_or_else(|| BenchError::ColumnNotFound(col.clone()))?;
                    layout.push(Slot::Key(pos));
                }
                OutputColumn::Aggregate { func, input } => {
                    let idx = input.as_deref().map(|c| resolve(c)).transpose()?;
                    layout.push(Slot::Aggregate(aggregates.len()));
                    aggregates.push((*func, idx));
                }
            }
        }

        let mut groups: HashMap<GroupKey, Vec<Accumulator>> = HashMap::new();
        for batch in &table.batches {
            let arrays = batch.columns();
            for row in 0..batch.num_rows() {
                let passes = self
                    .predicates
                    .iter()
                    .zip(&predicate_idx)
                    .all(|(p, &idx)| p.comparison.holds(&cell(&arrays[idx], row), &p.literal));
                if !passes {
                    continue;
                }
                let key: GroupKey = group_idx
                    .iter()
                    .map(|&idx| GroupValue::from(cell(&arrays[idx], row)))
                    .collect();
                let accs = groups.entry(key).or_insert_with(|| {
                    aggregates
                        .iter()
                        .map(|(func, _)| Accumulator::new(*func))
                        .collect()
                });
                for (acc, (_, input)) in accs.iter_mut().zip(&aggregates) {
                    acc.update(input.map(|idx| cell(&arrays[idx], row)));
                }
            }
        }

        // A scalar aggregate over zero rows still yields one row
        if groups.is_empty() && self.group_by.is_empty() {
            groups.insert(
                Vec::new(),
                aggregates
                    .iter()
                    .map(|(func, _)| Accumulator::new(*func))
                    .collect(),
            );
        }

        let mut ordered: Vec<(GroupKey, Vec<Accumulator>)> = groups.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        let rows = ordered
            .into_iter()
            .map(|(key, accs)| {
                let finished: Vec<Value> = accs.into_iter().map(Accumulator::finish).collect();
                layout
                    .iter()
                    .map(|slot| match slot {
                        Slot::Key(pos) => Value::from(key[*pos].clone()),
                        Slot::Aggregate(pos) => finished[*pos].clone(),
                    })
                    .collect()
            })
            .collect();

        Ok(QueryRows {
            columns: self.outputs.iter().map(|(name, _)| name.clone()).collect(),
            rows,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Key(usize),
    Aggregate(usize),
}

fn object_name(name: &ast::ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn output_column(expr: &Expr) -> Result<OutputColumn> {
    if let Some(col) = column_name(expr) {
        return Ok(OutputColumn::Group(col));
    }
    let func = match expr {
        Expr::Function(func) => func,
        other => {
            return Err(BenchError::Unsupported(format!(
                "unsupported select expression: {}",
                other
            )))
        }
    };
    let name = object_name(&func.name);
    let agg = AggregateFunction::from_name(&name)
        .ok_or_else(|| BenchError::Unsupported(format!("function {}", name)))?;
    if func.over.is_some() || func.filter.is_some() {
        return Err(BenchError::Unsupported(format!(
            "window or filtered aggregate: {}",
            expr
        )));
    }
    let list = match &func.args {
        FunctionArguments::List(list) if list.duplicate_treatment.is_none() => list,
        _ => {
            return Err(BenchError::Unsupported(format!(
                "unsupported arguments: {}",
                expr
            )))
        }
    };
    let input = match list.args.as_slice() {
        [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] if agg == AggregateFunction::Count => {
            None
        }
        [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => Some(column_name(arg).ok_or_else(
            || BenchError::Unsupported(format!("{} argument must be a column: {}", agg, arg)),
        )?),
        _ => {
            return Err(BenchError::Unsupported(format!(
                "{} takes exactly one column argument",
                agg
            )))
        }
    };
    Ok(OutputColumn::Aggregate { func: agg, input })
}

fn collect_predicates(expr: &Expr, out: &mut Vec<Predicate>) -> Result<()> {
    match expr {
        Expr::Nested(inner) => collect_predicates(inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_predicates(left, out)?;
            collect_predicates(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let comparison = Comparison::from_operator(op)
                .ok_or_else(|| BenchError::Unsupported(format!("operator {}", op)))?;
            let column = column_name(left)
                .ok_or_else(|| BenchError::Unsupported(format!("predicate {}", expr)))?;
            let literal = literal(right)?;
            out.push(Predicate {
                column,
                comparison,
                literal,
            });
            Ok(())
        }
        other => Err(BenchError::Unsupported(format!("predicate {}", other))),
    }
}

fn literal(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Value(ast::Value::Number(n, _)) => Ok(n
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .map_err(|_| BenchError::Parse(format!("invalid number literal {}", n)))?),
        Expr::Value(ast::Value::SingleQuotedString(s)) => Ok(Value::Text(s.clone())),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(BenchError::Unsupported(format!("negated literal {}", other))),
        },
        Expr::Nested(inner) => literal(inner),
        other => Err(BenchError::Unsupported(format!("literal {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use arrow::datatypes::DataType;

    fn lineitem() -> TableSchema {
        TableSchema::new(
            "lineitem",
            vec![
                ColumnDef::new("l_quantity", ColumnKind::Float),
                ColumnDef::new("l_returnflag", ColumnKind::Text),
                ColumnDef::new("l_linenumber", ColumnKind::Int),
            ],
        )
    }

    fn row(qty: f64, flag: &str, line: i64) -> Record {
        Record::new(vec![
            Value::Float(qty),
            Value::Text(flag.into()),
            Value::Int(line),
        ])
    }

    fn store() -> MemoryStore {
        let schema = lineitem();
        let mut store = MemoryStore::new();
        store.create_table(&schema).unwrap();
        let cols = schema.column_names();
        store
            .bulk_insert(
                "lineitem",
                &cols,
                &[row(10.0, "R", 1), row(20.0, "A", 2), row(30.0, "N", 3)],
            )
            .unwrap();
        store
            .bulk_insert("LINEITEM", &cols, &[row(40.0, "A", 4), row(50.0, "R", 5)])
            .unwrap();
        store
    }

    #[test]
    fn test_bulk_insert_appends_batches() {
        let store = store();
        assert_eq!(store.num_rows("lineitem").unwrap(), 5);
        assert_eq!(store.batches("lineitem").unwrap().len(), 2);
    }

    #[test]
    fn test_bulk_insert_reordered_columns() {
        let mut store = MemoryStore::new();
        store.create_table(&lineitem()).unwrap();
        let cols = vec![
            "l_returnflag".to_string(),
            "l_linenumber".to_string(),
            "l_quantity".to_string(),
        ];
        let rec = Record::new(vec![Value::Text("A".into()), Value::Int(1), Value::Float(5.0)]);
        store.bulk_insert("lineitem", &cols, &[rec]).unwrap();
        let rows = store
            .execute_query("SELECT SUM(l_quantity) FROM lineitem")
            .unwrap();
        assert_eq!(rows.rows, vec![vec![Value::Float(5.0)]]);
    }

    #[test]
    fn test_bulk_insert_errors() {
        let mut store = MemoryStore::new();
        let cols = lineitem().column_names();
        assert!(matches!(
            store.bulk_insert("lineitem", &cols, &[]),
            Err(BenchError::TableNotFound(_))
        ));
        store.create_table(&lineitem()).unwrap();
        let short = Record::new(vec![Value::Float(1.0)]);
        assert!(matches!(
            store.bulk_insert("lineitem", &cols, &[short]),
            Err(BenchError::Shape { .. })
        ));
        let wrong = Record::new(vec![
            Value::Text("x".into()),
            Value::Text("A".into()),
            Value::Int(1),
        ]);
        assert!(matches!(
            store.bulk_insert("lineitem", &cols, &[wrong]),
            Err(BenchError::Store(_))
        ));
    }

    #[test]
    fn test_grouped_avg_ordered_by_key() {
        let rows = store()
            .execute_query(
                "SELECT l_returnflag, AVG(l_quantity) AS avg_qty FROM lineitem \
                 GROUP BY l_returnflag ORDER BY l_returnflag DESC",
            )
            .unwrap();
        assert_eq!(rows.columns, vec!["l_returnflag", "avg_qty"]);
        assert_eq!(
            rows.rows,
            vec![
                vec![Value::Text("A".into()), Value::Float(30.0)],
                vec![Value::Text("N".into()), Value::Float(30.0)],
                vec![Value::Text("R".into()), Value::Float(30.0)],
            ]
        );
        assert_eq!(rows.aggregate_values().unwrap(), vec![30.0, 30.0, 30.0]);
    }

    #[test]
    fn test_aggregate_functions() {
        let rows = store()
            .execute_query(
                "SELECT COUNT(*), SUM(l_linenumber), MIN(l_quantity), MAX(l_returnflag) \
                 FROM lineitem",
            )
            .unwrap();
        assert_eq!(
            rows.rows,
            vec![vec![
                Value::Int(5),
                Value::Int(15),
                Value::Float(10.0),
                Value::Text("R".into()),
            ]]
        );
    }

    #[test]
    fn test_where_predicates() {
        let rows = store()
            .execute_query(
                "SELECT l_returnflag, COUNT(*) FROM lineitem \
                 WHERE l_quantity >= 20 AND l_returnflag <> 'N' GROUP BY l_returnflag",
            )
            .unwrap();
        assert_eq!(
            rows.rows,
            vec![
                vec![Value::Text("A".into()), Value::Int(2)],
                vec![Value::Text("R".into()), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn test_scalar_aggregate_on_empty_table() {
        let mut store = MemoryStore::new();
        store.create_table(&lineitem()).unwrap();
        let rows = store
            .execute_query("SELECT COUNT(*), AVG(l_quantity) FROM lineitem")
            .unwrap();
        assert_eq!(rows.rows, vec![vec![Value::Int(0), Value::Null]]);
        let grouped = store
            .execute_query("SELECT l_returnflag, COUNT(*) FROM lineitem GROUP BY l_returnflag")
            .unwrap();
        assert_eq!(grouped.num_rows(), 0);
    }

    #[test]
    fn test_unsupported_queries() {
        let store = store();
        for sql in [
            "DELETE FROM lineitem",
            "SELECT l_returnflag FROM lineitem",
            "SELECT MEDIAN(l_quantity) FROM lineitem",
            "SELECT SUM(l_quantity) FROM lineitem LIMIT 1",
            "SELECT SUM(l_quantity + 1) FROM lineitem",
        ] {
            assert!(
                matches!(store.execute_query(sql), Err(BenchError::Unsupported(_))),
                "{}",
                sql
            );
        }
        assert!(matches!(
            store.execute_query("SELECT SUM(nope) FROM lineitem"),
            Err(BenchError::ColumnNotFound(_))
        ));
        assert!(matches!(
            store.execute_query("SELECT COUNT(*) FROM orders"),
            Err(BenchError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_to_record_batch() {
        let rows = store()
            .execute_query("SELECT l_returnflag, COUNT(*) AS n FROM lineitem GROUP BY l_returnflag")
            .unwrap();
        let batch = rows.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
    }
}
