//! In-memory Backend Implementation
//!
//! Evaluates [`QueryBuilder`] statements directly against rows held in
//! process. Supports the subset of SQL the builder can express: inner and
//! left joins, comparison / LIKE / IN / NULL predicates, OR and AND groups,
//! ordering, DISTINCT, LIMIT / OFFSET and COUNT. Raw SQL fragments are not
//! supported.
//!
//! Every statement is appended to a query log so callers can assert on how
//! many statements of which kind were issued.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::core::{Database, Executor, Row, Transaction};
use crate::error::{QueryError, QueryResult};
use crate::query::{Condition, QueryBuilder, QueryOperator, QueryType, TableName, WhereCondition};

const CLIENT_NAME: &str = "memory";

/// Kind of statement recorded in the query log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// One executed statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub kind: QueryKind,
    pub table: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    serial: Option<String>,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
}

type QueryLog = Arc<Mutex<Vec<QueryLogEntry>>>;

/// Database held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
    log: QueryLog,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Statements mutate state only after they fully evaluate, so poisoning is ignored
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. `serial` names a column filled with the next integer
    /// when an inserted row does not supply it.
    pub fn define_table(&self, name: &str, serial: Option<&str>) {
        let mut state = lock(&self.state);
        let table = state.tables.entry(name.to_string()).or_default();
        table.serial = serial.map(str::to_string);
    }

    /// Append rows to a table, creating it when needed
    pub fn seed(&self, name: &str, rows: Vec<Value>) {
        let mut state = lock(&self.state);
        let table = state.tables.entry(name.to_string()).or_default();
        table.rows.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    /// Snapshot of every row of a table
    pub fn rows(&self, name: &str) -> Vec<Row> {
        lock(&self.state)
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Every statement executed so far, in order
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        lock(&self.log).clone()
    }

    /// Number of logged statements of `kind` against `table`
    pub fn count_queries(&self, kind: QueryKind, table: &str) -> usize {
        lock(&self.log)
            .iter()
            .filter(|entry| entry.kind == kind && entry.table == table)
            .count()
    }

    /// Number of logged statements of `kind` against any table
    pub fn count_kind(&self, kind: QueryKind) -> usize {
        lock(&self.log).iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }
}

fn record(log: &QueryLog, kind: QueryKind, query: &QueryBuilder) {
    let table = query
        .from_table()
        .or(query.target_table())
        .map(|t| t.name.clone())
        .unwrap_or_default();
    let sql = query.to_sql();
    debug!("memory {:?} on '{}': {}", kind, table, sql);
    lock(log).push(QueryLogEntry { kind, table, sql });
}

#[async_trait]
impl Executor for MemoryDatabase {
    fn client_name(&self) -> &str {
        CLIENT_NAME
    }

    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        record(&self.log, QueryKind::Select, query);
        lock(&self.state).select(query)
    }

    async fn fetch_count(&self, query: &QueryBuilder, _column: &str) -> QueryResult<i64> {
        record(&self.log, QueryKind::Count, query);
        lock(&self.state).count(query)
    }

    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        record(&self.log, QueryKind::Insert, query);
        lock(&self.state).insert(query, returning)
    }

    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64> {
        match query.query_type() {
            QueryType::Update => record(&self.log, QueryKind::Update, query),
            _ => record(&self.log, QueryKind::Delete, query),
        }
        lock(&self.state).execute(query)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn as_executor(&self) -> &dyn Executor {
        self
    }

    async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
        let snapshot = lock(&self.state).clone();
        Ok(Box::new(MemoryTransaction {
            working: Mutex::new(snapshot),
            target: Arc::clone(&self.state),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Transaction over a private copy of the data, published on commit.
/// Writes made to the database by others while it is open are overwritten
/// by the commit.
pub struct MemoryTransaction {
    working: Mutex<MemoryState>,
    target: Arc<Mutex<MemoryState>>,
    log: QueryLog,
}

#[async_trait]
impl Executor for MemoryTransaction {
    fn client_name(&self) -> &str {
        CLIENT_NAME
    }

    async fn fetch_all(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        record(&self.log, QueryKind::Select, query);
        lock(&self.working).select(query)
    }

    async fn fetch_count(&self, query: &QueryBuilder, _column: &str) -> QueryResult<i64> {
        record(&self.log, QueryKind::Count, query);
        lock(&self.working).count(query)
    }

    async fn insert(&self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        record(&self.log, QueryKind::Insert, query);
        lock(&self.working).insert(query, returning)
    }

    async fn execute(&self, query: &QueryBuilder) -> QueryResult<u64> {
        match query.query_type() {
            QueryType::Update => record(&self.log, QueryKind::Update, query),
            _ => record(&self.log, QueryKind::Delete, query),
        }
        lock(&self.working).execute(query)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn as_executor(&self) -> &dyn Executor {
        self
    }

    async fn commit(self: Box<Self>) -> QueryResult<()> {
        let this = *self;
        let working = this
            .working
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *lock(&this.target) = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> QueryResult<()> {
        debug!("memory transaction rolled back");
        Ok(())
    }
}

/// Rows of every table visible to one result candidate
#[derive(Debug, Clone, Default)]
struct Scope {
    entries: Vec<(String, Option<Row>)>,
}

impl Scope {
    fn with(&self, reference: &str, row: Option<Row>) -> Scope {
        let mut entries = self.entries.clone();
        entries.push((reference.to_string(), row));
        Scope { entries }
    }

    fn resolve(&self, column: &str) -> Value {
        if let Some((table, name)) = column.split_once('.') {
            return self
                .entries
                .iter()
                .find(|(reference, _)| reference == table)
                .and_then(|(_, row)| row.as_ref())
                .and_then(|row| row.get(name))
                .cloned()
                .unwrap_or(Value::Null);
        }
        self.entries
            .iter()
            .filter_map(|(_, row)| row.as_ref())
            .find_map(|row| row.get(column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn unqualified(column: &str) -> &str {
    column.rsplit_once('.').map_or(column, |(_, name)| name)
}

impl MemoryState {
    fn table_rows(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    fn scopes(&self, query: &QueryBuilder) -> QueryResult<Vec<Scope>> {
        let from = query
            .from_table()
            .ok_or_else(|| QueryError::Query("SELECT without a FROM table".to_string()))?;

        let mut scopes: Vec<Scope> = self
            .table_rows(&from.name)
            .iter()
            .map(|row| Scope::default().with(from.reference(), Some(row.clone())))
            .collect();

        for join in query.joins() {
            let table = TableName::parse(&join.table);
            let rows = self.table_rows(&table.name);
            let mut joined = Vec::new();

            for scope in &scopes {
                let mut matched = false;
                for row in rows {
                    let candidate = scope.with(table.reference(), Some(row.clone()));
                    let on = join.on_conditions.iter().all(|on| {
                        compare_operator(
                            on.operator,
                            &candidate.resolve(&on.left),
                            &candidate.resolve(&on.right),
                        )
                    });
                    if on {
                        matched = true;
                        joined.push(candidate);
                    }
                }
                if !matched && join.join_type == crate::query::JoinType::Left {
                    joined.push(scope.with(table.reference(), None));
                }
            }

            scopes = joined;
        }

        let mut filtered = Vec::with_capacity(scopes.len());
        for scope in scopes {
            if eval_all(query.conditions(), &scope)? {
                filtered.push(scope);
            }
        }
        Ok(filtered)
    }

    fn select(&self, query: &QueryBuilder) -> QueryResult<Vec<Row>> {
        let scopes = self.scopes(query)?;

        let mut projected: Vec<(Vec<Value>, Row)> = Vec::with_capacity(scopes.len());
        for scope in &scopes {
            let mut row = Row::new();
            if query.select_fields().is_empty() {
                for (_, entry) in &scope.entries {
                    if let Some(entry) = entry {
                        for (key, value) in entry {
                            row.entry(key.clone()).or_insert_with(|| value.clone());
                        }
                    }
                }
            }
            for field in query.select_fields() {
                if field.raw {
                    return Err(QueryError::Unsupported(format!(
                        "raw select expression '{}'",
                        field.expression
                    )));
                }
                row.insert(field.output_name().to_string(), scope.resolve(&field.expression));
            }
            let sort_keys = query
                .ordering()
                .iter()
                .map(|(column, _)| scope.resolve(column))
                .collect();
            projected.push((sort_keys, row));
        }

        projected.sort_by(|(a, _), (b, _)| {
            for (i, (_, direction)) in query.ordering().iter().enumerate() {
                let ordering = compare_values(&a[i], &b[i]);
                let ordering = match direction {
                    crate::query::OrderDirection::Asc => ordering,
                    crate::query::OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let mut rows: Vec<Row> = Vec::with_capacity(projected.len());
        for (_, row) in projected {
            if query.is_distinct() && rows.contains(&row) {
                continue;
            }
            rows.push(row);
        }

        let offset = query.offset_value().unwrap_or(0).max(0) as usize;
        let rows = rows.into_iter().skip(offset);
        Ok(match query.limit_count() {
            Some(limit) => rows.take(limit.max(0) as usize).collect(),
            None => rows.collect(),
        })
    }

    fn count(&self, query: &QueryBuilder) -> QueryResult<i64> {
        Ok(self.scopes(query)?.len() as i64)
    }

    fn insert(&mut self, query: &QueryBuilder, returning: &[String]) -> QueryResult<Option<Row>> {
        let target = query
            .target_table()
            .ok_or_else(|| QueryError::Query("INSERT without a table".to_string()))?;
        let table = self.tables.entry(target.name.clone()).or_default();

        let mut row = Row::new();
        for clause in query.set_clauses() {
            row.insert(unqualified(&clause.column).to_string(), clause.value.clone());
        }

        if let Some(serial) = &table.serial {
            if row.get(serial).map_or(true, Value::is_null) {
                let next = table
                    .rows
                    .iter()
                    .filter_map(|r| r.get(serial).and_then(as_number))
                    .fold(0.0_f64, f64::max) as i64
                    + 1;
                row.insert(serial.clone(), Value::from(next));
            }
        }

        table.rows.push(row.clone());

        if returning.is_empty() {
            return Ok(None);
        }
        let mut out = Row::new();
        for column in returning {
            let name = unqualified(column);
            out.insert(name.to_string(), row.get(name).cloned().unwrap_or(Value::Null));
        }
        Ok(Some(out))
    }

    fn execute(&mut self, query: &QueryBuilder) -> QueryResult<u64> {
        let target = query
            .target_table()
            .ok_or_else(|| QueryError::Query("statement without a table".to_string()))?
            .clone();
        let Some(table) = self.tables.get_mut(&target.name) else {
            return Ok(0);
        };

        let mut affected = 0;
        match query.query_type() {
            QueryType::Update => {
                for row in table.rows.iter_mut() {
                    let scope = Scope::default().with(target.reference(), Some(row.clone()));
                    if eval_all(query.conditions(), &scope)? {
                        for clause in query.set_clauses() {
                            row.insert(unqualified(&clause.column).to_string(), clause.value.clone());
                        }
                        affected += 1;
                    }
                }
            }
            QueryType::Delete => {
                let mut doomed = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    let scope = Scope::default().with(target.reference(), Some(row.clone()));
                    doomed.push(eval_all(query.conditions(), &scope)?);
                }
                let before = table.rows.len();
                let mut flags = doomed.into_iter();
                table.rows.retain(|_| !flags.next().unwrap_or(false));
                affected = (before - table.rows.len()) as u64;
            }
            other => {
                return Err(QueryError::Query(format!(
                    "Expected an UPDATE or DELETE query, got {:?}",
                    other
                )))
            }
        }
        Ok(affected)
    }
}

fn eval_all(conditions: &[Condition], scope: &Scope) -> QueryResult<bool> {
    for condition in conditions {
        if !eval(condition, scope)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval(condition: &Condition, scope: &Scope) -> QueryResult<bool> {
    match condition {
        Condition::Raw(raw) => Err(QueryError::Unsupported(format!("raw condition '{}'", raw))),
        Condition::All(group) => eval_all(group, scope),
        Condition::Any(group) => {
            for condition in group {
                if eval(condition, scope)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Compare(compare) => eval_compare(compare, scope),
    }
}

fn eval_compare(condition: &WhereCondition, scope: &Scope) -> QueryResult<bool> {
    let left = scope.resolve(&condition.column);
    let value = condition.value.as_ref().unwrap_or(&Value::Null);

    let result = match condition.operator {
        QueryOperator::IsNull => left.is_null(),
        QueryOperator::IsNotNull => !left.is_null(),
        QueryOperator::In => condition.values.iter().any(|v| loosely_equal(&left, v)),
        QueryOperator::NotIn => {
            !left.is_null() && !condition.values.iter().any(|v| loosely_equal(&left, v))
        }
        QueryOperator::Equal if value.is_null() => left.is_null(),
        QueryOperator::NotEqual if value.is_null() => !left.is_null(),
        QueryOperator::Like | QueryOperator::ILike | QueryOperator::NotLike => {
            if left.is_null() {
                false
            } else {
                let pattern = like_regex(&as_text(value))?;
                let matched = pattern.is_match(&as_text(&left));
                if condition.operator == QueryOperator::NotLike {
                    !matched
                } else {
                    matched
                }
            }
        }
        operator => compare_operator(operator, &left, value),
    };
    Ok(result)
}

fn compare_operator(operator: QueryOperator, left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match operator {
        QueryOperator::Equal => loosely_equal(left, right),
        QueryOperator::NotEqual => !loosely_equal(left, right),
        QueryOperator::GreaterThan => compare_values(left, right) == Ordering::Greater,
        QueryOperator::GreaterThanOrEqual => compare_values(left, right) != Ordering::Less,
        QueryOperator::LessThan => compare_values(left, right) == Ordering::Less,
        QueryOperator::LessThanOrEqual => compare_values(left, right) != Ordering::Greater,
        _ => false,
    }
}

/// LIKE pattern to an anchored, case-insensitive regex
fn like_regex(pattern: &str) -> QueryResult<Regex> {
    let mut expr = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| QueryError::Query(format!("Invalid LIKE pattern: {}", e)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Equality with the implicit text/number coercion SQL literals get
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s == if *x { "true" } else { "false" }
        }
        _ => a == b,
    }
}

/// Typed comparison: numeric when both sides read as numbers, text otherwise
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) if !matches!((a, b), (Value::String(_), Value::String(_))) => {
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            _ => as_text(a).cmp(&as_text(b)),
        },
    }
}
