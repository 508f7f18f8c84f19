use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{DataStore, Filter, FilterOp, Query, StoreError};

/// Unique constraint over one or more columns of a table. Rows where the
/// `unless` column equals the given value are outside the index, which is how
/// a partial index such as `WHERE status <> 'cancelled'` is expressed.
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unless: Option<(String, String)>,
}

impl UniqueIndex {
    pub fn new(name: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unless: None,
        }
    }

    pub fn unless(mut self, column: &str, value: &str) -> Self {
        self.unless = Some((column.to_string(), value.to_string()));
        self
    }

    fn key(&self, row: &Value) -> Option<Vec<String>> {
        if let Some((column, value)) = &self.unless {
            if cell_text(row, column).as_deref() == Some(value.as_str()) {
                return None;
            }
        }

        // NULLs never collide, as in SQL
        self.columns.iter().map(|c| cell_text(row, c)).collect()
    }
}

/// In-process `DataStore`. Every write evaluates the unique indexes and
/// applies the change under a single write-lock acquisition, so a
/// check-then-insert race cannot produce two rows with the same key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    indexes: Vec<UniqueIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indexes(indexes: Vec<UniqueIndex>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            indexes,
        }
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map(Vec::len).unwrap_or(0)
    }

    fn find_violation(&self, table: &str, rows: &[Value], candidate: &Value, skip: Option<usize>) -> Option<String> {
        for index in self.indexes.iter().filter(|i| i.table == table) {
            let Some(key) = index.key(candidate) else {
                continue;
            };

            let collides = rows
                .iter()
                .enumerate()
                .filter(|(pos, _)| Some(*pos) != skip)
                .any(|(_, row)| index.key(row).as_ref() == Some(&key));

            if collides {
                return Some(format!("{} ({})", index.name, key.join(", ")));
            }
        }

        None
    }
}

fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Numbers and RFC 3339 timestamps compare by value; the fraction digits
/// chrono writes vary in length, so those strings do not sort lexically.
fn compare_text(left: &str, right: &str) -> Ordering {
    if let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) {
        return l.partial_cmp(&r).unwrap_or(Ordering::Equal);
    }
    if let (Ok(l), Ok(r)) = (
        DateTime::<FixedOffset>::parse_from_rfc3339(left),
        DateTime::<FixedOffset>::parse_from_rfc3339(right),
    ) {
        return l.cmp(&r);
    }
    left.cmp(right)
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let Some(cell) = cell_text(row, &filter.column) else {
        return false;
    };

    match filter.op {
        FilterOp::Eq => cell == filter.value,
        FilterOp::Neq => cell != filter.value,
        FilterOp::Gte => compare_text(&cell, &filter.value) != Ordering::Less,
        FilterOp::Lte => compare_text(&cell, &filter.value) != Ordering::Greater,
    }
}

fn matches_all(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|f| matches(row, f))
}

fn merge(row: &Value, patch: &Value) -> Result<Value, StoreError> {
    let (Value::Object(base), Value::Object(changes)) = (row, patch) else {
        return Err(StoreError::Malformed("update patch must be a JSON object".to_string()));
    };

    let mut merged = base.clone();
    for (key, value) in changes {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, query)).cloned().collect())
            .unwrap_or_default();

        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .order
                    .iter()
                    .map(|(column, ascending)| {
                        let ordering = match (cell_text(a, column), cell_text(b, column)) {
                            (Some(l), Some(r)) => compare_text(&l, &r),
                            (Some(_), None) => Ordering::Less,
                            (None, Some(_)) => Ordering::Greater,
                            (None, None) => Ordering::Equal,
                        };
                        if *ascending { ordering } else { ordering.reverse() }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        if !row.is_object() {
            return Err(StoreError::Malformed("inserted row must be a JSON object".to_string()));
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(index) = self.find_violation(table, rows, &row, None) {
            warn!("Insert into {} rejected by unique index {}", table, index);
            return Err(StoreError::UniqueViolation(index));
        }

        rows.push(row.clone());
        debug!("Inserted row into {} ({} rows)", table, rows.len());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| matches_all(r, query))
            .map(|(pos, _)| pos)
            .collect();

        let mut next = rows.clone();
        for &pos in &targets {
            next[pos] = merge(&rows[pos], &patch)?;
        }

        for &pos in &targets {
            if let Some(index) = self.find_violation(table, &next, &next[pos], Some(pos)) {
                warn!("Update of {} rejected by unique index {}", table, index);
                return Err(StoreError::UniqueViolation(index));
            }
        }

        let updated = targets.iter().map(|&pos| next[pos].clone()).collect();
        *rows = next;
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = rows.len();
        rows.retain(|r| !matches_all(r, query));
        Ok(before - rows.len())
    }
}
