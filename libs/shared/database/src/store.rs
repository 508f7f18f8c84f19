use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("authentication with the data store failed: {0}")]
    Unauthorized(String),

    #[error("data store request failed: {0}")]
    Backend(String),

    #[error("malformed row: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
    Lte,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

/// Row selection shared by every backend: conjunctive filters, ordering
/// columns (first one is the primary key of the sort) and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn filter(mut self, column: &str, op: FilterOp, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value: value.to_string(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Neq, value)
    }

    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Lte, value)
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// PostgREST query string, e.g. `doctor_id=eq.42&order=date.asc&limit=10`.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self
            .filters
            .iter()
            .map(|f| format!("{}={}.{}", f.column, f.op, urlencoding::encode(&f.value)))
            .collect();

        if !self.order.is_empty() {
            let columns: Vec<String> = self
                .order
                .iter()
                .map(|(column, ascending)| format!("{}.{}", column, if *ascending { "asc" } else { "desc" }))
                .collect();
            parts.push(format!("order={}", columns.join(",")));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset={}", offset));
        }

        parts.join("&")
    }
}

/// Persistence seam used by every cell. Rows are JSON documents; each cell
/// owns the typed (de)serialisation of its tables.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Merges `patch` into every matching row and returns the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError>;

    /// Returns the number of rows removed.
    async fn delete(&self, table: &str, query: &Query) -> Result<usize, StoreError>;

    async fn select_one(&self, table: &str, query: &Query) -> Result<Option<Value>, StoreError> {
        let rows = self.select(table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }
}
