//! Database Executor Module
//!
//! The database interface every replication operation is written against,
//! with a MariaDB implementation and a scripted mock for tests.

mod mariadb;
mod mock;

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;

pub use mariadb::MariaDbExecutor;
pub use mock::MockExecutor;

/// A single result row with column order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Option<String>)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }

    /// Append a column
    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.columns.push((name.into(), value));
    }

    /// Get a column value by name; NULL and missing both return None
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Replace the value of an existing column
    pub fn set(&mut self, name: &str, value: Option<String>) -> bool {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some(col) => {
                col.1 = value;
                true
            }
            None => false,
        }
    }

    /// Column names in result order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Database operations needed by the replication administration code
#[async_trait]
pub trait DatabaseInterface: Send + Sync {
    /// Run a statement that returns rows
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement and return the affected row count
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Escape a value for interpolation inside a single-quoted SQL literal
    fn escape_string(&self, value: &str) -> String {
        escape_string(value)
    }

    /// Fetch one column of every row
    async fn fetch_column(&self, sql: &str, column: &str) -> Result<Vec<String>> {
        let rows = self.query(sql).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(column).map(str::to_string))
            .collect())
    }

    /// Fetch the first row, if any
    async fn fetch_first(&self, sql: &str) -> Result<Option<Row>> {
        Ok(self.query(sql).await?.into_iter().next())
    }

    /// Release any held connections
    async fn close(&self) {}
}

/// Escape a string the way mysql_real_escape_string does
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out
}
