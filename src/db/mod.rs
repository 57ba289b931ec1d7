//! Collaborator traits the measurement stages are written against.
//!
//! Everything above this module talks to a source through [`SqlExecutor`]
//! and [`MetadataReader`] only, so the same profiling/key/FD code runs
//! against a live SQL Server ([`mssql::MssqlExecutor`]) or the in-memory
//! [`crate::fake`] backend used in tests, with no conditional compilation.

pub mod mssql;

use crate::error::Result;
use crate::value::SqlValue;

/// One result row: an ordered list of column values, accessed positionally.
#[derive(Debug, Clone, Default)]
pub struct Row(pub Vec<SqlValue>);

impl Row {
    pub fn get(&self, idx: usize) -> &SqlValue {
        self.0.get(idx).unwrap_or(&SqlValue::Null)
    }
}

/// A column in a table, as reported by [`MetadataReader::list_columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub is_nullable: bool,
    pub ordinal_position: u32,
}

/// A table in scope for auditing, as reported by [`MetadataReader::list_tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

/// Runs queries against a single table's connection and returns rows.
///
/// Every call is synchronous from the caller's perspective: a single table
/// is driven by a single connection, one query at a time, with no
/// cross-table concurrency.
pub trait SqlExecutor {
    /// Run a query expected to return rows.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Run a query expected to return exactly one row with one column,
    /// returning that scalar (or `SqlValue::Null` if the row set is empty).
    fn fetch_value(&mut self, sql: &str) -> Result<SqlValue>;
}

/// Reads schema metadata for a source: which tables exist, and their columns.
pub trait MetadataReader {
    fn list_tables(&mut self) -> Result<Vec<TableRef>>;
    fn list_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>>;
    fn row_count(&mut self, table: &TableRef) -> Result<u64>;
}

/// A single source connection, queryable and introspectable. Implemented by
/// both the live `mssql` backend and the `fake` test backend.
pub trait Backend: SqlExecutor + MetadataReader {}
impl<T: SqlExecutor + MetadataReader> Backend for T {}
