//! In-memory stand-in for a SQL Server source, used by unit and integration
//! tests so the profiling, key-finding, and FD-discovery logic can be
//! exercised without a live database.
//!
//! The pipeline only ever issues a handful of query shapes (see
//! `profile.rs`, `keys.rs`, `fd.rs`): a row count, a distinct-count
//! aggregate, a min/max aggregate, a null count, or a plain column
//! projection. This module recognizes exactly those shapes; it is not a SQL
//! engine.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::{ColumnInfo, MetadataReader, Row, SqlExecutor, TableRef};
use crate::error::{AuditError, Result};
use crate::value::SqlValue;

/// A single in-memory table: column names in order, plus its rows.
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl FakeTable {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        FakeTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<SqlValue>) -> Self {
        self.rows.push(row);
        self
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A programmable in-memory backend implementing both collaborator traits.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    tables: HashMap<(String, String), FakeTable>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend::default()
    }

    pub fn add_table(&mut self, schema: &str, table: &str, data: FakeTable) -> &mut Self {
        self.tables
            .insert((schema.to_string(), table.to_string()), data);
        self
    }

    fn table_for(&self, qualified: &str) -> Result<&FakeTable> {
        let (schema, table) = split_qualified(qualified)?;
        self.tables
            .get(&(schema.clone(), table.clone()))
            .ok_or_else(|| AuditError::Measurement(format!("no fake table for {schema}.{table}")))
    }
}

fn split_qualified(qualified: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = qualified.splitn(2, '.').collect();
    if parts.len() != 2 {
        return Err(AuditError::Measurement(format!(
            "malformed table reference: {qualified}"
        )));
    }
    Ok((unbracket(parts[0]), unbracket(parts[1])))
}

fn unbracket(ident: &str) -> String {
    ident
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .replace("]]", "]")
}

static COUNT_BIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SELECT COUNT_BIG\(\*\) FROM (\S+)$").unwrap());
static APPROX_DISTINCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SELECT APPROX_COUNT_DISTINCT\(\[(\w+)\]\) FROM (\S+)$").unwrap());
static COUNT_DISTINCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SELECT COUNT\(DISTINCT \[(\w+)\]\) FROM (\S+)$").unwrap());
static MIN_MAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SELECT (MIN|MAX)\(\[(\w+)\]\) FROM (\S+) WHERE \[(\w+)\] IS NOT NULL$").unwrap()
});
static NULL_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SELECT COUNT\(\*\) FROM (\S+) WHERE \[(\w+)\] IS NULL$").unwrap());
static PROJECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SELECT (.+) FROM (\S+)(?: WHERE (.+))?$").unwrap());
static SAMPLE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*TABLESAMPLE \([^)]*\)").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\w+)\]").unwrap());

impl SqlExecutor for FakeBackend {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let sql = SAMPLE_CLAUSE.replace_all(sql.trim(), "").trim().to_string();

        if let Some(caps) = PROJECTION.captures(&sql) {
            if COUNT_BIG.is_match(&sql)
                || APPROX_DISTINCT.is_match(&sql)
                || COUNT_DISTINCT.is_match(&sql)
                || MIN_MAX.is_match(&sql)
                || NULL_COUNT.is_match(&sql)
            {
                // handled as a scalar below via fetch_value
            } else {
                let table = self.table_for(&caps[2])?;
                let cols: Vec<String> = BRACKETED
                    .captures_iter(&caps[1])
                    .map(|m| m[1].to_string())
                    .collect();
                let not_null_cols: Vec<String> = caps
                    .get(3)
                    .map(|w| {
                        BRACKETED
                            .captures_iter(w.as_str())
                            .map(|m| m[1].to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                let idxs: Vec<usize> = cols
                    .iter()
                    .map(|c| {
                        table.column_index(c).ok_or_else(|| {
                            AuditError::Measurement(format!("unknown column {c} in fake table"))
                        })
                    })
                    .collect::<Result<_>>()?;
                let filter_idxs: Vec<usize> = not_null_cols
                    .iter()
                    .map(|c| table.column_index(c).unwrap_or(usize::MAX))
                    .collect();
                let mut out = Vec::new();
                for row in &table.rows {
                    if filter_idxs
                        .iter()
                        .any(|&i| i == usize::MAX || row[i].is_null())
                    {
                        continue;
                    }
                    out.push(Row(idxs.iter().map(|&i| row[i].clone()).collect()));
                }
                return Ok(out);
            }
        }

        Ok(vec![Row(vec![self.fetch_value(&sql)?])])
    }

    fn fetch_value(&mut self, sql: &str) -> Result<SqlValue> {
        let sql = SAMPLE_CLAUSE.replace_all(sql.trim(), "").trim().to_string();

        if let Some(caps) = COUNT_BIG.captures(&sql) {
            let table = self.table_for(&caps[1])?;
            return Ok(SqlValue::Int(table.rows.len() as i64));
        }
        if let Some(caps) = APPROX_DISTINCT.captures(&sql).or_else(|| COUNT_DISTINCT.captures(&sql)) {
            let table = self.table_for(&caps[2])?;
            let idx = table
                .column_index(&caps[1])
                .ok_or_else(|| AuditError::Measurement(format!("unknown column {}", &caps[1])))?;
            let mut seen: Vec<&SqlValue> = Vec::new();
            for row in &table.rows {
                let v = &row[idx];
                if v.is_null() {
                    continue;
                }
                if !seen.iter().any(|s| *s == v) {
                    seen.push(v);
                }
            }
            return Ok(SqlValue::Int(seen.len() as i64));
        }
        if let Some(caps) = MIN_MAX.captures(&sql) {
            let is_min = &caps[1] == "MIN";
            let table = self.table_for(&caps[3])?;
            let idx = table
                .column_index(&caps[2])
                .ok_or_else(|| AuditError::Measurement(format!("unknown column {}", &caps[2])))?;
            let mut best: Option<&SqlValue> = None;
            for row in &table.rows {
                let v = &row[idx];
                if v.is_null() {
                    continue;
                }
                best = Some(match best {
                    None => v,
                    Some(b) => {
                        if cmp_sql_value(v, b, is_min) {
                            v
                        } else {
                            b
                        }
                    }
                });
            }
            return Ok(best.cloned().unwrap_or(SqlValue::Null));
        }
        if let Some(caps) = NULL_COUNT.captures(&sql) {
            let table = self.table_for(&caps[1])?;
            let idx = table
                .column_index(&caps[2])
                .ok_or_else(|| AuditError::Measurement(format!("unknown column {}", &caps[2])))?;
            let count = table.rows.iter().filter(|r| r[idx].is_null()).count();
            return Ok(SqlValue::Int(count as i64));
        }

        Err(AuditError::Measurement(format!(
            "fake backend cannot interpret query: {sql}"
        )))
    }
}

fn cmp_sql_value(a: &SqlValue, b: &SqlValue, want_less: bool) -> bool {
    use std::cmp::Ordering;
    let ord = match (a, b) {
        (SqlValue::Int(x), SqlValue::Int(y)) => x.cmp(y),
        (SqlValue::Float(x), SqlValue::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        (SqlValue::DateTime(x), SqlValue::DateTime(y)) => x.cmp(y),
        _ => Ordering::Equal,
    };
    if want_less {
        ord == Ordering::Less
    } else {
        ord == Ordering::Greater
    }
}

impl MetadataReader for FakeBackend {
    fn list_tables(&mut self) -> Result<Vec<TableRef>> {
        let mut refs: Vec<TableRef> = self
            .tables
            .keys()
            .map(|(schema, table)| TableRef {
                schema: schema.clone(),
                table: table.clone(),
            })
            .collect();
        refs.sort_by(|a, b| (&a.schema, &a.table).cmp(&(&b.schema, &b.table)));
        Ok(refs)
    }

    fn list_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        self.tables
            .get(&(table.schema.clone(), table.table.clone()))
            .map(|t| t.columns.clone())
            .ok_or_else(|| AuditError::Metadata {
                schema: table.schema.clone(),
                table: table.table.clone(),
                message: "no such fake table".to_string(),
            })
    }

    fn row_count(&mut self, table: &TableRef) -> Result<u64> {
        self.tables
            .get(&(table.schema.clone(), table.table.clone()))
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| AuditError::Metadata {
                schema: table.schema.clone(),
                table: table.table.clone(),
                message: "no such fake table".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            sql_type: "int".to_string(),
            is_nullable: true,
            ordinal_position: 0,
        }
    }

    fn sample_backend() -> FakeBackend {
        let mut backend = FakeBackend::new();
        let table = FakeTable::new(vec![col("id"), col("name")])
            .with_row(vec![SqlValue::Int(1), SqlValue::Text("a".into())])
            .with_row(vec![SqlValue::Int(2), SqlValue::Text("b".into())])
            .with_row(vec![SqlValue::Int(3), SqlValue::Null]);
        backend.add_table("dbo", "Widgets", table);
        backend
    }

    #[test]
    fn counts_rows() {
        let mut backend = sample_backend();
        let v = backend
            .fetch_value("SELECT COUNT_BIG(*) FROM [dbo].[Widgets]")
            .unwrap();
        assert_eq!(v, SqlValue::Int(3));
    }

    #[test]
    fn counts_distinct_non_null_values() {
        let mut backend = sample_backend();
        let v = backend
            .fetch_value("SELECT COUNT(DISTINCT [name]) FROM [dbo].[Widgets]")
            .unwrap();
        assert_eq!(v, SqlValue::Int(2));
    }

    #[test]
    fn counts_nulls() {
        let mut backend = sample_backend();
        let v = backend
            .fetch_value("SELECT COUNT(*) FROM [dbo].[Widgets] WHERE [name] IS NULL")
            .unwrap();
        assert_eq!(v, SqlValue::Int(1));
    }

    #[test]
    fn projects_columns_with_not_null_filter() {
        let mut backend = sample_backend();
        let rows = backend
            .query("SELECT [id], [name] FROM [dbo].[Widgets] WHERE [name] IS NOT NULL")
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn lists_tables_sorted() {
        let mut backend = sample_backend();
        backend.add_table("dbo", "Aardvarks", FakeTable::new(vec![col("id")]));
        let tables = backend.list_tables().unwrap();
        assert_eq!(tables[0].table, "Aardvarks");
        assert_eq!(tables[1].table, "Widgets");
    }
}
