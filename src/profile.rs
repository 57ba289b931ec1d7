//! Per-column profiling: null rates, approximate cardinality, and bounds.
//!
//! Every aggregate here is collected with a single scalar query against the
//! table's sample clause, so profiling a wide table costs one query per
//! column plus one for the row count.

use serde::Serialize;

use crate::config::SamplingConfig;
use crate::db::{ColumnInfo, SqlExecutor, TableRef};
use crate::quoting::{from_clause, quote_ident, quote_qualified};
use crate::sampling::build_sample_clause;
use crate::value::SqlValue;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub sql_type: String,
    pub is_nullable: bool,
    pub null_count: u64,
    pub null_pct: f64,
    pub distinct_count: Option<u64>,
    pub distinct_pct: Option<f64>,
    pub min_value: Option<SqlValue>,
    pub max_value: Option<SqlValue>,
    pub skipped_blob: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableProfile {
    pub schema: String,
    pub table: String,
    pub total_rows: u64,
    pub tested_rows: u64,
    pub sample_clause: String,
    pub columns: Vec<ColumnProfile>,
}

pub struct Profiler<'a> {
    pub blob_types: &'a [String],
}

impl<'a> Profiler<'a> {
    fn is_blob(&self, sql_type: &str) -> bool {
        self.blob_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(sql_type))
    }

    pub fn profile_table(
        &self,
        exec: &mut dyn SqlExecutor,
        table: &TableRef,
        columns: &[ColumnInfo],
        total_rows: u64,
        sampling: &SamplingConfig,
    ) -> TableProfile {
        let qualified = quote_qualified(&table.schema, &table.table);
        let sample_clause = build_sample_clause(total_rows, sampling);
        let from_clause = from_clause(&qualified, &sample_clause);

        let tested_rows = if sample_clause.is_empty() {
            total_rows
        } else {
            match exec.fetch_value(&format!("SELECT COUNT_BIG(*) FROM {from_clause}")) {
                Ok(SqlValue::Int(n)) => n.max(0) as u64,
                _ => total_rows,
            }
        };

        let profiles = columns
            .iter()
            .map(|col| self.profile_column(exec, col, &from_clause, tested_rows))
            .collect();

        TableProfile {
            schema: table.schema.clone(),
            table: table.table.clone(),
            total_rows,
            tested_rows,
            sample_clause,
            columns: profiles,
        }
    }

    fn profile_column(
        &self,
        exec: &mut dyn SqlExecutor,
        col: &ColumnInfo,
        from_clause: &str,
        tested_rows: u64,
    ) -> ColumnProfile {
        let quoted = quote_ident(&col.name);

        if self.is_blob(&col.sql_type) {
            return ColumnProfile {
                name: col.name.clone(),
                sql_type: col.sql_type.clone(),
                is_nullable: col.is_nullable,
                null_count: 0,
                null_pct: 0.0,
                distinct_count: None,
                distinct_pct: None,
                min_value: None,
                max_value: None,
                skipped_blob: true,
            };
        }

        let null_count = exec
            .fetch_value(&format!(
                "SELECT COUNT(*) FROM {from_clause} WHERE {quoted} IS NULL"
            ))
            .ok()
            .and_then(|v| match v {
                SqlValue::Int(n) => Some(n.max(0) as u64),
                _ => None,
            })
            .unwrap_or(0);
        let null_pct = ratio(null_count, tested_rows);

        let distinct_count = exec
            .fetch_value(&format!(
                "SELECT APPROX_COUNT_DISTINCT({quoted}) FROM {from_clause}"
            ))
            .or_else(|_| {
                exec.fetch_value(&format!(
                    "SELECT COUNT(DISTINCT {quoted}) FROM {from_clause}"
                ))
            })
            .ok()
            .and_then(|v| match v {
                SqlValue::Int(n) => Some(n.max(0) as u64),
                _ => None,
            });
        let distinct_pct = distinct_count.map(|d| ratio(d, tested_rows));

        let min_value = exec
            .fetch_value(&format!(
                "SELECT MIN({quoted}) FROM {from_clause} WHERE {quoted} IS NOT NULL"
            ))
            .ok()
            .filter(|v| !v.is_null());
        let max_value = exec
            .fetch_value(&format!(
                "SELECT MAX({quoted}) FROM {from_clause} WHERE {quoted} IS NOT NULL"
            ))
            .ok()
            .filter(|v| !v.is_null());

        ColumnProfile {
            name: col.name.clone(),
            sql_type: col.sql_type.clone(),
            is_nullable: col.is_nullable,
            null_count,
            null_pct,
            distinct_count,
            distinct_pct,
            min_value,
            max_value,
            skipped_blob: false,
        }
    }
}

pub fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ColumnInfo as DbColumnInfo;
    use crate::fake::{FakeBackend, FakeTable};

    fn col(name: &str, ty: &str) -> DbColumnInfo {
        DbColumnInfo {
            name: name.to_string(),
            sql_type: ty.to_string(),
            is_nullable: true,
            ordinal_position: 0,
        }
    }

    #[test]
    fn profiles_basic_columns() {
        let mut backend = FakeBackend::new();
        let table = FakeTable::new(vec![col("id", "int"), col("name", "varchar")])
            .with_row(vec![SqlValue::Int(1), SqlValue::Text("a".into())])
            .with_row(vec![SqlValue::Int(2), SqlValue::Text("a".into())])
            .with_row(vec![SqlValue::Int(3), SqlValue::Null]);
        backend.add_table("dbo", "T", table);

        let profiler = Profiler { blob_types: &[] };
        let table_ref = crate::db::TableRef {
            schema: "dbo".to_string(),
            table: "T".to_string(),
        };
        let cfg = SamplingConfig {
            full_scan_max_rows: 2_000_000,
            sample_target_rows: 200_000,
            sample_min_pct: 0.2,
            sample_max_pct: 2.0,
        };
        let profile = profiler.profile_table(
            &mut backend,
            &table_ref,
            &[col("id", "int"), col("name", "varchar")],
            3,
            &cfg,
        );

        assert_eq!(profile.tested_rows, 3);
        let name_profile = &profile.columns[1];
        assert_eq!(name_profile.null_count, 1);
        assert_eq!(name_profile.distinct_count, Some(1));
    }

    #[test]
    fn skips_blob_columns() {
        let mut backend = FakeBackend::new();
        let table = FakeTable::new(vec![col("blob", "varbinary")])
            .with_row(vec![SqlValue::Bytes(vec![1, 2, 3])]);
        backend.add_table("dbo", "T", table);

        let blob_types = vec!["varbinary".to_string()];
        let profiler = Profiler {
            blob_types: &blob_types,
        };
        let table_ref = crate::db::TableRef {
            schema: "dbo".to_string(),
            table: "T".to_string(),
        };
        let cfg = SamplingConfig {
            full_scan_max_rows: 2_000_000,
            sample_target_rows: 200_000,
            sample_min_pct: 0.2,
            sample_max_pct: 2.0,
        };
        let profile = profiler.profile_table(
            &mut backend,
            &table_ref,
            &[col("blob", "varbinary")],
            1,
            &cfg,
        );

        assert!(profile.columns[0].skipped_blob);
        assert_eq!(profile.columns[0].distinct_count, None);
    }
}
