//! Candidate-key discovery: scores combinations of the determinant pool by
//! how close they come to uniquely, non-nullably identifying a row.

use serde::Serialize;

use crate::config::{LimitsConfig, ThresholdsConfig};
use crate::db::{SqlExecutor, TableRef};
use crate::profile::ratio;
use crate::quoting::{from_clause, quote_qualified, quoted_column_list};
use crate::value::SqlValue;

#[derive(Debug, Clone, Serialize)]
pub struct KeyCandidate {
    pub columns: Vec<String>,
    pub tested_rows: u64,
    pub null_rows: u64,
    pub null_pct: f64,
    pub duplicate_excess_rows: u64,
    pub dup_pct: f64,
}

impl KeyCandidate {
    pub fn is_strong(&self, thresholds: &ThresholdsConfig, limits: &LimitsConfig) -> bool {
        self.dup_pct <= thresholds.key_candidate_max_dup_pct
            && self.null_pct <= thresholds.key_candidate_max_null_pct
            && self.tested_rows >= limits.min_rows_for_confident_results
    }
}

pub struct KeyFinder<'a> {
    pub limits: &'a LimitsConfig,
}

impl<'a> KeyFinder<'a> {
    /// Evaluate every combination of the pool up to `limits.max_determinant_size`,
    /// sorted best-first: fewest duplicate rows, then fewest nulls, then
    /// fewest columns.
    pub fn find_candidates(
        &self,
        exec: &mut dyn SqlExecutor,
        table: &TableRef,
        pool: &[String],
        tested_rows_hint: u64,
        sample_clause: &str,
    ) -> Vec<KeyCandidate> {
        let mut candidates = Vec::new();
        let max_size = self.limits.max_determinant_size.min(pool.len());
        for size in 1..=max_size {
            for combo in combinations(pool, size) {
                if let Some(stats) =
                    self.combination_stats(exec, table, &combo, tested_rows_hint, sample_clause)
                {
                    candidates.push(stats);
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.dup_pct
                .partial_cmp(&b.dup_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.null_pct
                        .partial_cmp(&b.null_pct)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.columns.len().cmp(&b.columns.len()))
        });
        candidates
    }

    fn combination_stats(
        &self,
        exec: &mut dyn SqlExecutor,
        table: &TableRef,
        combo: &[String],
        tested_rows_hint: u64,
        sample_clause: &str,
    ) -> Option<KeyCandidate> {
        let qualified = quote_qualified(&table.schema, &table.table);
        let from = from_clause(&qualified, sample_clause);
        let col_refs: Vec<&str> = combo.iter().map(String::as_str).collect();
        let projection = quoted_column_list(col_refs.iter().copied());
        let sql = format!("SELECT {projection} FROM {from}");
        let rows = exec.query(&sql).ok()?;

        let tested_rows = if rows.is_empty() {
            tested_rows_hint
        } else {
            rows.len() as u64
        };
        let null_rows = rows.iter().filter(|r| r.0.iter().any(SqlValue::is_null)).count() as u64;

        let mut groups: ahash::AHashMap<Vec<String>, u64> = ahash::AHashMap::new();
        for row in &rows {
            if row.0.iter().any(SqlValue::is_null) {
                continue;
            }
            let key: Vec<String> = row.0.iter().map(|v| v.to_string()).collect();
            *groups.entry(key).or_insert(0) += 1;
        }
        let duplicate_excess_rows: u64 = groups
            .values()
            .filter(|&&count| count > 1)
            .map(|&count| count - 1)
            .sum();

        Some(KeyCandidate {
            columns: combo.to_vec(),
            tested_rows,
            null_rows,
            null_pct: ratio(null_rows, tested_rows),
            duplicate_excess_rows,
            dup_pct: ratio(duplicate_excess_rows, tested_rows),
        })
    }
}

/// All `size`-element combinations of `items`, in input order.
pub fn combinations<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 || size > items.len() {
        return if size == 0 { vec![Vec::new()] } else { Vec::new() };
    }
    let mut result = Vec::new();
    let mut combo = Vec::with_capacity(size);
    combinations_helper(items, size, 0, &mut combo, &mut result);
    result
}

fn combinations_helper<T: Clone>(
    items: &[T],
    size: usize,
    start: usize,
    combo: &mut Vec<T>,
    result: &mut Vec<Vec<T>>,
) {
    if combo.len() == size {
        result.push(combo.clone());
        return;
    }
    for i in start..items.len() {
        combo.push(items[i].clone());
        combinations_helper(items, size, i + 1, combo, result);
        combo.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ColumnInfo;
    use crate::fake::{FakeBackend, FakeTable};

    fn col(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            sql_type: "int".to_string(),
            is_nullable: true,
            ordinal_position: 0,
        }
    }

    #[test]
    fn combinations_cover_all_sizes() {
        let items = vec!["a", "b", "c"];
        assert_eq!(combinations(&items, 1).len(), 3);
        assert_eq!(combinations(&items, 2).len(), 3);
        assert_eq!(combinations(&items, 3).len(), 1);
    }

    #[test]
    fn unique_column_scores_as_perfect_key() {
        let mut backend = FakeBackend::new();
        let table = FakeTable::new(vec![col("id")])
            .with_row(vec![SqlValue::Int(1)])
            .with_row(vec![SqlValue::Int(2)])
            .with_row(vec![SqlValue::Int(3)]);
        backend.add_table("dbo", "T", table);

        let limits = LimitsConfig {
            max_determinant_size: 2,
            determinant_pool_size: 5,
            max_tables_per_source: 10,
            query_timeout_seconds: 10,
            min_rows_for_confident_results: 1,
            max_dependents_tested: 60,
            confirm_top_n_keys: 5,
            confirm_top_n_fds_per_table: 50,
        };
        let finder = KeyFinder { limits: &limits };
        let table_ref = TableRef {
            schema: "dbo".to_string(),
            table: "T".to_string(),
        };
        let candidates =
            finder.find_candidates(&mut backend, &table_ref, &["id".to_string()], 3, "");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].dup_pct, 0.0);
        assert_eq!(candidates[0].null_pct, 0.0);
    }

    #[test]
    fn duplicate_values_reduce_score() {
        let mut backend = FakeBackend::new();
        let table = FakeTable::new(vec![col("status")])
            .with_row(vec![SqlValue::Text("open".into())])
            .with_row(vec![SqlValue::Text("open".into())])
            .with_row(vec![SqlValue::Text("closed".into())]);
        backend.add_table("dbo", "T", table);

        let limits = LimitsConfig {
            max_determinant_size: 1,
            determinant_pool_size: 5,
            max_tables_per_source: 10,
            query_timeout_seconds: 10,
            min_rows_for_confident_results: 1,
            max_dependents_tested: 60,
            confirm_top_n_keys: 5,
            confirm_top_n_fds_per_table: 50,
        };
        let finder = KeyFinder { limits: &limits };
        let table_ref = TableRef {
            schema: "dbo".to_string(),
            table: "T".to_string(),
        };
        let candidates =
            finder.find_candidates(&mut backend, &table_ref, &["status".to_string()], 3, "");

        assert_eq!(candidates[0].duplicate_excess_rows, 1);
        assert!(candidates[0].dup_pct > 0.0);
    }
}
