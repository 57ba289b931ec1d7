//! Functional dependency discovery: for each candidate determinant and
//! dependent column pair, measures how consistently the determinant
//! predicts the dependent value, then minimizes the result so only the
//! smallest determinant that holds for each dependent survives.

use ahash::AHashMap as HashMap;
use serde::Serialize;

use crate::config::{LimitsConfig, ThresholdsConfig};
use crate::db::{SqlExecutor, TableRef};
use crate::keys::combinations;
use crate::quoting::{from_clause, not_null_filter, quote_qualified, quoted_column_list};
use crate::value::SqlValue;

const MAX_SAMPLE_VIOLATIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct FdViolationSample {
    pub determinant_values: Vec<SqlValue>,
    pub observed_dependent_values: Vec<SqlValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionalDependency {
    pub determinant: Vec<String>,
    pub dependent: String,
    pub tested_rows: u64,
    pub rows_with_determinant: u64,
    pub coverage_pct: f64,
    pub total_groups: u64,
    pub violating_groups: u64,
    pub violating_groups_pct: f64,
    pub violating_rows: u64,
    pub violating_rows_pct: f64,
    pub sample_violations: Vec<FdViolationSample>,
}

impl FunctionalDependency {
    pub fn holds(&self, thresholds: &ThresholdsConfig) -> bool {
        self.coverage_pct >= thresholds.fd_min_coverage_pct
            && self.violating_groups_pct <= thresholds.fd_max_violating_group_pct
            && self.violating_rows_pct <= thresholds.fd_max_violating_row_pct
    }

    pub fn is_strong(&self, thresholds: &ThresholdsConfig, limits: &LimitsConfig) -> bool {
        self.holds(thresholds) && self.tested_rows >= limits.min_rows_for_confident_results
    }
}

pub struct FdDiscoverer<'a> {
    pub limits: &'a LimitsConfig,
    pub thresholds: &'a ThresholdsConfig,
}

impl<'a> FdDiscoverer<'a> {
    /// Dependent candidates exclude anything already serving as (part of)
    /// the determinant pool's strongest key, and any blob/excluded column
    /// filtered out upstream.
    #[allow(clippy::too_many_arguments)]
    pub fn discover(
        &self,
        exec: &mut dyn SqlExecutor,
        table: &TableRef,
        pool: &[String],
        dependent_candidates: &[String],
        tested_rows_hint: u64,
        total_rows: u64,
        sample_clause: &str,
    ) -> Vec<FunctionalDependency> {
        let mut found = Vec::new();
        let max_size = self.limits.max_determinant_size.min(pool.len());
        for size in 1..=max_size {
            for determinant in combinations(pool, size) {
                for dependent in self.dependent_candidates(&determinant, dependent_candidates) {
                    if let Some(fd) = self.fd_stats(
                        exec,
                        table,
                        &determinant,
                        dependent,
                        tested_rows_hint,
                        total_rows,
                        sample_clause,
                    ) {
                        found.push(fd);
                    }
                }
            }
        }
        self.minimize(found)
    }

    fn dependent_candidates<'b>(
        &self,
        determinant: &[String],
        candidates: &'b [String],
    ) -> Vec<&'b str> {
        candidates
            .iter()
            .filter(|c| !determinant.contains(c))
            .map(String::as_str)
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn fd_stats(
        &self,
        exec: &mut dyn SqlExecutor,
        table: &TableRef,
        determinant: &[String],
        dependent: &str,
        tested_rows_hint: u64,
        total_rows: u64,
        sample_clause: &str,
    ) -> Option<FunctionalDependency> {
        let qualified = quote_qualified(&table.schema, &table.table);
        let from = from_clause(&qualified, sample_clause);
        let mut cols: Vec<&str> = determinant.iter().map(String::as_str).collect();
        cols.push(dependent);
        let projection = quoted_column_list(cols.iter().copied());
        let filter = not_null_filter(determinant.iter().map(String::as_str));
        let sql = format!("SELECT {projection} FROM {from} WHERE {filter}");
        let rows = exec.query(&sql).ok()?;

        let rows_with_determinant = rows.len() as u64;
        let tested_rows = if tested_rows_hint > 0 {
            tested_rows_hint
        } else {
            rows_with_determinant
        };

        let det_len = determinant.len();
        let mut groups: HashMap<Vec<String>, Vec<SqlValue>> = HashMap::new();
        for row in &rows {
            let key: Vec<String> = row.0[..det_len].iter().map(|v| v.to_string()).collect();
            groups.entry(key).or_default().push(row.0[det_len].clone());
        }

        let total_groups = groups.len() as u64;
        let mut violating_groups = 0u64;
        let mut violating_rows = 0u64;
        let mut samples = Vec::new();
        let mut group_keys: Vec<&Vec<String>> = groups.keys().collect();
        group_keys.sort();

        for key in group_keys {
            let values = &groups[key];
            let mut distinct: Vec<SqlValue> = Vec::new();
            for v in values {
                if !distinct.iter().any(|d| d.to_string() == v.to_string()) {
                    distinct.push(v.clone());
                }
            }
            if distinct.len() <= 1 {
                continue;
            }
            violating_groups += 1;
            violating_rows += values.len() as u64;

            if samples.len() < MAX_SAMPLE_VIOLATIONS {
                let determinant_values = rows
                    .iter()
                    .find(|r| {
                        r.0[..det_len]
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            == *key
                    })
                    .map(|r| r.0[..det_len].to_vec())
                    .unwrap_or_default();
                distinct.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
                samples.push(FdViolationSample {
                    determinant_values,
                    observed_dependent_values: distinct,
                });
            }
        }

        let coverage_pct = if total_rows == 0 {
            0.0
        } else {
            rows_with_determinant as f64 / total_rows as f64 * 100.0
        };
        let violating_groups_pct = if total_groups == 0 {
            0.0
        } else {
            violating_groups as f64 / total_groups as f64 * 100.0
        };
        let violating_rows_pct = if rows_with_determinant == 0 {
            0.0
        } else {
            violating_rows as f64 / rows_with_determinant as f64 * 100.0
        };

        Some(FunctionalDependency {
            determinant: determinant.to_vec(),
            dependent: dependent.to_string(),
            tested_rows,
            rows_with_determinant,
            coverage_pct,
            total_groups,
            violating_groups,
            violating_groups_pct,
            violating_rows,
            violating_rows_pct,
            sample_violations: samples,
        })
    }

    /// Drop any FD whose determinant is a proper superset of another
    /// holding determinant for the same dependent column.
    fn minimize(&self, fds: Vec<FunctionalDependency>) -> Vec<FunctionalDependency> {
        let mut by_dependent: HashMap<String, Vec<FunctionalDependency>> = HashMap::new();
        for fd in fds {
            by_dependent.entry(fd.dependent.clone()).or_default().push(fd);
        }

        let mut kept = Vec::new();
        for (_, mut group) in by_dependent {
            group.sort_by_key(|fd| fd.determinant.len());
            let mut minimal_determinants: Vec<Vec<String>> = Vec::new();
            for fd in group {
                if !fd.holds(self.thresholds) {
                    continue;
                }
                let redundant = minimal_determinants
                    .iter()
                    .any(|smaller| smaller.iter().all(|c| fd.determinant.contains(c)));
                if !redundant {
                    minimal_determinants.push(fd.determinant.clone());
                    kept.push(fd);
                }
            }
        }
        kept.sort_by(|a, b| {
            a.dependent
                .cmp(&b.dependent)
                .then_with(|| a.determinant.cmp(&b.determinant))
        });
        kept
    }
}
