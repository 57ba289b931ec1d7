//! Selects a pool of candidate determinant columns from a table's profile.
//!
//! Key and functional-dependency search both run over combinations drawn
//! from this pool rather than every column, so a wide table with hundreds
//! of mostly-irrelevant columns stays tractable.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::profile::{ColumnProfile, TableProfile};

static NAME_HINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(id|code|nr|key|number|uuid|guid)").unwrap());

const TYPE_BONUS_TYPES: &[&str] = &["int", "bigint", "uniqueidentifier", "date", "datetime", "datetime2"];

pub struct DeterminantSelector<'a> {
    pub exclude_regex: Option<&'a Regex>,
    pub pool_size: usize,
}

impl<'a> DeterminantSelector<'a> {
    /// Higher is a better determinant candidate. Combines non-null and
    /// distinct ratios (measured against the table's total row count, not
    /// the already-sampled percentages) with bonuses for identifier-shaped
    /// SQL types and names, and a penalty for blob columns.
    pub fn score_column(profile: &ColumnProfile, total_rows: u64) -> f64 {
        if profile.skipped_blob {
            return -0.30;
        }
        let denom = total_rows.max(1) as f64;
        let non_null_ratio = 1.0 - profile.null_count as f64 / denom;
        let distinct_ratio = (profile.distinct_count.unwrap_or(0) as f64 / denom).min(1.5);

        let sql_type_lower = profile.sql_type.to_ascii_lowercase();
        let type_bonus = if TYPE_BONUS_TYPES.contains(&sql_type_lower.as_str()) {
            0.20
        } else if sql_type_lower.starts_with("varchar") || sql_type_lower.starts_with("nvarchar") {
            -0.05
        } else {
            0.0
        };

        let name_bonus = if NAME_HINT_RE.is_match(&profile.name) {
            0.15
        } else {
            0.0
        };

        non_null_ratio * 0.6 + distinct_ratio * 0.6 + type_bonus + name_bonus
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude_regex.is_some_and(|re| re.is_match(name))
    }

    /// Rank every non-blob, non-excluded column by [`score_column`] and keep
    /// the top `pool_size`.
    pub fn build_pool(&self, table: &TableProfile) -> Vec<String> {
        let mut scored: Vec<(&str, f64)> = table
            .columns
            .iter()
            .filter(|c| !c.skipped_blob && !self.is_excluded(&c.name))
            .map(|c| (c.name.as_str(), Self::score_column(c, table.total_rows)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(self.pool_size)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, sql_type: &str, distinct_count: u64, null_count: u64) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            is_nullable: true,
            null_count,
            null_pct: 0.0,
            distinct_count: Some(distinct_count),
            distinct_pct: Some(0.0),
            min_value: None,
            max_value: None,
            skipped_blob: false,
        }
    }

    #[test]
    fn scores_unique_non_null_id_column_highest() {
        let id = profile("id", "int", 100, 0);
        let sparse = profile("notes", "varchar", 10, 50);
        assert!(DeterminantSelector::score_column(&id, 100) > DeterminantSelector::score_column(&sparse, 100));
    }

    #[test]
    fn name_hint_adds_bonus() {
        let hinted = profile("order_code", "varchar", 100, 0);
        let unhinted = profile("description", "varchar", 100, 0);
        assert!(
            DeterminantSelector::score_column(&hinted, 100)
                > DeterminantSelector::score_column(&unhinted, 100)
        );
    }

    #[test]
    fn blob_columns_score_negative() {
        let mut blob = profile("payload", "varbinary", 0, 0);
        blob.skipped_blob = true;
        assert_eq!(DeterminantSelector::score_column(&blob, 100), -0.30);
    }

    #[test]
    fn pool_is_truncated_and_sorted() {
        let table = TableProfile {
            schema: "dbo".to_string(),
            table: "T".to_string(),
            total_rows: 100,
            tested_rows: 100,
            sample_clause: String::new(),
            columns: vec![
                profile("low", "varchar", 20, 0),
                profile("high", "int", 90, 0),
                profile("mid", "varchar", 50, 0),
            ],
        };
        let selector = DeterminantSelector {
            exclude_regex: None,
            pool_size: 2,
        };
        assert_eq!(selector.build_pool(&table), vec!["high", "mid"]);
    }

    #[test]
    fn excludes_matching_columns() {
        let re = Regex::new("^etl_").unwrap();
        let table = TableProfile {
            schema: "dbo".to_string(),
            table: "T".to_string(),
            total_rows: 100,
            tested_rows: 100,
            sample_clause: String::new(),
            columns: vec![
                profile("etl_loaded_at", "datetime", 100, 0),
                profile("id", "int", 90, 0),
            ],
        };
        let selector = DeterminantSelector {
            exclude_regex: Some(&re),
            pool_size: 10,
        };
        assert_eq!(selector.build_pool(&table), vec!["id"]);
    }
}
