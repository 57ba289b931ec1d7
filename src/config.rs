//! Run configuration, loaded from a YAML file via `serde_yaml_ng`.
//!
//! Unknown keys are rejected so a typo in a config file fails loudly at
//! startup instead of silently falling back to a default. When no config
//! file is given at all (outside `test` mode), [`Config::embedded_default`]
//! supplies a conservative built-in configuration instead of erroring.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AuditError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub trust_cert: bool,
}

fn default_port() -> u16 {
    1433
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ScopeConfig {
    pub include_schemas_regex: Option<String>,
    pub exclude_schemas_regex: Option<String>,
    pub include_tables_regex: Option<String>,
    pub exclude_tables_regex: Option<String>,
    pub table_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct OverridesConfig {
    pub force_key: HashMap<String, Vec<String>>,
    pub force_include_columns: HashMap<String, Vec<String>>,
    pub ignore_columns: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default = "default_max_determinant_size")]
    pub max_determinant_size: usize,
    #[serde(default = "default_determinant_pool_size")]
    pub determinant_pool_size: usize,
    #[serde(default = "default_max_tables_per_source")]
    pub max_tables_per_source: usize,
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,
    #[serde(default = "default_min_rows_for_confident_results")]
    pub min_rows_for_confident_results: u64,
    #[serde(default = "default_max_dependents_tested")]
    pub max_dependents_tested: usize,
    #[serde(default = "default_confirm_top_n_keys")]
    pub confirm_top_n_keys: usize,
    #[serde(default = "default_confirm_top_n_fds_per_table")]
    pub confirm_top_n_fds_per_table: usize,
}

fn default_max_determinant_size() -> usize {
    3
}
fn default_determinant_pool_size() -> usize {
    15
}
fn default_max_tables_per_source() -> usize {
    500
}
fn default_query_timeout_seconds() -> u64 {
    30
}
fn default_min_rows_for_confident_results() -> u64 {
    200
}
fn default_max_dependents_tested() -> usize {
    60
}
fn default_confirm_top_n_keys() -> usize {
    5
}
fn default_confirm_top_n_fds_per_table() -> usize {
    50
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_determinant_size: default_max_determinant_size(),
            determinant_pool_size: default_determinant_pool_size(),
            max_tables_per_source: default_max_tables_per_source(),
            query_timeout_seconds: default_query_timeout_seconds(),
            min_rows_for_confident_results: default_min_rows_for_confident_results(),
            max_dependents_tested: default_max_dependents_tested(),
            confirm_top_n_keys: default_confirm_top_n_keys(),
            confirm_top_n_fds_per_table: default_confirm_top_n_fds_per_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    #[serde(default = "default_full_scan_max_rows")]
    pub full_scan_max_rows: u64,
    #[serde(default = "default_sample_target_rows")]
    pub sample_target_rows: u64,
    #[serde(default = "default_sample_min_pct")]
    pub sample_min_pct: f64,
    #[serde(default = "default_sample_max_pct")]
    pub sample_max_pct: f64,
}

fn default_full_scan_max_rows() -> u64 {
    2_000_000
}
fn default_sample_target_rows() -> u64 {
    200_000
}
fn default_sample_min_pct() -> f64 {
    0.2
}
fn default_sample_max_pct() -> f64 {
    2.0
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            full_scan_max_rows: default_full_scan_max_rows(),
            sample_target_rows: default_sample_target_rows(),
            sample_min_pct: default_sample_min_pct(),
            sample_max_pct: default_sample_max_pct(),
        }
    }
}

/// Thresholds gating how confidently a measured key or functional
/// dependency is reported. [`KeyCandidate`](crate::keys::KeyCandidate)
/// fields and their thresholds are fractions in `[0, 1]`;
/// [`FunctionalDependency`](crate::fd::FunctionalDependency) percentage
/// fields and their thresholds are on a `0-100` scale.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsConfig {
    #[serde(default = "default_key_candidate_max_dup_pct")]
    pub key_candidate_max_dup_pct: f64,
    #[serde(default = "default_key_candidate_max_null_pct")]
    pub key_candidate_max_null_pct: f64,
    #[serde(default = "default_fd_max_violating_group_pct")]
    pub fd_max_violating_group_pct: f64,
    #[serde(default = "default_fd_max_violating_row_pct")]
    pub fd_max_violating_row_pct: f64,
    #[serde(default = "default_fd_min_coverage_pct")]
    pub fd_min_coverage_pct: f64,
}

fn default_key_candidate_max_dup_pct() -> f64 {
    0.01
}
fn default_key_candidate_max_null_pct() -> f64 {
    0.0
}
fn default_fd_max_violating_group_pct() -> f64 {
    0.1
}
fn default_fd_max_violating_row_pct() -> f64 {
    0.01
}
fn default_fd_min_coverage_pct() -> f64 {
    20.0
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        ThresholdsConfig {
            key_candidate_max_dup_pct: default_key_candidate_max_dup_pct(),
            key_candidate_max_null_pct: default_key_candidate_max_null_pct(),
            fd_max_violating_group_pct: default_fd_max_violating_group_pct(),
            fd_max_violating_row_pct: default_fd_max_violating_row_pct(),
            fd_min_coverage_pct: default_fd_min_coverage_pct(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "audit_runs".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
        }
    }
}

/// Top-level configuration document, deserialized directly from the YAML
/// config file named on the command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub overrides: OverridesConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub exclude_columns_regex: Option<String>,
    #[serde(default)]
    pub blob_types: Vec<String>,
}

/// Fully validated configuration: regex fields are compiled once here so
/// later stages never handle a `Result` for a pattern that was already
/// checked at load time.
pub struct Config {
    pub sources: Vec<SourceConfig>,
    pub scope: ScopeConfig,
    pub include_schemas_regex: Option<Regex>,
    pub exclude_schemas_regex: Option<Regex>,
    pub include_tables_regex: Option<Regex>,
    pub exclude_tables_regex: Option<Regex>,
    pub overrides: OverridesConfig,
    pub limits: LimitsConfig,
    pub sampling: SamplingConfig,
    pub thresholds: ThresholdsConfig,
    pub output: OutputConfig,
    pub exclude_columns_regex: Option<Regex>,
    pub blob_types: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            AuditError::Configuration(format!("could not read {}: {e}", path.display()))
        })?;
        let raw: RawConfig = serde_yaml_ng::from_str(&text)
            .map_err(|e| AuditError::Configuration(format!("invalid config YAML: {e}")))?;
        Config::from_raw(raw)
    }

    /// A conservative built-in configuration used when no `--config` file is
    /// given outside `test` mode: no sources, so a run degenerates to a
    /// no-op rather than failing outright, while thresholds and limits stay
    /// at their documented defaults.
    pub fn embedded_default() -> Config {
        Config::from_raw(RawConfig {
            sources: Vec::new(),
            scope: ScopeConfig::default(),
            overrides: OverridesConfig::default(),
            limits: LimitsConfig::default(),
            sampling: SamplingConfig::default(),
            thresholds: ThresholdsConfig::default(),
            output: OutputConfig::default(),
            exclude_columns_regex: None,
            blob_types: vec![
                "text".to_string(),
                "ntext".to_string(),
                "image".to_string(),
                "varbinary".to_string(),
                "xml".to_string(),
            ],
        })
        .expect("embedded default config must compile")
    }

    pub(crate) fn from_raw(raw: RawConfig) -> Result<Config> {
        let include_schemas_regex = raw
            .scope
            .include_schemas_regex
            .as_deref()
            .map(compile_regex)
            .transpose()?;
        let exclude_schemas_regex = raw
            .scope
            .exclude_schemas_regex
            .as_deref()
            .map(compile_regex)
            .transpose()?;
        let include_tables_regex = raw
            .scope
            .include_tables_regex
            .as_deref()
            .map(compile_regex)
            .transpose()?;
        let exclude_tables_regex = raw
            .scope
            .exclude_tables_regex
            .as_deref()
            .map(compile_regex)
            .transpose()?;
        let exclude_columns_regex = raw
            .exclude_columns_regex
            .as_deref()
            .map(compile_regex)
            .transpose()?;

        if raw.limits.max_determinant_size == 0 {
            return Err(AuditError::Configuration(
                "limits.max_determinant_size must be at least 1".to_string(),
            ));
        }
        if raw.sampling.sample_min_pct > raw.sampling.sample_max_pct {
            return Err(AuditError::Configuration(
                "sampling.sample_min_pct cannot exceed sampling.sample_max_pct".to_string(),
            ));
        }

        Ok(Config {
            sources: raw.sources,
            scope: raw.scope,
            include_schemas_regex,
            exclude_schemas_regex,
            include_tables_regex,
            exclude_tables_regex,
            overrides: raw.overrides,
            limits: raw.limits,
            sampling: raw.sampling,
            thresholds: raw.thresholds,
            output: raw.output,
            exclude_columns_regex,
            blob_types: raw.blob_types,
        })
    }
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| AuditError::Configuration(format!("invalid regex {pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawConfig {
        RawConfig {
            sources: vec![SourceConfig {
                name: "main".to_string(),
                host: "localhost".to_string(),
                port: 1433,
                database: "db".to_string(),
                user: "sa".to_string(),
                password: "pw".to_string(),
                trust_cert: true,
            }],
            scope: ScopeConfig::default(),
            overrides: OverridesConfig::default(),
            limits: LimitsConfig::default(),
            sampling: SamplingConfig::default(),
            thresholds: ThresholdsConfig::default(),
            output: OutputConfig::default(),
            exclude_columns_regex: None,
            blob_types: Vec::new(),
        }
    }

    #[test]
    fn rejects_invalid_exclude_regex() {
        let mut raw = minimal_raw();
        raw.scope.exclude_tables_regex = Some("(unterminated".to_string());
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn rejects_inverted_sampling_bounds() {
        let mut raw = minimal_raw();
        raw.sampling.sample_min_pct = 5.0;
        raw.sampling.sample_max_pct = 1.0;
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(Config::from_raw(minimal_raw()).is_ok());
    }

    #[test]
    fn embedded_default_compiles_and_has_no_sources() {
        let config = Config::embedded_default();
        assert!(config.sources.is_empty());
        assert_eq!(config.thresholds.fd_min_coverage_pct, 20.0);
    }
}
