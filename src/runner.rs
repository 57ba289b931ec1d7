//! Orchestrates one audit run across every configured source: connects,
//! enumerates in-scope tables, runs the measurement pipeline per table
//! sequentially, and writes artifacts as each table finishes so a crashed
//! run still leaves partial results on disk.

use std::collections::HashSet;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, SourceConfig};
use crate::db::mssql::MssqlExecutor;
use crate::db::{Backend, TableRef};
use crate::determinant::DeterminantSelector;
use crate::error::{AuditError, Result};
use crate::fd::FdDiscoverer;
use crate::keys::KeyFinder;
use crate::normalize::NormalizationAnalyzer;
use crate::profile::Profiler;
use crate::proposal::ProposalBuilder;
use crate::writer::{ArtifactWriter, TableReport};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub tables_processed: usize,
    pub tables_skipped: usize,
    pub sources_failed: Vec<String>,
}

pub struct Runner<'a> {
    pub config: &'a Config,
}

impl<'a> Runner<'a> {
    pub fn run(&self, writer: &mut ArtifactWriter) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for source in &self.config.sources {
            log::info!("connecting to source {}", source.name);
            match MssqlExecutor::connect(source, self.config.limits.query_timeout_seconds) {
                Ok(mut backend) => {
                    if let Err(e) = self.run_source(&mut backend, source, writer, &mut summary) {
                        log::error!("source {} aborted: {e}", source.name);
                        summary.sources_failed.push(source.name.clone());
                    }
                }
                Err(e) => {
                    log::error!("could not connect to source {}: {e}", source.name);
                    summary.sources_failed.push(source.name.clone());
                }
            }
        }
        Ok(summary)
    }

    fn run_source(
        &self,
        backend: &mut dyn Backend,
        source: &SourceConfig,
        writer: &mut ArtifactWriter,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut tables = backend.list_tables()?;
        tables.retain(|t| self.in_scope(t));
        tables.truncate(self.config.limits.max_tables_per_source);

        let progress = ProgressBar::new(tables.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(format!("auditing {}", source.name));

        for table in &tables {
            match self.process_table(backend, source, table, writer) {
                Ok(()) => {
                    summary.tables_processed += 1;
                }
                Err(e) => {
                    log::warn!("skipping {}.{}: {e}", table.schema, table.table);
                    summary.tables_skipped += 1;
                    if let Err(write_err) =
                        writer.record_table_error(&source.name, &table.schema, &table.table, &e.to_string())
                    {
                        log::error!(
                            "failed to record manifest error for {}.{}: {write_err}",
                            table.schema,
                            table.table
                        );
                    }
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        Ok(())
    }

    /// A table is in scope only if every configured conjunct agrees: an
    /// absent filter never excludes, but a present one must pass.
    fn in_scope(&self, table: &TableRef) -> bool {
        let scope = &self.config.scope;
        let qualified = format!("{}.{}", table.schema, table.table);

        if !scope.table_allowlist.is_empty() && !scope.table_allowlist.contains(&qualified) {
            return false;
        }
        if let Some(re) = &self.config.include_schemas_regex {
            if !re.is_match(&table.schema) {
                return false;
            }
        }
        if let Some(re) = &self.config.include_tables_regex {
            if !re.is_match(&qualified) {
                return false;
            }
        }
        if let Some(re) = &self.config.exclude_schemas_regex {
            if re.is_match(&table.schema) {
                return false;
            }
        }
        if let Some(re) = &self.config.exclude_tables_regex {
            if re.is_match(&qualified) {
                return false;
            }
        }
        true
    }

    /// All table columns eligible to be tested as a dependent: not part of
    /// the working key, not ETL-excluded, not explicitly ignored for this
    /// table, and not a blob column unless explicitly force-included.
    fn dependent_candidates(&self, qualified: &str, profile: &crate::profile::TableProfile, working_key: &[String]) -> Vec<String> {
        let ignore: HashSet<&str> = self
            .config
            .overrides
            .ignore_columns
            .get(qualified)
            .map(|cols| cols.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let force_include: HashSet<&str> = self
            .config
            .overrides
            .force_include_columns
            .get(qualified)
            .map(|cols| cols.iter().map(String::as_str).collect())
            .unwrap_or_default();

        profile
            .columns
            .iter()
            .filter(|c| !working_key.contains(&c.name))
            .filter(|c| !ignore.contains(c.name.as_str()))
            .filter(|c| !c.skipped_blob || force_include.contains(c.name.as_str()))
            .filter(|c| {
                !self
                    .config
                    .exclude_columns_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(&c.name))
            })
            .map(|c| c.name.clone())
            .take(self.config.limits.max_dependents_tested)
            .collect()
    }

    /// Runs the full measurement pipeline for one table against any
    /// [`Backend`], live or fake, and writes its artifacts. Exposed so the
    /// CLI's `test` mode can drive it against a synthetic table.
    pub fn process_table(
        &self,
        backend: &mut dyn Backend,
        source: &SourceConfig,
        table: &TableRef,
        writer: &mut ArtifactWriter,
    ) -> Result<()> {
        let columns = backend.list_columns(table).map_err(|e| AuditError::Metadata {
            schema: table.schema.clone(),
            table: table.table.clone(),
            message: e.to_string(),
        })?;
        let total_rows = backend.row_count(table)?;

        let profiler = Profiler {
            blob_types: &self.config.blob_types,
        };
        let profile = profiler.profile_table(backend, table, &columns, total_rows, &self.config.sampling);

        let selector = DeterminantSelector {
            exclude_regex: self.config.exclude_columns_regex.as_ref(),
            pool_size: self.config.limits.determinant_pool_size,
        };
        let pool = selector.build_pool(&profile);

        let key_finder = KeyFinder {
            limits: &self.config.limits,
        };
        let mut key_candidates = key_finder.find_candidates(
            backend,
            table,
            &pool,
            profile.tested_rows,
            &profile.sample_clause,
        );
        key_candidates.truncate(self.config.limits.confirm_top_n_keys);

        let qualified = format!("{}.{}", table.schema, table.table);
        let force_key = self.config.overrides.force_key.get(&qualified).cloned();

        let analyzer = NormalizationAnalyzer {
            thresholds: &self.config.thresholds,
            limits: &self.config.limits,
        };
        let working_key = analyzer.working_key(force_key.as_deref(), &key_candidates, &pool);

        let dependent_candidates = self.dependent_candidates(&qualified, &profile, &working_key);

        let fd_discoverer = FdDiscoverer {
            limits: &self.config.limits,
            thresholds: &self.config.thresholds,
        };
        let mut fds = fd_discoverer.discover(
            backend,
            table,
            &pool,
            &dependent_candidates,
            profile.tested_rows,
            profile.total_rows,
            &profile.sample_clause,
        );
        fds.truncate(self.config.limits.confirm_top_n_fds_per_table);

        let issues = analyzer.analyze(&working_key, &fds);
        let proposals = ProposalBuilder::build(&table.schema, &table.table, &issues);

        let report = TableReport {
            profile: &profile,
            key_candidates: &key_candidates,
            fds: &fds,
            issues: &issues,
            proposals: &proposals,
            working_key: &working_key,
        };
        writer.write_table_report(&source.name, &report)
    }
}
