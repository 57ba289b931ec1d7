//! Command-line entry point: parses arguments and dispatches to either a
//! configured audit run or the self-contained `test` smoke-test mode.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    Config, LimitsConfig, OutputConfig, OverridesConfig, SamplingConfig, ScopeConfig,
    SourceConfig, ThresholdsConfig,
};
use crate::db::{ColumnInfo, TableRef};
use crate::error::{AuditError, Result};
use crate::fake::{FakeBackend, FakeTable};
use crate::runner::Runner;
use crate::value::SqlValue;
use crate::writer::ArtifactWriter;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Mode {
    /// Run against a synthetic in-memory table instead of a configured source.
    Test,
}

#[derive(Parser, Debug)]
#[command(
    name = "sqlserver-3nf-audit",
    about = "Audits SQL Server tables and proposes evidence-backed 2NF/3NF decompositions"
)]
pub struct Cli {
    #[arg(value_enum)]
    pub mode: Option<Mode>,

    /// YAML config file listing sources, scope, and thresholds. Required
    /// unless running in `test` mode.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.mode {
        Some(Mode::Test) => run_test_mode(cli.output),
        None => run_configured(cli),
    }
}

fn run_configured(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => {
            log::warn!("no --config given, running with the embedded default configuration");
            Config::embedded_default()
        }
    };
    if let Some(output) = cli.output {
        config.output.dir = output.to_string_lossy().into_owned();
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut writer = ArtifactWriter::new(std::path::Path::new(&config.output.dir), &timestamp)?;

    let runner = Runner { config: &config };
    let summary = runner.run(&mut writer)?;
    log::info!(
        "run complete: {} tables processed, {} skipped, {} source(s) failed, artifacts in {}",
        summary.tables_processed,
        summary.tables_skipped,
        summary.sources_failed.len(),
        writer.run_dir().display()
    );

    if !summary.sources_failed.is_empty() {
        return Err(AuditError::Connection {
            source_name: summary.sources_failed.join(", "),
            message: "one or more sources could not be audited".to_string(),
        });
    }
    Ok(())
}

fn run_test_mode(output: Option<PathBuf>) -> Result<()> {
    log::info!("running smoke test against a synthetic table");

    let col = |name: &str| ColumnInfo {
        name: name.to_string(),
        sql_type: "varchar".to_string(),
        is_nullable: true,
        ordinal_position: 0,
    };

    let mut backend = FakeBackend::new();
    let table = FakeTable::new(vec![col("order_id"), col("zip"), col("city")])
        .with_row(vec![
            SqlValue::Int(1),
            SqlValue::Text("94107".into()),
            SqlValue::Text("San Francisco".into()),
        ])
        .with_row(vec![
            SqlValue::Int(2),
            SqlValue::Text("94107".into()),
            SqlValue::Text("San Francisco".into()),
        ])
        .with_row(vec![
            SqlValue::Int(3),
            SqlValue::Text("10001".into()),
            SqlValue::Text("New York".into()),
        ]);
    backend.add_table("dbo", "Orders", table);

    let config = Config {
        sources: vec![SourceConfig {
            name: "test".to_string(),
            host: "localhost".to_string(),
            port: 1433,
            database: "synthetic".to_string(),
            user: "n/a".to_string(),
            password: "n/a".to_string(),
            trust_cert: true,
        }],
        scope: ScopeConfig::default(),
        include_schemas_regex: None,
        exclude_schemas_regex: None,
        include_tables_regex: None,
        exclude_tables_regex: None,
        overrides: OverridesConfig::default(),
        limits: LimitsConfig {
            max_determinant_size: 2,
            determinant_pool_size: 5,
            max_tables_per_source: 10,
            query_timeout_seconds: 10,
            min_rows_for_confident_results: 1,
            max_dependents_tested: 60,
            confirm_top_n_keys: 5,
            confirm_top_n_fds_per_table: 50,
        },
        sampling: SamplingConfig {
            full_scan_max_rows: 2_000_000,
            sample_target_rows: 200_000,
            sample_min_pct: 0.2,
            sample_max_pct: 2.0,
        },
        thresholds: ThresholdsConfig::default(),
        output: OutputConfig {
            dir: output
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audit_runs".to_string()),
        },
        exclude_columns_regex: None,
        blob_types: Vec::new(),
    };

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut writer = ArtifactWriter::new(std::path::Path::new(&config.output.dir), &timestamp)?;
    let runner = Runner { config: &config };
    let table_ref = TableRef {
        schema: "dbo".to_string(),
        table: "Orders".to_string(),
    };
    runner.process_table(&mut backend, &config.sources[0], &table_ref, &mut writer)?;

    log::info!("smoke test complete, artifacts in {}", writer.run_dir().display());
    Ok(())
}
