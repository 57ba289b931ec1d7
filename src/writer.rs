//! Writes per-table JSON artifacts and Markdown reports, plus a run-level
//! manifest and summary CSV, to a timestamped run directory.
//!
//! `run_<timestamp>/source_<name>/<schema>.<table>/{profile,key_candidates,fds,proposals}.json`
//! and `report.md`, with `manifest.json` and `summary.csv` updated
//! incrementally at the run root as each table finishes.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::fd::FunctionalDependency;
use crate::keys::KeyCandidate;
use crate::normalize::{IssueKind, NormalizationIssue};
use crate::profile::TableProfile;
use crate::proposal::Proposal;

enum Outcome {
    Success {
        row_count: u64,
        working_key: Vec<String>,
        accepted_fds: usize,
    },
    Error {
        message: String,
    },
}

struct TableRecord {
    source: String,
    schema: String,
    table: String,
    outcome: Outcome,
}

impl Serialize for TableRecord {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match &self.outcome {
            Outcome::Success { row_count, .. } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("source", &self.source)?;
                map.serialize_entry("schema", &self.schema)?;
                map.serialize_entry("table", &self.table)?;
                map.serialize_entry("row_count", row_count)?;
                map.end()
            }
            Outcome::Error { message } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("source", &self.source)?;
                map.serialize_entry("schema", &self.schema)?;
                map.serialize_entry("table", &self.table)?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

pub struct TableReport<'a> {
    pub profile: &'a TableProfile,
    pub key_candidates: &'a [KeyCandidate],
    pub fds: &'a [FunctionalDependency],
    pub issues: &'a [NormalizationIssue],
    pub proposals: &'a [Proposal],
    pub working_key: &'a [String],
}

pub struct ArtifactWriter {
    run_dir: PathBuf,
    manifest: Vec<TableRecord>,
}

impl ArtifactWriter {
    pub fn new(output_dir: &Path, run_timestamp: &str) -> Result<Self> {
        let run_dir = output_dir.join(format!("run_{run_timestamp}"));
        fs::create_dir_all(&run_dir)?;
        Ok(ArtifactWriter {
            run_dir,
            manifest: Vec::new(),
        })
    }

    pub fn table_folder(&self, source_name: &str, schema: &str, table: &str) -> PathBuf {
        self.run_dir
            .join(format!("source_{source_name}"))
            .join(format!("{schema}.{table}"))
    }

    pub fn write_table_report(&mut self, source_name: &str, report: &TableReport) -> Result<()> {
        let dir = self.table_folder(source_name, &report.profile.schema, &report.profile.table);
        fs::create_dir_all(&dir)?;

        write_json(&dir.join("profile.json"), &report.profile)?;
        write_json(&dir.join("key_candidates.json"), &report.key_candidates)?;
        write_json(&dir.join("fds.json"), &report.fds)?;
        write_json(&dir.join("proposals.json"), &report.proposals)?;
        fs::write(dir.join("report.md"), render_markdown(report))?;

        self.manifest.push(TableRecord {
            source: source_name.to_string(),
            schema: report.profile.schema.clone(),
            table: report.profile.table.clone(),
            outcome: Outcome::Success {
                row_count: report.profile.total_rows,
                working_key: report.working_key.to_vec(),
                accepted_fds: report.fds.len(),
            },
        });
        self.flush_manifest()?;
        self.flush_summary()?;
        Ok(())
    }

    /// Records a table that could not be measured (metadata lookup or query
    /// failure) so the manifest reflects every table that was in scope, not
    /// just the ones that succeeded.
    pub fn record_table_error(
        &mut self,
        source_name: &str,
        schema: &str,
        table: &str,
        message: &str,
    ) -> Result<()> {
        self.manifest.push(TableRecord {
            source: source_name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            outcome: Outcome::Error {
                message: message.to_string(),
            },
        });
        self.flush_manifest()?;
        self.flush_summary()?;
        Ok(())
    }

    fn flush_manifest(&self) -> Result<()> {
        write_json(&self.run_dir.join("manifest.json"), &self.manifest)
    }

    fn flush_summary(&self) -> Result<()> {
        let mut file = File::create(self.run_dir.join("summary.csv"))?;
        writeln!(file, "source,schema,table,row_count,working_key,accepted_fds")?;
        for entry in &self.manifest {
            if let Outcome::Success {
                row_count,
                working_key,
                accepted_fds,
            } = &entry.outcome
            {
                writeln!(
                    file,
                    "{},{},{},{},{},{}",
                    entry.source,
                    entry.schema,
                    entry.table,
                    row_count,
                    working_key.join("|"),
                    accepted_fds,
                )?;
            }
        }
        Ok(())
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn render_markdown(report: &TableReport) -> String {
    let profile = report.profile;
    let mut out = String::new();
    out.push_str(&format!("# {}.{}\n\n", profile.schema, profile.table));
    out.push_str(&format!(
        "Total rows: {}. Tested rows: {} ({}).\n\n",
        profile.total_rows,
        profile.tested_rows,
        if profile.sample_clause.is_empty() {
            "full scan".to_string()
        } else {
            profile.sample_clause.clone()
        }
    ));

    out.push_str("## Working key\n\n");
    if report.working_key.is_empty() {
        out.push_str("No working key could be determined.\n\n");
    } else {
        out.push_str(&format!("{}\n\n", report.working_key.join(", ")));
    }

    out.push_str("## Key candidates\n\n");
    if report.key_candidates.is_empty() {
        out.push_str("No key candidates were evaluated.\n\n");
    } else {
        for kc in report.key_candidates.iter().take(10) {
            out.push_str(&format!(
                "- ({}): dup {:.2}%, null {:.2}%, tested {}\n",
                kc.columns.join(", "),
                kc.dup_pct * 100.0,
                kc.null_pct * 100.0,
                kc.tested_rows
            ));
        }
        out.push('\n');
    }

    out.push_str("## Functional dependencies\n\n");
    if report.fds.is_empty() {
        out.push_str("No functional dependencies survived minimization.\n\n");
    } else {
        for fd in report.fds {
            out.push_str(&format!(
                "- ({}) -> {}: {} violating groups ({:.2}%), {} violating rows ({:.2}%), coverage {:.2}%\n",
                fd.determinant.join(", "),
                fd.dependent,
                fd.violating_groups,
                fd.violating_groups_pct,
                fd.violating_rows,
                fd.violating_rows_pct,
                fd.coverage_pct,
            ));
        }
        out.push('\n');
    }

    out.push_str("## Normalization issues\n\n");
    if report.issues.is_empty() {
        out.push_str("None found under tested constraints.\n\n");
    } else {
        for issue in report.issues {
            let label = match issue.kind {
                IssueKind::PartialDependency => "2NF partial dependency",
                IssueKind::TransitiveDependency => "3NF transitive dependency",
            };
            out.push_str(&format!(
                "- {label}: ({}) -> {}\n",
                issue.fd.determinant.join(", "),
                issue.fd.dependent
            ));
        }
        out.push('\n');
    }

    out.push_str("## Proposals\n\n");
    if report.proposals.is_empty() {
        out.push_str("No proposals; 3NF-compliant under tested constraints.\n");
    } else {
        for proposal in report.proposals {
            out.push_str(&format!(
                "- Extract `{}` ({}) into `{}`, moving [{}]. Confidence {:.2}. {}\n",
                proposal.determinant.join(", "),
                proposal.table,
                proposal.proposed_table_name,
                proposal.moved_columns.join(", "),
                proposal.confidence,
                proposal.review_guidance,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ColumnProfile;

    fn empty_profile() -> TableProfile {
        TableProfile {
            schema: "dbo".to_string(),
            table: "Orders".to_string(),
            total_rows: 10,
            tested_rows: 10,
            sample_clause: String::new(),
            columns: vec![ColumnProfile {
                name: "id".to_string(),
                sql_type: "int".to_string(),
                is_nullable: false,
                null_count: 0,
                null_pct: 0.0,
                distinct_count: Some(10),
                distinct_pct: Some(1.0),
                min_value: None,
                max_value: None,
                skipped_blob: false,
            }],
        }
    }

    #[test]
    fn writes_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), "20260101_000000").unwrap();
        let profile = empty_profile();
        let report = TableReport {
            profile: &profile,
            key_candidates: &[],
            fds: &[],
            issues: &[],
            proposals: &[],
            working_key: &["id".to_string()],
        };
        writer.write_table_report("main", &report).unwrap();

        let table_dir = writer.table_folder("main", "dbo", "Orders");
        assert!(table_dir.join("profile.json").exists());
        assert!(table_dir.join("key_candidates.json").exists());
        assert!(table_dir.join("fds.json").exists());
        assert!(table_dir.join("proposals.json").exists());
        assert!(table_dir.join("report.md").exists());
        assert!(writer.run_dir().join("manifest.json").exists());
        assert!(writer.run_dir().join("summary.csv").exists());
    }

    #[test]
    fn summary_csv_has_literal_header_and_success_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), "20260101_000000").unwrap();
        let profile = empty_profile();
        let report = TableReport {
            profile: &profile,
            key_candidates: &[],
            fds: &[],
            issues: &[],
            proposals: &[],
            working_key: &["id".to_string()],
        };
        writer.write_table_report("main", &report).unwrap();
        writer
            .record_table_error("main", "dbo", "Broken", "query timed out")
            .unwrap();

        let csv = fs::read_to_string(writer.run_dir().join("summary.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "source,schema,table,row_count,working_key,accepted_fds"
        );
        assert_eq!(lines.next().unwrap(), "main,dbo,Orders,10,id,0");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn manifest_records_per_table_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), "20260101_000000").unwrap();
        writer
            .record_table_error("main", "dbo", "Broken", "query timed out")
            .unwrap();

        let manifest = fs::read_to_string(writer.run_dir().join("manifest.json")).unwrap();
        assert!(manifest.contains("\"error\""));
        assert!(manifest.contains("query timed out"));
    }

    #[test]
    fn report_notes_absence_of_proposals() {
        let profile = empty_profile();
        let report = TableReport {
            profile: &profile,
            key_candidates: &[],
            fds: &[],
            issues: &[],
            proposals: &[],
            working_key: &["id".to_string()],
        };
        let md = render_markdown(&report);
        assert!(md.contains("No proposals; 3NF-compliant under tested constraints."));
    }
}
