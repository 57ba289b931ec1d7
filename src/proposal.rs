//! Builds decomposition proposals from confirmed 3NF violations.
//!
//! Proposals are always a 3NF extraction (determinant + dependent into a
//! new lookup table); 2NF partial dependencies are reported as diagnostics
//! only, since splitting off part of a composite key is a judgment call a
//! human should make, not something to propose automatically. Each
//! transitive-dependency issue produces its own proposal: merging several
//! issues that happen to share a determinant would understate how many
//! distinct dependents are actually out of place.

use serde::Serialize;

use crate::normalize::{IssueKind, NormalizationIssue};

pub const REVIEW_GUIDANCE: &str =
    "Evidence-based proposal from sampled data; confirm against the full table and any \
     application-layer assumptions before applying.";

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub schema: String,
    pub table: String,
    pub proposed_table_name: String,
    pub determinant: Vec<String>,
    pub moved_columns: Vec<String>,
    pub confidence: f64,
    pub review_guidance: &'static str,
}

pub struct ProposalBuilder;

impl ProposalBuilder {
    pub fn build(schema: &str, table: &str, issues: &[NormalizationIssue]) -> Vec<Proposal> {
        let mut proposals: Vec<Proposal> = issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::TransitiveDependency)
            .map(|issue| {
                let confidence = (1.0 - issue.fd.violating_rows_pct / 100.0).max(0.1);
                Proposal {
                    schema: schema.to_string(),
                    table: table.to_string(),
                    proposed_table_name: format!("{table}_{}", issue.fd.determinant.join("_")),
                    determinant: issue.fd.determinant.clone(),
                    moved_columns: vec![issue.fd.dependent.clone()],
                    confidence,
                    review_guidance: REVIEW_GUIDANCE,
                }
            })
            .collect();

        proposals.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.proposed_table_name.cmp(&b.proposed_table_name))
                .then_with(|| a.moved_columns.cmp(&b.moved_columns))
        });
        proposals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::FunctionalDependency;

    fn transitive_issue(
        determinant: &[&str],
        dependent: &str,
        violating_rows_pct: f64,
    ) -> NormalizationIssue {
        NormalizationIssue {
            kind: IssueKind::TransitiveDependency,
            fd: FunctionalDependency {
                determinant: determinant.iter().map(|s| s.to_string()).collect(),
                dependent: dependent.to_string(),
                tested_rows: 100,
                rows_with_determinant: 100,
                coverage_pct: 100.0,
                total_groups: 100,
                violating_groups: 0,
                violating_groups_pct: 0.0,
                violating_rows: (violating_rows_pct * 1.0) as u64,
                violating_rows_pct,
                sample_violations: Vec::new(),
            },
        }
    }

    #[test]
    fn emits_one_proposal_per_issue_even_with_shared_determinant() {
        let issues = vec![
            transitive_issue(&["zip"], "city", 0.0),
            transitive_issue(&["zip"], "state", 0.0),
        ];
        let proposals = ProposalBuilder::build("dbo", "orders", &issues);
        assert_eq!(proposals.len(), 2);
        assert!(proposals.iter().any(|p| p.moved_columns == vec!["city".to_string()]));
        assert!(proposals.iter().any(|p| p.moved_columns == vec!["state".to_string()]));
    }

    #[test]
    fn confidence_degrades_with_violations() {
        let issues = vec![transitive_issue(&["zip"], "city", 30.0)];
        let proposals = ProposalBuilder::build("dbo", "orders", &issues);
        assert!((proposals[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn confidence_floors_at_one_tenth() {
        let issues = vec![transitive_issue(&["zip"], "city", 99.0)];
        let proposals = ProposalBuilder::build("dbo", "orders", &issues);
        assert_eq!(proposals[0].confidence, 0.1);
    }

    #[test]
    fn partial_dependency_issues_produce_no_proposal() {
        let issues = vec![NormalizationIssue {
            kind: IssueKind::PartialDependency,
            fd: FunctionalDependency {
                determinant: vec!["order_id".to_string()],
                dependent: "customer_name".to_string(),
                tested_rows: 100,
                rows_with_determinant: 100,
                coverage_pct: 100.0,
                total_groups: 100,
                violating_groups: 0,
                violating_groups_pct: 0.0,
                violating_rows: 0,
                violating_rows_pct: 0.0,
                sample_violations: Vec::new(),
            },
        }];
        assert!(ProposalBuilder::build("dbo", "orders", &issues).is_empty());
    }
}
