//! Classifies functional dependencies against a chosen "working key" into
//! 2NF partial dependencies and 3NF transitive dependencies.

use std::collections::HashSet;

use crate::config::{LimitsConfig, ThresholdsConfig};
use crate::fd::FunctionalDependency;
use crate::keys::KeyCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Determinant is a proper subset of a composite working key: the
    /// dependent attribute depends on only part of the key.
    PartialDependency,
    /// Determinant is neither the working key nor a subset of it: the
    /// dependent attribute depends on a non-key attribute.
    TransitiveDependency,
}

#[derive(Debug, Clone)]
pub struct NormalizationIssue {
    pub kind: IssueKind,
    pub fd: FunctionalDependency,
}

pub struct NormalizationAnalyzer<'a> {
    pub thresholds: &'a ThresholdsConfig,
    pub limits: &'a LimitsConfig,
}

impl<'a> NormalizationAnalyzer<'a> {
    /// Pick the table's working key: an explicit override, else the
    /// best-ranked measured key candidate (whatever its strength), else the
    /// single best-scoring determinant-pool column as a low-confidence
    /// fallback, else none.
    pub fn working_key(
        &self,
        force_key: Option<&[String]>,
        key_candidates: &[KeyCandidate],
        pool: &[String],
    ) -> Vec<String> {
        if let Some(fk) = force_key {
            return fk.to_vec();
        }
        if let Some(best) = key_candidates.first() {
            return best.columns.clone();
        }
        pool.first().map(|c| vec![c.clone()]).unwrap_or_default()
    }

    pub fn analyze(
        &self,
        working_key: &[String],
        fds: &[FunctionalDependency],
    ) -> Vec<NormalizationIssue> {
        if working_key.is_empty() {
            return Vec::new();
        }
        let key_set: HashSet<&String> = working_key.iter().collect();
        let mut issues = Vec::new();

        for fd in fds {
            if !fd.holds(self.thresholds) {
                continue;
            }
            let det_set: HashSet<&String> = fd.determinant.iter().collect();

            if det_set.is_superset(&key_set) {
                continue; // determinant already implies the whole key: trivial
            }
            if working_key.len() > 1 && det_set.is_subset(&key_set) {
                issues.push(NormalizationIssue {
                    kind: IssueKind::PartialDependency,
                    fd: fd.clone(),
                });
            } else if !det_set.is_subset(&key_set) {
                issues.push(NormalizationIssue {
                    kind: IssueKind::TransitiveDependency,
                    fd: fd.clone(),
                });
            }
        }
        issues
    }
}
