//! Compliance report - the per-run result record handed back to the caller

use crate::audit::{AuditIdentity, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded audit outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub identity: AuditIdentity,
    pub outcome: Outcome,
}

/// Overall status of a completed category run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Only compliant or remediated outcomes
    Success,
    /// At least one failed outcome
    PartialSuccess,
}

/// Counters over a report's outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub compliant: usize,
    pub remediated: usize,
    pub failed: usize,
}

/// Ordered `(identity, outcome)` record of one run of one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Unique run ID
    pub run_id: Uuid,
    /// Category this report covers
    pub category: String,
    /// Outcomes in execution order
    pub entries: Vec<ReportEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ComplianceReport {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            category: category.into(),
            entries: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record an outcome
    pub fn record(&mut self, identity: AuditIdentity, outcome: Outcome) {
        self.entries.push(ReportEntry { identity, outcome });
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose outcome is `Failed`
    pub fn failures(&self) -> Vec<&ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_failed())
            .collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Compliant => summary.compliant += 1,
                Outcome::Remediated => summary.remediated += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn status(&self) -> RunStatus {
        if self.entries.iter().any(|e| e.outcome.is_failed()) {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }
}
