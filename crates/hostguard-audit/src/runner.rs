//! Audit runner - executes one category's audits in order

use hostguard_core::{Audit, AuditIdentity, ComplianceReport, Error, Outcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span};

/// A run stopped by a fatal error.
///
/// `reports` holds everything recorded before the abort, including the
/// partial report of the category that failed.
#[derive(Debug, Error)]
#[error("compliance run aborted: {error}")]
pub struct Aborted {
    pub reports: Vec<ComplianceReport>,
    #[source]
    pub error: Error,
}

impl Aborted {
    pub fn new(reports: Vec<ComplianceReport>, error: Error) -> Self {
        Self { reports, error }
    }
}

/// Read-only drift of one audit
#[derive(Debug, Clone, Serialize)]
pub struct DriftEntry {
    pub identity: AuditIdentity,
    pub compliant: bool,
    pub details: Vec<String>,
    /// Set when the probe itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of checking a category without remediating
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub category: String,
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    pub fn is_compliant(&self) -> bool {
        self.entries.iter().all(|e| e.compliant)
    }

    /// Entries that drifted or could not be probed
    pub fn drifted(&self) -> Vec<&DriftEntry> {
        self.entries.iter().filter(|e| !e.compliant).collect()
    }
}

/// Ordered audits of one category
pub struct AuditRunner {
    category: String,
    audits: Vec<Box<dyn Audit>>,
}

impl AuditRunner {
    pub fn new(category: impl Into<String>, audits: Vec<Box<dyn Audit>>) -> Self {
        Self {
            category: category.into(),
            audits,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn len(&self) -> usize {
        self.audits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audits.is_empty()
    }

    /// Converge every audit in order.
    ///
    /// `Failed` outcomes are recorded and the run continues. A fatal error
    /// stops the run: later audits are not executed and the partial report is
    /// returned inside [`Aborted`].
    pub fn run(&self) -> Result<ComplianceReport, Aborted> {
        let mut report = ComplianceReport::new(&self.category);
        info!(
            "Running category {} ({} audits)",
            self.category,
            self.audits.len()
        );

        for audit in &self.audits {
            let identity = audit.identity();
            let span = info_span!("audit", category = %self.category, audit = %identity);
            let _enter = span.enter();

            match audit.ensure_compliance() {
                Ok(outcome) => {
                    log_outcome(identity, &outcome);
                    report.record(identity.clone(), outcome);
                }
                Err(e) => {
                    error!(code = e.code(), "Aborting category {}: {}", self.category, e);
                    report.finish();
                    return Err(Aborted::new(vec![report], e));
                }
            }
        }

        report.finish();
        let summary = report.summary();
        info!(
            "Category {} finished: {} compliant, {} remediated, {} failed",
            self.category, summary.compliant, summary.remediated, summary.failed
        );
        Ok(report)
    }

    /// Probe every audit without remediating anything
    pub fn check(&self) -> DriftReport {
        let entries = self
            .audits
            .iter()
            .map(|audit| {
                let identity = audit.identity().clone();
                match audit.check() {
                    Ok(status) => {
                        debug!("{}: compliant={}", identity, status.compliant);
                        DriftEntry {
                            identity,
                            compliant: status.compliant,
                            details: status.details,
                            error: None,
                        }
                    }
                    Err(e) => {
                        error!("{}: {}", identity, e);
                        DriftEntry {
                            identity,
                            compliant: false,
                            details: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        DriftReport {
            category: self.category.clone(),
            entries,
        }
    }
}

fn log_outcome(identity: &AuditIdentity, outcome: &Outcome) {
    match outcome {
        Outcome::Compliant => debug!("{} compliant", identity),
        Outcome::Remediated => info!("{} remediated", identity),
        Outcome::Failed(reason) => error!("{} failed: {}", identity, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostguard_core::{AuditKind, ComplianceStatus, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Behavior {
        Compliant,
        Converges,
        RemediationFails,
        Fatal,
    }

    struct ScriptedAudit {
        identity: AuditIdentity,
        behavior: Behavior,
        fixed: AtomicBool,
        checks: Arc<AtomicUsize>,
    }

    impl ScriptedAudit {
        fn boxed(target: &str, behavior: Behavior, checks: Arc<AtomicUsize>) -> Box<dyn Audit> {
            Box::new(Self {
                identity: AuditIdentity::new(AuditKind::FileAttribute, target),
                behavior,
                fixed: AtomicBool::new(false),
                checks,
            })
        }
    }

    impl Audit for ScriptedAudit {
        fn identity(&self) -> &AuditIdentity {
            &self.identity
        }

        fn check(&self) -> Result<ComplianceStatus> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Compliant => Ok(ComplianceStatus::compliant()),
                _ if self.fixed.load(Ordering::SeqCst) => Ok(ComplianceStatus::compliant()),
                _ => Ok(ComplianceStatus::drift(vec!["drift".into()])),
            }
        }

        fn remediate(&self) -> Result<()> {
            match self.behavior {
                Behavior::RemediationFails => {
                    Err(Error::remediation(&self.identity.target, "EPERM"))
                }
                Behavior::Fatal => Err(Error::Fatal("apt-get not found".into())),
                _ => {
                    self.fixed.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    }

    fn runner(behaviors: [Behavior; 3], checks: &Arc<AtomicUsize>) -> AuditRunner {
        let audits = behaviors
            .iter()
            .enumerate()
            .map(|(i, b)| ScriptedAudit::boxed(&format!("/audit/{}", i + 1), *b, checks.clone()))
            .collect();
        AuditRunner::new("test", audits)
    }

    #[test]
    fn test_fatal_error_stops_the_run() {
        let checks = Arc::new(AtomicUsize::new(0));
        let runner = runner(
            [Behavior::Converges, Behavior::Fatal, Behavior::Compliant],
            &checks,
        );

        let aborted = runner.run().unwrap_err();
        assert!(aborted.error.is_fatal());
        assert_eq!(aborted.reports.len(), 1);
        let report = &aborted.reports[0];
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries[0].identity.target, "/audit/1");
        assert_eq!(report.entries[0].outcome, Outcome::Remediated);
        // audit 1: check + re-check, audit 2: check; audit 3 never probed
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remediation_failure_continues() {
        let checks = Arc::new(AtomicUsize::new(0));
        let runner = runner(
            [Behavior::Compliant, Behavior::RemediationFails, Behavior::Converges],
            &checks,
        );

        let report = runner.run().unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report.entries[0].outcome, Outcome::Compliant);
        assert!(report.entries[1].outcome.is_failed());
        assert_eq!(report.entries[2].outcome, Outcome::Remediated);
        assert!(report.finished_at.is_some());
        assert!(!report.is_success());
    }

    #[test]
    fn test_check_never_remediates() {
        let checks = Arc::new(AtomicUsize::new(0));
        let runner = runner(
            [Behavior::Compliant, Behavior::Fatal, Behavior::Converges],
            &checks,
        );

        let drift = runner.check();
        assert_eq!(drift.entries.len(), 3);
        assert_eq!(drift.drifted().len(), 2);
        assert!(!drift.is_compliant());
        // a second pass sees the same drift
        assert_eq!(runner.check().drifted().len(), 2);
    }
}
