//! Audit trait and identity - the contract every compliance check implements

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// The kind of resource an audit converges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    /// Owner, group and permission bits of one or more paths
    FileAttribute,
    /// Rendered file content plus its attributes
    Content,
    /// Package manager configuration entries
    PackageConfig,
    /// Packages that must not be installed
    PackagePresence,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::FileAttribute => "file-attribute",
            AuditKind::Content => "content",
            AuditKind::PackageConfig => "package-config",
            AuditKind::PackagePresence => "package-presence",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies an audit as `(kind, target)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditIdentity {
    pub kind: AuditKind,
    /// Path, package set or configuration key set this audit covers
    pub target: String,
}

impl AuditIdentity {
    pub fn new(kind: AuditKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

impl fmt::Display for AuditIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.target)
    }
}

/// Result of a read-only `check()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub compliant: bool,
    /// One entry per detected drift (empty when compliant)
    pub details: Vec<String>,
}

impl ComplianceStatus {
    pub fn compliant() -> Self {
        Self {
            compliant: true,
            details: Vec::new(),
        }
    }

    /// Build a status from collected drift; no drift means compliant
    pub fn drift(details: Vec<String>) -> Self {
        Self {
            compliant: details.is_empty(),
            details,
        }
    }
}

/// Terminal state of one `ensure_compliance` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// No action needed
    Compliant,
    /// Remediation applied and confirmed by a re-probe
    Remediated,
    /// Probe or remediation failed, or remediation did not converge
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Compliant => "compliant",
            Outcome::Remediated => "remediated",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// The trait every audit variant implements.
///
/// Implementors provide a read-only [`Audit::check`] and a variant specific
/// [`Audit::remediate`]. The convergence state machine
/// `Start -> Probed -> {Compliant | Remediating -> Reprobed -> {Remediated | Failed}}`
/// lives in [`Audit::ensure_compliance`] and is shared by all variants.
pub trait Audit: Send + Sync {
    /// `(kind, target)` of this audit
    fn identity(&self) -> &AuditIdentity;

    /// Probe actual state and compare with the expected state.
    ///
    /// Must not mutate the host.
    fn check(&self) -> Result<ComplianceStatus>;

    /// Apply the variant specific correction.
    ///
    /// Only called after `check()` reported drift.
    fn remediate(&self) -> Result<()>;

    /// Check, remediate on drift, and re-probe to confirm convergence.
    ///
    /// Only errors of kind `Fatal` are returned as `Err`; everything else is
    /// recorded as [`Outcome::Failed`]. There is no retry loop here.
    fn ensure_compliance(&self) -> Result<Outcome> {
        let identity = self.identity();

        let status = match self.check() {
            Ok(status) => status,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(Outcome::Failed(e.to_string())),
        };

        if status.compliant {
            return Ok(Outcome::Compliant);
        }

        debug!("{} drifted: {}", identity, status.details.join("; "));

        match self.remediate() {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(Outcome::Failed(e.to_string())),
        }

        match self.check() {
            Ok(status) if status.compliant => Ok(Outcome::Remediated),
            Ok(status) => {
                warn!("{} did not converge after remediation", identity);
                Ok(Outcome::Failed(format!(
                    "remediation did not converge: {}",
                    status.details.join("; ")
                )))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(Outcome::Failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Audit over an in-memory value, with switchable failure modes
    struct ValueAudit {
        identity: AuditIdentity,
        expected: u32,
        actual: Mutex<u32>,
        remediation_error: Option<fn() -> Error>,
        sticky: bool,
    }

    impl ValueAudit {
        fn new(actual: u32, expected: u32) -> Self {
            Self {
                identity: AuditIdentity::new(AuditKind::FileAttribute, "/tmp/value"),
                expected,
                actual: Mutex::new(actual),
                remediation_error: None,
                sticky: false,
            }
        }
    }

    impl Audit for ValueAudit {
        fn identity(&self) -> &AuditIdentity {
            &self.identity
        }

        fn check(&self) -> Result<ComplianceStatus> {
            let actual = *self.actual.lock().unwrap();
            if actual == self.expected {
                Ok(ComplianceStatus::compliant())
            } else {
                Ok(ComplianceStatus::drift(vec![format!(
                    "value {} != {}",
                    actual, self.expected
                )]))
            }
        }

        fn remediate(&self) -> Result<()> {
            if let Some(make) = self.remediation_error {
                return Err(make());
            }
            if !self.sticky {
                *self.actual.lock().unwrap() = self.expected;
            }
            Ok(())
        }
    }

    #[test]
    fn test_compliant_has_no_side_effect() {
        let audit = ValueAudit::new(1, 1);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Compliant);
    }

    #[test]
    fn test_remediated_then_compliant() {
        let audit = ValueAudit::new(0o644, 0o600);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Remediated);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Compliant);
    }

    #[test]
    fn test_remediation_error_becomes_failed() {
        let mut audit = ValueAudit::new(0, 1);
        audit.remediation_error = Some(|| Error::remediation("/tmp/value", "EPERM"));
        let outcome = audit.ensure_compliance().unwrap();
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_fatal_error_propagates() {
        let mut audit = ValueAudit::new(0, 1);
        audit.remediation_error = Some(|| Error::Fatal("no mechanism".into()));
        let err = audit.ensure_compliance().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_convergence_is_failed() {
        let mut audit = ValueAudit::new(0, 1);
        audit.sticky = true;
        match audit.ensure_compliance().unwrap() {
            Outcome::Failed(reason) => assert!(reason.contains("did not converge")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_identity_display() {
        let id = AuditIdentity::new(AuditKind::Content, "/etc/login.defs");
        assert_eq!(id.to_string(), "content:/etc/login.defs");
    }
}
