//! HostGuard Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions used throughout HostGuard:
//! - `Audit`: The trait every compliance check implements, including the
//!   shared check/remediate/re-probe convergence logic
//! - `Outcome`, `ComplianceStatus`: Per-audit results
//! - `ComplianceReport`: Ordered outcomes of one category run
//! - `Error`: The error taxonomy (probe, policy, render, remediation, fatal)

pub mod audit;
pub mod error;
pub mod report;

// Re-export commonly used types at crate root
pub use audit::{Audit, AuditIdentity, AuditKind, ComplianceStatus, Outcome};
pub use error::{Error, ErrorKind, Result};
pub use report::{ComplianceReport, ReportEntry, ReportSummary, RunStatus};
