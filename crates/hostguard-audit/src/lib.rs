//! HostGuard Audit - Probes, audit variants and the category runner
//!
//! This crate turns declared policy into converging checks:
//! - File attribute audits (owner, group, mode over paths and trees)
//! - Content audits (rendered files replaced atomically)
//! - Package configuration and forbidden-package audits over apt or dnf
//! - `AuditRunner`, which executes a category's audits in order
//!
//! # Example
//!
//! ```no_run
//! use hostguard_audit::{AuditRunner, FileAttributeAudit, FileAttributes};
//! use hostguard_core::Audit;
//!
//! let attrs = FileAttributes::owned("root", "root", 0o600)?;
//! let shadow = FileAttributeAudit::new("/etc/shadow", attrs);
//! let runner = AuditRunner::new("minimize-access", vec![Box::new(shadow) as Box<dyn Audit>]);
//!
//! let report = runner.run()?;
//! println!("{} remediated", report.summary().remediated);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod apt;
pub mod atomic;
pub mod content;
pub mod dnf;
pub mod file;
pub mod mode;
pub mod package;
pub mod probe;
pub mod runner;

pub use apt::Apt;
pub use atomic::{replace_file, StagedFile};
pub use content::ContentAudit;
pub use dnf::Dnf;
pub use file::FileAttributeAudit;
pub use mode::{FileAttributes, ModeRule};
pub use package::{
    normalize_value, PackageConfigAudit, PackageManager, PackageManagerKind, PackagePresenceAudit,
};
pub use probe::Principal;
pub use runner::{Aborted, AuditRunner, DriftEntry, DriftReport};
