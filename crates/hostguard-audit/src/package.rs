//! Package-manager capability and the two package audits

use hostguard_core::{Audit, AuditIdentity, AuditKind, ComplianceStatus, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::ErrorKind;
use std::process::{Command, Output};
use std::sync::Arc;
use tracing::{debug, info};

/// Package-manager family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    Apt,
    Dnf,
}

impl PackageManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerKind::Apt => "apt",
            PackageManagerKind::Dnf => "dnf",
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the package audits need from the system package manager
pub trait PackageManager: Send + Sync {
    fn kind(&self) -> PackageManagerKind;

    /// The subset of `packages` currently installed
    fn installed(&self, packages: &BTreeSet<String>) -> Result<BTreeSet<String>>;

    /// Remove `packages` including their configuration
    fn purge(&self, packages: &BTreeSet<String>) -> Result<()>;

    /// Every currently configured key, read in one pass
    fn config_values(&self) -> Result<BTreeMap<String, String>>;

    /// Value the manager assumes when `key` is not configured
    fn default_value(&self, _key: &str) -> Option<&'static str> {
        None
    }

    /// Write these entries, leaving unrelated configuration alone
    fn set_config(&self, entries: &[(String, String)]) -> Result<()>;
}

/// Whether a subprocess is reading state or changing it; decides how a
/// missing binary is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Purpose {
    Probe,
    Mutate,
}

/// Run `program` and capture its output. A missing binary is a probe error
/// while reading state and fatal while changing it.
pub(crate) fn run_command(program: &str, args: &[&str], purpose: Purpose) -> Result<Output> {
    debug!("Running {} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args).env("LC_ALL", "C");
    if program == "apt-get" {
        command.env("DEBIAN_FRONTEND", "noninteractive");
    }

    match command.output() {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == ErrorKind::NotFound => match purpose {
            Purpose::Probe => Err(Error::probe(program, "command not found")),
            Purpose::Mutate => Err(Error::Fatal(format!("{} not found", program))),
        },
        Err(e) => match purpose {
            Purpose::Probe => Err(Error::probe(program, e.to_string())),
            Purpose::Mutate => Err(Error::remediation(program, e.to_string())),
        },
    }
}

/// Canonical form for comparing configuration values: surrounding whitespace
/// and quotes stripped, boolean spellings folded to `true`/`false`.
pub fn normalize_value(value: &str) -> String {
    let trimmed = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => "true".into(),
        "false" | "no" | "off" | "0" => "false".into(),
        _ => trimmed.to_string(),
    }
}

/// Package manager configuration entries
#[derive(Clone)]
pub struct PackageConfigAudit {
    identity: AuditIdentity,
    entries: Vec<(String, String)>,
    manager: Arc<dyn PackageManager>,
}

impl PackageConfigAudit {
    pub fn new(entries: Vec<(String, String)>, manager: Arc<dyn PackageManager>) -> Self {
        let target = format!(
            "{}:{}",
            manager.kind(),
            entries
                .iter()
                .map(|(k, _)| k.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        Self {
            identity: AuditIdentity::new(AuditKind::PackageConfig, target),
            entries,
            manager,
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Entries whose effective value differs from the expected one, with
    /// the configured value if there is one
    fn drifted(&self) -> Result<Vec<(&(String, String), Option<String>)>> {
        let mut current = self.manager.config_values()?;
        let mut drifted = Vec::new();
        for entry in &self.entries {
            let actual = current.remove(&entry.0);
            let effective = actual
                .as_deref()
                .or_else(|| self.manager.default_value(&entry.0));
            let matches = effective
                .map(|v| normalize_value(v) == normalize_value(&entry.1))
                .unwrap_or(false);
            if !matches {
                drifted.push((entry, actual));
            }
        }
        Ok(drifted)
    }
}

impl Audit for PackageConfigAudit {
    fn identity(&self) -> &AuditIdentity {
        &self.identity
    }

    fn check(&self) -> Result<ComplianceStatus> {
        let details = self
            .drifted()?
            .into_iter()
            .map(|((key, expected), actual)| {
                format!(
                    "{} = {} (expected {})",
                    key,
                    actual.as_deref().unwrap_or("<unset>"),
                    expected
                )
            })
            .collect();
        Ok(ComplianceStatus::drift(details))
    }

    fn remediate(&self) -> Result<()> {
        let entries: Vec<(String, String)> = self
            .drifted()?
            .into_iter()
            .map(|(entry, _)| entry.clone())
            .collect();
        info!("Setting {} {} configuration entries", entries.len(), self.manager.kind());
        self.manager.set_config(&entries)
    }
}

/// Packages that must not be installed
#[derive(Clone)]
pub struct PackagePresenceAudit {
    identity: AuditIdentity,
    forbidden: BTreeSet<String>,
    manager: Arc<dyn PackageManager>,
}

impl PackagePresenceAudit {
    pub fn new(forbidden: BTreeSet<String>, manager: Arc<dyn PackageManager>) -> Self {
        let target = forbidden.iter().cloned().collect::<Vec<_>>().join(",");
        Self {
            identity: AuditIdentity::new(AuditKind::PackagePresence, target),
            forbidden,
            manager,
        }
    }

    pub fn forbidden(&self) -> &BTreeSet<String> {
        &self.forbidden
    }
}

impl Audit for PackagePresenceAudit {
    fn identity(&self) -> &AuditIdentity {
        &self.identity
    }

    fn check(&self) -> Result<ComplianceStatus> {
        let details = self
            .manager
            .installed(&self.forbidden)?
            .into_iter()
            .map(|p| format!("{} is installed", p))
            .collect();
        Ok(ComplianceStatus::drift(details))
    }

    fn remediate(&self) -> Result<()> {
        let installed = self.manager.installed(&self.forbidden)?;
        if installed.is_empty() {
            return Ok(());
        }
        info!(
            "Purging {} forbidden package(s): {}",
            installed.len(),
            installed.iter().cloned().collect::<Vec<_>>().join(" ")
        );
        self.manager.purge(&installed)
    }
}

impl fmt::Debug for PackageConfigAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageConfigAudit")
            .field("manager", &self.manager.kind())
            .field("entries", &self.entries)
            .finish()
    }
}

impl fmt::Debug for PackagePresenceAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagePresenceAudit")
            .field("manager", &self.manager.kind())
            .field("forbidden", &self.forbidden)
            .finish()
    }
}
