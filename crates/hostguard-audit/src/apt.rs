//! Debian family backend: dpkg-query, apt-get and apt-config

use crate::atomic::replace_file;
use crate::mode::{FileAttributes, ModeRule};
use crate::package::{run_command, PackageManager, PackageManagerKind, Purpose};
use hostguard_common::RetryPolicy;
use hostguard_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// apt-get exits with this code when it cannot take the dpkg lock (and on other errors)
const APT_ERROR_EXIT: i32 = 100;

/// Built-in values of options `apt-config dump` omits when unset
const APT_DEFAULTS: &[(&str, &str)] = &[
    ("APT::Get::AllowUnauthenticated", "false"),
    ("APT::Get::AllowDowngrades", "false"),
    ("APT::Get::AllowRemoveEssential", "false"),
    ("APT::Install-Recommends", "true"),
    ("APT::Install-Suggests", "false"),
    ("Acquire::AllowInsecureRepositories", "false"),
    ("Acquire::AllowDowngradeToInsecureRepositories", "false"),
];

/// apt/dpkg package manager. Configuration entries are written to a single
/// drop-in file owned by hostguard.
#[derive(Debug, Clone)]
pub struct Apt {
    conf_file: PathBuf,
    retry: RetryPolicy,
}

impl Apt {
    pub fn new(conf_file: impl Into<PathBuf>) -> Self {
        Self {
            conf_file: conf_file.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Retry schedule used when the dpkg lock is held by another process
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn purge_once(&self, packages: &BTreeSet<String>) -> Result<()> {
        let mut args = vec!["purge", "-y", "-q"];
        args.extend(packages.iter().map(String::as_str));
        let output = run_command("apt-get", &args, Purpose::Mutate)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.code() == Some(APT_ERROR_EXIT) && is_lock_error(&stderr) {
            return Err(Error::PackageManagerLocked {
                manager: "apt".into(),
            });
        }
        Err(Error::remediation(
            "apt-get purge",
            format!("exit {:?}: {}", output.status.code(), stderr.trim()),
        ))
    }
}

impl PackageManager for Apt {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Apt
    }

    fn installed(&self, packages: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if packages.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut args = vec!["-W", "-f", "${Package}\t${Status}\n"];
        args.extend(packages.iter().map(String::as_str));
        let output = run_command("dpkg-query", &args, Purpose::Probe)?;

        // exit 1 only means some of the queried packages are unknown
        if !matches!(output.status.code(), Some(0) | Some(1)) {
            return Err(Error::probe(
                "dpkg-query",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_dpkg_status(&String::from_utf8_lossy(&output.stdout))
            .intersection(packages)
            .cloned()
            .collect())
    }

    fn purge(&self, packages: &BTreeSet<String>) -> Result<()> {
        self.retry
            .run(|| self.purge_once(packages), Error::is_retryable)
    }

    fn config_values(&self) -> Result<BTreeMap<String, String>> {
        let output = run_command("apt-config", &["dump"], Purpose::Probe)?;
        if !output.status.success() {
            return Err(Error::probe(
                "apt-config",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_apt_config(&String::from_utf8_lossy(&output.stdout)))
    }

    fn default_value(&self, key: &str) -> Option<&'static str> {
        APT_DEFAULTS
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }

    fn set_config(&self, entries: &[(String, String)]) -> Result<()> {
        let existing = match std::fs::read_to_string(&self.conf_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(Error::remediation(
                    self.conf_file.display().to_string(),
                    e.to_string(),
                ))
            }
        };
        debug!("Updating {}", self.conf_file.display());
        let updated = update_apt_conf(&existing, entries);
        replace_file(
            &self.conf_file,
            updated.as_bytes(),
            &FileAttributes::new(ModeRule::Exact(0o644)),
        )
    }
}

fn is_lock_error(stderr: &str) -> bool {
    stderr.contains("Could not get lock") || stderr.contains("Unable to acquire the dpkg")
}

/// Installed package names from `dpkg-query -W -f '${Package}\t${Status}\n'`
pub fn parse_dpkg_status(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, status)| {
            status.trim().ends_with(" installed") && !status.contains("not-installed")
        })
        .map(|(name, _)| name.trim().to_string())
        .collect()
}

/// `key "value";` lines from `apt-config dump`
pub fn parse_apt_config(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(parse_apt_line)
        .collect()
}

fn parse_apt_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once(char::is_whitespace)?;
    let value = value.trim().trim_end_matches(';').trim().trim_matches('"');
    Some((key.to_string(), value.to_string()))
}

/// Rewrite `entries` in an apt.conf fragment, keeping every other line
pub fn update_apt_conf(existing: &str, entries: &[(String, String)]) -> String {
    let mut pending: BTreeMap<&str, &str> = entries
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for line in existing.lines() {
        let replaced = parse_apt_line(line)
            .and_then(|(key, _)| pending.remove_entry(key.as_str()))
            .map(|(key, value)| format_apt_entry(key, value));
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }

    for (key, value) in entries {
        if pending.contains_key(key.as_str()) {
            lines.push(format_apt_entry(key, value));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn format_apt_entry(key: &str, value: &str) -> String {
    format!("{} \"{}\";", key, value)
}
