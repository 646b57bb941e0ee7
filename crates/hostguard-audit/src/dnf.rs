//! Red Hat family backend: rpm, dnf and the `[main]` section of dnf.conf

use crate::atomic::replace_file;
use crate::mode::{FileAttributes, ModeRule};
use crate::package::{run_command, PackageManager, PackageManagerKind, Purpose};
use hostguard_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

const MAIN_SECTION: &str = "main";

/// dnf.conf(5) defaults for `[main]` options hostguard may manage
const DNF_DEFAULTS: &[(&str, &str)] = &[
    ("gpgcheck", "false"),
    ("localpkg_gpgcheck", "false"),
    ("repo_gpgcheck", "false"),
    ("clean_requirements_on_remove", "true"),
    ("installonly_limit", "3"),
    ("skip_if_unavailable", "false"),
];

#[derive(Debug, Clone)]
pub struct Dnf {
    conf_file: PathBuf,
}

impl Dnf {
    pub fn new(conf_file: impl Into<PathBuf>) -> Self {
        Self {
            conf_file: conf_file.into(),
        }
    }

    fn read_conf(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.conf_file) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::probe(self.conf_file.display().to_string(), e.to_string())),
        }
    }
}

impl PackageManager for Dnf {
    fn kind(&self) -> PackageManagerKind {
        PackageManagerKind::Dnf
    }

    fn installed(&self, packages: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if packages.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut args = vec!["-q", "--queryformat", "%{NAME}\n"];
        args.extend(packages.iter().map(String::as_str));
        // rpm exits with the number of packages that are not installed, so
        // the status alone cannot tell a failed query from absent packages
        let output = run_command("rpm", &args, Purpose::Probe)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_rpm_query(&stdout, packages).map_err(|unanswered| {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("no answer for {}", unanswered.join(", "))
            } else {
                stderr
            };
            Error::probe("rpm", message)
        })
    }

    fn purge(&self, packages: &BTreeSet<String>) -> Result<()> {
        let mut args = vec!["remove", "-y", "-q"];
        args.extend(packages.iter().map(String::as_str));
        let output = run_command("dnf", &args, Purpose::Mutate)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::remediation(
                "dnf remove",
                format!(
                    "exit {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }

    fn config_values(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .read_conf()?
            .map(|content| parse_main_section(&content))
            .unwrap_or_default())
    }

    fn default_value(&self, key: &str) -> Option<&'static str> {
        DNF_DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn set_config(&self, entries: &[(String, String)]) -> Result<()> {
        let existing = self.read_conf().map_err(|e| match e {
            Error::Probe { target, message } => Error::Remediation { target, message },
            other => other,
        })?;
        let updated = update_main_section(existing.as_deref().unwrap_or_default(), entries);
        replace_file(
            &self.conf_file,
            updated.as_bytes(),
            &FileAttributes::new(ModeRule::Exact(0o644)),
        )
    }
}

/// Installed subset of `queried` from `rpm -q --queryformat '%{NAME}\n'`.
///
/// rpm answers each name with either the name itself or `package X is not
/// installed`. Names with neither answer are returned as the error.
pub fn parse_rpm_query(
    output: &str,
    queried: &BTreeSet<String>,
) -> std::result::Result<BTreeSet<String>, Vec<String>> {
    let mut installed = BTreeSet::new();
    let mut absent = BTreeSet::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line
            .strip_prefix("package ")
            .and_then(|rest| rest.strip_suffix(" is not installed"))
        {
            Some(name) => absent.insert(name.to_string()),
            None => installed.insert(line.to_string()),
        };
    }

    let unanswered: Vec<String> = queried
        .iter()
        .filter(|name| !installed.contains(*name) && !absent.contains(*name))
        .cloned()
        .collect();
    if !unanswered.is_empty() {
        return Err(unanswered);
    }
    Ok(installed.intersection(queried).cloned().collect())
}

fn section_name(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

fn parse_ini_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') || line.starts_with(';') {
        return None;
    }
    line.split_once('=').map(|(k, v)| (k.trim(), v.trim()))
}

/// `key=value` pairs of the `[main]` section
pub fn parse_main_section(content: &str) -> BTreeMap<String, String> {
    let mut in_main = false;
    let mut values = BTreeMap::new();
    for line in content.lines() {
        if let Some(name) = section_name(line) {
            in_main = name == MAIN_SECTION;
            continue;
        }
        if in_main {
            if let Some((key, value)) = parse_ini_line(line) {
                values.insert(key.to_string(), value.to_string());
            }
        }
    }
    values
}

/// Set `entries` inside `[main]`, creating the section if needed. Other
/// sections and unrelated keys are kept as they are.
pub fn update_main_section(existing: &str, entries: &[(String, String)]) -> String {
    let mut pending: BTreeMap<&str, &str> = entries
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let mut lines: Vec<String> = Vec::new();
    let mut in_main = false;
    let mut saw_main = false;

    for line in existing.lines() {
        if let Some(name) = section_name(line) {
            if in_main {
                flush_pending(&mut lines, &mut pending, entries);
            }
            in_main = name == MAIN_SECTION;
            saw_main |= in_main;
            lines.push(line.to_string());
            continue;
        }
        let replaced = if in_main {
            parse_ini_line(line)
                .and_then(|(key, _)| pending.remove_entry(key))
                .map(|(key, value)| format!("{}={}", key, value))
        } else {
            None
        };
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }

    if in_main {
        flush_pending(&mut lines, &mut pending, entries);
    } else if !saw_main {
        lines.push(format!("[{}]", MAIN_SECTION));
        flush_pending(&mut lines, &mut pending, entries);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn flush_pending(
    lines: &mut Vec<String>,
    pending: &mut BTreeMap<&str, &str>,
    entries: &[(String, String)],
) {
    for (key, value) in entries {
        if pending.remove(key.as_str()).is_some() {
            lines.push(format!("{}={}", key, value));
        }
    }
}
