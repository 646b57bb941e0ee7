//! File attribute audit - owner, group and mode over one path or a set of paths

use crate::mode::{apply_attributes, FileAttributes};
use crate::probe::{self, FileState};
use hostguard_core::{Audit, AuditIdentity, AuditKind, ComplianceStatus, Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Enforces [`FileAttributes`] on every listed path.
///
/// Missing paths are skipped unless the audit is `required`. With `recursive`
/// set, directories are walked and every entry below them is covered as well;
/// symlinks are never followed or modified.
#[derive(Debug, Clone)]
pub struct FileAttributeAudit {
    identity: AuditIdentity,
    paths: Vec<PathBuf>,
    attrs: FileAttributes,
    recursive: bool,
    required: bool,
}

impl FileAttributeAudit {
    pub fn new(path: impl Into<PathBuf>, attrs: FileAttributes) -> Self {
        Self::for_paths(vec![path.into()], attrs)
    }

    pub fn for_paths(paths: Vec<PathBuf>, attrs: FileAttributes) -> Self {
        let target = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            identity: AuditIdentity::new(AuditKind::FileAttribute, target),
            paths,
            attrs,
            recursive: false,
            required: false,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn attributes(&self) -> &FileAttributes {
        &self.attrs
    }

    /// Every existing path this audit covers, with its state
    fn expand(&self) -> Result<Vec<(PathBuf, FileState)>> {
        let mut covered = Vec::new();
        for path in &self.paths {
            let Some(state) = probe::file_state(path)? else {
                debug!("{} does not exist, skipping", path.display());
                continue;
            };
            if state.is_symlink {
                debug!("{} is a symlink, skipping", path.display());
                continue;
            }
            covered.push((path.clone(), state));

            if self.recursive && state.is_dir {
                self.walk(path, &mut covered)?;
            }
        }
        Ok(covered)
    }

    fn walk(&self, root: &Path, covered: &mut Vec<(PathBuf, FileState)>) -> Result<()> {
        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| Error::probe(root.display().to_string(), e.to_string()))?;
            if entry.path_is_symlink() {
                continue;
            }
            if let Some(state) = probe::file_state(entry.path())? {
                covered.push((entry.into_path(), state));
            }
        }
        Ok(())
    }

    fn missing_required(&self) -> Vec<&PathBuf> {
        if !self.required {
            return Vec::new();
        }
        self.paths.iter().filter(|p| !p.exists()).collect()
    }
}

impl Audit for FileAttributeAudit {
    fn identity(&self) -> &AuditIdentity {
        &self.identity
    }

    fn check(&self) -> Result<ComplianceStatus> {
        let mut details: Vec<String> = self
            .missing_required()
            .into_iter()
            .map(|p| format!("{}: required path is missing", p.display()))
            .collect();

        for (path, state) in self.expand()? {
            for drift in self.attrs.drift(&state) {
                details.push(format!("{}: {}", path.display(), drift));
            }
        }
        Ok(ComplianceStatus::drift(details))
    }

    fn remediate(&self) -> Result<()> {
        if let Some(path) = self.missing_required().first() {
            return Err(Error::remediation(
                path.display().to_string(),
                "required path is missing",
            ));
        }

        let mut failures = Vec::new();
        for (path, state) in self.expand()? {
            if self.attrs.drift(&state).is_empty() {
                continue;
            }
            if let Err(e) = apply_attributes(&path, &self.attrs) {
                warn!("{}", e);
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::remediation(&self.identity.target, failures.join("; ")))
        }
    }
}
