//! Expected file attributes and the order in which they are applied

use crate::probe::{self, FileState, Principal};
use hostguard_core::{Error, Result};
use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

/// How the permission bits of a path are constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRule {
    /// Bits must equal this mode
    Exact(u32),
    /// These bits must be clear; all others are left alone
    Without(u32),
}

impl ModeRule {
    /// Mode the path should have given its current mode
    pub fn target(&self, current: u32) -> u32 {
        match self {
            ModeRule::Exact(mode) => *mode,
            ModeRule::Without(bits) => current & !bits,
        }
    }

    pub fn is_satisfied(&self, current: u32) -> bool {
        self.target(current) == current
    }
}

impl fmt::Display for ModeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeRule::Exact(mode) => write!(f, "{:04o}", mode),
            ModeRule::Without(bits) => write!(f, "without {:04o}", bits),
        }
    }
}

/// Owner, group and mode expected on a path. Absent owner/group are not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub owner: Option<Principal>,
    pub group: Option<Principal>,
    pub mode: ModeRule,
}

impl FileAttributes {
    pub fn new(mode: ModeRule) -> Self {
        Self {
            owner: None,
            group: None,
            mode,
        }
    }

    /// `owner:group` with an exact mode, names resolved now
    pub fn owned(owner: &str, group: &str, mode: u32) -> Result<Self> {
        Ok(Self {
            owner: Some(Principal::user(owner)?),
            group: Some(Principal::group(group)?),
            mode: ModeRule::Exact(mode),
        })
    }

    pub fn with_owner(mut self, owner: Principal) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_group(mut self, group: Principal) -> Self {
        self.group = Some(group);
        self
    }

    /// Describe every way `state` differs from these attributes
    pub fn drift(&self, state: &FileState) -> Vec<String> {
        let mut details = Vec::new();
        if let Some(owner) = &self.owner {
            if owner.id != state.uid {
                details.push(format!(
                    "owner {} != {}",
                    probe::user_name(state.uid),
                    owner.name
                ));
            }
        }
        if let Some(group) = &self.group {
            if group.id != state.gid {
                details.push(format!(
                    "group {} != {}",
                    probe::group_name(state.gid),
                    group.name
                ));
            }
        }
        if !self.mode.is_satisfied(state.mode) {
            details.push(format!("mode {:04o} != {}", state.mode, self.mode));
        }
        details
    }

    fn ownership_change(&self, state: &FileState) -> (Option<u32>, Option<u32>) {
        let uid = self.owner.as_ref().map(|o| o.id).filter(|id| *id != state.uid);
        let gid = self.group.as_ref().map(|g| g.id).filter(|id| *id != state.gid);
        (uid, gid)
    }
}

/// The first chmod to issue: drop every bit the target does not keep.
///
/// `None` when the current mode has no bits outside the target.
pub fn narrowing_step(current: u32, rule: ModeRule) -> Option<u32> {
    let narrowed = current & rule.target(current);
    (narrowed != current).then_some(narrowed)
}

/// Bring `path` to `attrs` without passing through a mode wider than both the
/// original and the target: narrow first, then chown, then set the final mode.
pub fn apply_attributes(path: &Path, attrs: &FileAttributes) -> Result<()> {
    let target = path.display().to_string();
    let state = probe::file_state(path)?
        .ok_or_else(|| Error::remediation(&target, "path disappeared"))?;

    if let Some(mode) = narrowing_step(state.mode, attrs.mode) {
        debug!("{}: narrowing mode {:04o} -> {:04o}", target, state.mode, mode);
        set_mode(path, mode)?;
    }

    let (uid, gid) = attrs.ownership_change(&state);
    if uid.is_some() || gid.is_some() {
        debug!("{}: chown {:?}:{:?}", target, uid, gid);
        std::os::unix::fs::chown(path, uid, gid)
            .map_err(|e| Error::remediation(&target, format!("chown: {}", e)))?;
    }

    // chown may clear setuid/setgid, so re-read before the final chmod
    let state = probe::file_state(path)?
        .ok_or_else(|| Error::remediation(&target, "path disappeared"))?;
    let mode = attrs.mode.target(state.mode);
    if mode != state.mode {
        debug!("{}: mode {:04o} -> {:04o}", target, state.mode, mode);
        set_mode(path, mode)?;
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::remediation(path.display().to_string(), format!("chmod: {}", e)))
}
