//! Resource probes - read the live state of files and accounts

use hostguard_core::{Error, Result};
use nix::unistd::{Gid, Group, Uid, User};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

/// Ownership and permission bits of one path, read without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub uid: u32,
    pub gid: u32,
    /// Permission bits including setuid/setgid/sticky
    pub mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Stat `path`; `Ok(None)` when it does not exist
pub fn file_state(path: &Path) -> Result<Option<FileState>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(FileState {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.permissions().mode() & 0o7777,
            is_dir: meta.is_dir(),
            is_symlink: meta.file_type().is_symlink(),
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::probe(path.display().to_string(), e.to_string())),
    }
}

/// Read the full content of `path`; `Ok(None)` when it does not exist
pub fn file_content(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::probe(path.display().to_string(), e.to_string())),
    }
}

/// A user or group resolved to its numeric id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub id: u32,
}

impl Principal {
    /// Resolve a user name; unknown names are a policy error
    pub fn user(name: &str) -> Result<Self> {
        match User::from_name(name) {
            Ok(Some(user)) => Ok(Self {
                name: name.to_string(),
                id: user.uid.as_raw(),
            }),
            Ok(None) => Err(Error::InvalidPolicy {
                key: "owner".into(),
                message: format!("unknown user '{}'", name),
            }),
            Err(e) => Err(Error::probe(format!("user {}", name), e.to_string())),
        }
    }

    /// Resolve a group name; unknown names are a policy error
    pub fn group(name: &str) -> Result<Self> {
        match Group::from_name(name) {
            Ok(Some(group)) => Ok(Self {
                name: name.to_string(),
                id: group.gid.as_raw(),
            }),
            Ok(None) => Err(Error::InvalidPolicy {
                key: "group".into(),
                message: format!("unknown group '{}'", name),
            }),
            Err(e) => Err(Error::probe(format!("group {}", name), e.to_string())),
        }
    }
}

/// Display name for a uid, falling back to the number
pub fn user_name(uid: u32) -> String {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| uid.to_string())
}

/// Display name for a gid, falling back to the number
pub fn group_name(gid: u32) -> String {
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name)
        .unwrap_or_else(|| gid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_path_is_none() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("absent");
        assert_eq!(file_state(&path).unwrap(), None);
        assert_eq!(file_content(&path).unwrap(), None);
    }

    #[test]
    fn test_file_state_reads_mode_and_owner() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("shadow");
        fs::write(&path, b"root:*:19000::::::\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let state = file_state(&path).unwrap().unwrap();
        assert_eq!(state.mode, 0o640);
        assert_eq!(state.uid, Uid::effective().as_raw());
        assert!(!state.is_dir);
        assert!(!state.is_symlink);
    }

    #[test]
    fn test_unknown_user_is_policy_error() {
        let err = Principal::user("no-such-user-hostguard").unwrap_err();
        assert_eq!(err.code(), "INVALID_POLICY");
    }
}
