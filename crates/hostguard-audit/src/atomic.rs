//! Staged writes: content and attributes are prepared in a temp file next to
//! the target, which is then renamed over it in one step.

use crate::mode::{FileAttributes, ModeRule};
use crate::probe;
use hostguard_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Mode used as the base for a `Without` rule when the target does not exist yet
const DEFAULT_FILE_MODE: u32 = 0o644;

/// A fully prepared replacement for `target`.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] removes the
/// temp file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Write `content` to a temp file in the target's directory and give it
    /// the expected owner, group and mode.
    pub fn stage(target: &Path, content: &[u8], attrs: &FileAttributes) -> Result<Self> {
        let name = target.display().to_string();
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        if !parent.exists() {
            debug!("Creating directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| {
                Error::remediation(&name, format!("create {}: {}", parent.display(), e))
            })?;
        }

        // NamedTempFile is created 0600, so the content is never more exposed
        // than the final file while attributes are being set.
        let mut temp = tempfile::Builder::new()
            .prefix(".hostguard-")
            .tempfile_in(parent)
            .map_err(|e| Error::remediation(&name, format!("create temp file: {}", e)))?;

        let fail =
            |step: &str, e: std::io::Error| Error::remediation(&name, format!("{}: {}", step, e));

        temp.write_all(content).map_err(|e| fail("write", e))?;

        let file = temp.as_file();
        let uid = attrs.owner.as_ref().map(|o| o.id);
        let gid = attrs.group.as_ref().map(|g| g.id);
        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::fchown(file, uid, gid).map_err(|e| fail("chown", e))?;
        }

        let base = match attrs.mode {
            ModeRule::Exact(_) => 0,
            ModeRule::Without(_) => probe::file_state(target)?
                .filter(|s| !s.is_symlink)
                .map(|s| s.mode)
                .unwrap_or(DEFAULT_FILE_MODE),
        };
        file.set_permissions(fs::Permissions::from_mode(attrs.mode.target(base)))
            .map_err(|e| fail("chmod", e))?;
        file.sync_all().map_err(|e| fail("sync", e))?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Location of the staged temp file
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically rename the staged file over the target
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| {
            Error::remediation(target.display().to_string(), format!("rename: {}", e.error))
        })?;
        debug!("Replaced {}", target.display());
        Ok(())
    }
}

/// Stage and commit in one call
pub fn replace_file(target: &Path, content: &[u8], attrs: &FileAttributes) -> Result<()> {
    StagedFile::stage(target, content, attrs)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn test_replace_sets_content_and_mode() {
        let tmp_dir = TempDir::new().unwrap();
        let target = tmp_dir.path().join("securetty");
        fs::write(&target, b"old\n").unwrap();

        replace_file(&target, b"console\n", &FileAttributes::new(ModeRule::Exact(0o400))).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"console\n");
        assert_eq!(mode_of(&target), 0o400);
        // only the target remains in the directory
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_interrupted_before_rename_leaves_target_unchanged() {
        let tmp_dir = TempDir::new().unwrap();
        let target = tmp_dir.path().join("login.defs");
        fs::write(&target, b"UMASK 022\n").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();

        let staged =
            StagedFile::stage(&target, b"UMASK 027\n", &FileAttributes::new(ModeRule::Exact(0o444)))
                .unwrap();
        let temp_path = staged.path().to_path_buf();
        assert!(temp_path.exists());
        assert_eq!(temp_path.parent(), target.parent());

        // interruption: the staged file is dropped without commit
        drop(staged);

        assert_eq!(fs::read(&target).unwrap(), b"UMASK 022\n");
        assert_eq!(mode_of(&target), 0o644);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_creates_missing_parent() {
        let tmp_dir = TempDir::new().unwrap();
        let target = tmp_dir.path().join("limits.d").join("10.hardcore.conf");

        replace_file(&target, b"* hard core 0\n", &FileAttributes::new(ModeRule::Exact(0o440)))
            .unwrap();
        assert_eq!(mode_of(&target), 0o440);
    }
}
