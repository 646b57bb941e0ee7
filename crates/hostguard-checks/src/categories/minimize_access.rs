//! Minimize access: PATH directories, shadow and su

use crate::collector::{root_owned, CategoryCollector, CollectContext};
use hostguard_audit::{FileAttributeAudit, FileAttributes, ModeRule};
use hostguard_core::{Audit, Result};
use std::path::PathBuf;
use tracing::debug;

const PATH_FOLDERS: &[&str] = &[
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/bin",
];

/// Value of `security.users_allow` that leaves `su` usable by everyone
const CHANGE_USER: &str = "change_user";

pub struct MinimizeAccessCategory;

impl CategoryCollector for MinimizeAccessCategory {
    fn name(&self) -> &'static str {
        "minimize-access"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let s = ctx.settings();
        let extra_paths = s.string_list("environment", "extra_user_paths")?;
        let users_allow = s.string_set("security", "users_allow")?;

        let mut folders: Vec<PathBuf> = PATH_FOLDERS.iter().map(PathBuf::from).collect();
        for path in extra_paths {
            let path = PathBuf::from(path);
            if !folders.contains(&path) {
                folders.push(path);
            }
        }

        let mut audits: Vec<Box<dyn Audit>> = vec![
            // no group/other write anywhere on the system PATH
            Box::new(
                FileAttributeAudit::for_paths(
                    folders,
                    FileAttributes::new(ModeRule::Without(0o022)),
                )
                .recursive(true),
            ),
            Box::new(FileAttributeAudit::new("/etc/shadow", root_owned(0o600)?)),
        ];

        if users_allow.contains(CHANGE_USER) {
            debug!("su left unrestricted by policy");
        } else {
            audits.push(Box::new(FileAttributeAudit::new("/bin/su", root_owned(0o750)?)));
        }
        Ok(audits)
    }
}
