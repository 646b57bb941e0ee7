//! Strip setuid/setgid bits from binaries that do not need them

use crate::collector::{CategoryCollector, CollectContext};
use hostguard_audit::{FileAttributeAudit, FileAttributes, ModeRule};
use hostguard_core::{Audit, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

const SETUID_SETGID: u32 = 0o6000;

/// Binaries that never need elevated bits on a hardened host
const BLACKLIST: &[&str] = &[
    "/usr/bin/rcp",
    "/usr/bin/rlogin",
    "/usr/bin/rsh",
    "/usr/libexec/openssh/ssh-keysign",
    "/usr/lib/openssh/ssh-keysign",
    "/sbin/netreport",
    "/usr/sbin/usernetctl",
    "/usr/sbin/userisdnctl",
    "/usr/sbin/pppd",
    "/usr/bin/lockfile",
    "/usr/bin/mail-lock",
    "/usr/bin/mail-unlock",
    "/usr/bin/mail-touchlock",
    "/usr/bin/dotlockfile",
    "/usr/bin/arping",
    "/usr/sbin/uuidd",
    "/usr/bin/mtr",
    "/usr/lib/evolution/camel-lock-helper-1.2",
    "/usr/lib/pt_chown",
    "/usr/lib/eject/dmcrypt-get-device",
    "/usr/lib/mc/cons.saver",
];

pub struct SuidSgidCategory;

impl CategoryCollector for SuidSgidCategory {
    fn name(&self) -> &'static str {
        "suid-sgid"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let s = ctx.settings();
        if !s.bool("security", "suid_sgid_enforce")? {
            return Ok(Vec::new());
        }
        let extra = s.string_list("security", "suid_sgid_blacklist")?;
        let whitelist = s.string_set("security", "suid_sgid_whitelist")?;

        let mut seen = BTreeSet::new();
        let paths: Vec<PathBuf> = BLACKLIST
            .iter()
            .map(|p| p.to_string())
            .chain(extra)
            .filter(|p| !whitelist.contains(p) && seen.insert(p.clone()))
            .map(PathBuf::from)
            .collect();

        if paths.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Box::new(FileAttributeAudit::for_paths(
            paths,
            FileAttributes::new(ModeRule::Without(SETUID_SETGID)),
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::testing;

    #[test]
    fn test_blacklist_minus_whitelist() {
        let policy = testing::policy(
            "os:\n  security:\n    suid_sgid_blacklist: [/usr/bin/at, /usr/bin/rsh]\n    suid_sgid_whitelist: [/usr/bin/mtr]\n",
        );
        let audits = SuidSgidCategory.collect(&testing::context(&policy)).unwrap();
        assert_eq!(audits.len(), 1);
        let target = &audits[0].identity().target;
        assert!(target.ends_with(",/usr/bin/at"));
        assert!(!target.contains("/usr/bin/mtr"));
        assert_eq!(target.matches("/usr/bin/rsh").count(), 1);
    }

    #[test]
    fn test_not_enforced() {
        let policy = testing::policy("os:\n  security:\n    suid_sgid_enforce: false\n");
        assert!(SuidSgidCategory
            .collect(&testing::context(&policy))
            .unwrap()
            .is_empty());
    }
}
