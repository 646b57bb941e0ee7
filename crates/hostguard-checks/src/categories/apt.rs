//! Package manager configuration and forbidden packages

use crate::collector::{CategoryCollector, CollectContext};
use hostguard_audit::{PackageConfigAudit, PackageManagerKind, PackagePresenceAudit};
use hostguard_core::{Audit, Result};
use tracing::debug;

pub struct AptCategory;

impl CategoryCollector for AptCategory {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let settings = ctx.settings();
        let manager = ctx.package_manager()?;

        let config_key = match manager.kind() {
            PackageManagerKind::Apt => "apt_config",
            PackageManagerKind::Dnf => "dnf_config",
        };
        let entries: Vec<(String, String)> = settings
            .map("packages", config_key)?
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        let packages_clean = settings.bool("security", "packages_clean")?;
        let forbidden = settings.string_set("security", "packages_list")?;

        let mut audits: Vec<Box<dyn Audit>> = Vec::new();
        if entries.is_empty() {
            debug!("No {} entries configured", config_key);
        } else {
            audits.push(Box::new(PackageConfigAudit::new(entries, manager.clone())));
        }
        if packages_clean && !forbidden.is_empty() {
            audits.push(Box::new(PackagePresenceAudit::new(forbidden, manager)));
        }
        Ok(audits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::testing::{self, NullManager};
    use std::sync::Arc;

    #[test]
    fn test_default_audits() {
        let policy = testing::policy("");
        let audits = AptCategory.collect(&testing::context(&policy)).unwrap();
        let targets = testing::targets(&audits);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], "package-config:apt:APT::Get::AllowUnauthenticated");
        assert!(targets[1].starts_with("package-presence:"));
        assert!(targets[1].contains("telnet-server"));
    }

    #[test]
    fn test_clean_disabled_omits_presence_audit() {
        let policy = testing::policy("os:\n  security:\n    packages_clean: false\n");
        let audits = AptCategory.collect(&testing::context(&policy)).unwrap();
        assert_eq!(audits.len(), 1);
    }

    #[test]
    fn test_dnf_reads_dnf_config() {
        let policy = testing::policy("");
        let mut ctx = testing::context(&policy);
        ctx.packages = Some(Arc::new(NullManager(PackageManagerKind::Dnf)));
        let audits = AptCategory.collect(&ctx).unwrap();
        assert_eq!(audits[0].identity().target, "dnf:gpgcheck");
    }

    #[test]
    fn test_without_package_manager_is_fatal() {
        let policy = testing::policy("");
        let mut ctx = testing::context(&policy);
        ctx.packages = None;
        match AptCategory.collect(&ctx) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("collected apt audits without a package manager"),
        }
    }
}
