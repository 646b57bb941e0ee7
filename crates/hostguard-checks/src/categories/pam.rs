//! PAM password quality and lockout

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::{ContentAudit, PackagePresenceAudit};
use hostguard_core::{Audit, Result};

const PASSWDQC_CONFIG: &str = "/usr/share/pam-configs/passwdqc";
const TALLY2_CONFIG: &str = "/usr/share/pam-configs/tally2";

/// Modules that conflict with pam_passwdqc
const CONFLICTING_MODULES: &[&str] = &["libpam-cracklib", "libpam-pwquality"];

pub struct PamCategory;

impl CategoryCollector for PamCategory {
    fn name(&self) -> &'static str {
        "pam"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let s = ctx.settings();
        let passwdqc = s.bool("auth", "pam_passwdqc_enable")?;
        let retries = s.int("auth", "retries")?;

        let mut audits: Vec<Box<dyn Audit>> = Vec::new();

        if passwdqc {
            let options = s.string("auth", "pam_passwdqc_options")?;
            audits.push(Box::new(PackagePresenceAudit::new(
                CONFLICTING_MODULES.iter().map(|m| m.to_string()).collect(),
                ctx.package_manager()?,
            )));
            audits.push(Box::new(ContentAudit::new(
                PASSWDQC_CONFIG,
                "passwdqc",
                ContextBuilder::new()
                    .set("auth_pam_passwdqc_options", options)
                    .build(),
                root_owned(0o644)?,
                ctx.renderer(),
            )));
        }

        if retries > 0 {
            let lockout_time = s.int("auth", "lockout_time")?;
            audits.push(Box::new(ContentAudit::new(
                TALLY2_CONFIG,
                "tally2",
                ContextBuilder::new()
                    .set("auth_retries", retries)
                    .set("auth_lockout_time", lockout_time)
                    .build(),
                root_owned(0o644)?,
                ctx.renderer(),
            )));
        }
        Ok(audits)
    }
}
