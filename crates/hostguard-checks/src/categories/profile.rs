//! Login shell profile snippets

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::ContentAudit;
use hostguard_core::{Audit, Result};

const CORE_DUMP_PROFILE: &str = "/etc/profile.d/hardening_profile.sh";
const TIMEOUT_PROFILE: &str = "/etc/profile.d/99-hardening.sh";

pub struct ProfileCategory;

impl CategoryCollector for ProfileCategory {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let s = ctx.settings();
        let core_dump = s.bool("security", "kernel_enable_core_dump")?;
        let ssh_tmout = s.int("security", "ssh_tmout")?;

        let mut audits: Vec<Box<dyn Audit>> = Vec::new();
        if !core_dump {
            audits.push(Box::new(ContentAudit::new(
                CORE_DUMP_PROFILE,
                "hardening_profile.sh",
                ContextBuilder::new().build(),
                root_owned(0o755)?,
                ctx.renderer(),
            )));
        }
        if ssh_tmout > 0 {
            audits.push(Box::new(ContentAudit::new(
                TIMEOUT_PROFILE,
                "99-hardening.sh",
                ContextBuilder::new().set("ssh_tmout", ssh_tmout).build(),
                root_owned(0o644)?,
                ctx.renderer(),
            )));
        }
        Ok(audits)
    }
}
