//! Resource limits: no core dumps unless policy allows them

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::{ContentAudit, FileAttributeAudit};
use hostguard_core::{Audit, Result};

const LIMITS_DIR: &str = "/etc/security/limits.d";
const HARDCORE_CONF: &str = "/etc/security/limits.d/10.hardcore.conf";

pub struct LimitsCategory;

impl CategoryCollector for LimitsCategory {
    fn name(&self) -> &'static str {
        "limits"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let core_dump = ctx.settings().bool("security", "kernel_enable_core_dump")?;

        let mut audits: Vec<Box<dyn Audit>> =
            vec![Box::new(FileAttributeAudit::new(LIMITS_DIR, root_owned(0o755)?))];

        if !core_dump {
            audits.push(Box::new(ContentAudit::new(
                HARDCORE_CONF,
                "10.hardcore.conf",
                ContextBuilder::new().set("disable_core_dump", true).build(),
                root_owned(0o440)?,
                ctx.renderer(),
            )));
        }
        Ok(audits)
    }
}
