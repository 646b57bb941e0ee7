//! Terminals root may log in on

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::ContentAudit;
use hostguard_core::{Audit, Result};

pub struct SecurettyCategory;

impl CategoryCollector for SecurettyCategory {
    fn name(&self) -> &'static str {
        "securetty"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        let ttys = ctx.settings().string_list("auth", "root_ttys")?;
        Ok(vec![Box::new(ContentAudit::new(
            "/etc/securetty",
            "securetty",
            ContextBuilder::new().set("ttys", ttys).build(),
            root_owned(0o400)?,
            ctx.renderer(),
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::testing;

    #[test]
    fn test_securetty_audit() {
        let policy = testing::policy("os:\n  auth:\n    root_ttys: [console]\n");
        let audits = SecurettyCategory
            .collect(&testing::context(&policy))
            .unwrap();
        assert_eq!(testing::targets(&audits), vec!["content:/etc/securetty"]);
    }
}
