//! /etc/login.defs

use crate::collector::{root_owned, CategoryCollector, CollectContext, ContextBuilder};
use hostguard_audit::ContentAudit;
use hostguard_core::{Audit, Result};
use hostguard_policy::{Settings, TemplateContext};

const LOGIN_DEFS: &str = "/etc/login.defs";

pub struct LoginCategory;

fn login_context(s: &Settings<'_>) -> Result<TemplateContext> {
    let extra_paths: String = s
        .string_list("environment", "extra_user_paths")?
        .iter()
        .map(|p| format!(":{}", p))
        .collect();
    let default_home = if s.bool("auth", "allow_homeless")? {
        "yes"
    } else {
        "no"
    };

    Ok(ContextBuilder::new()
        .set("additional_user_paths", extra_paths)
        .set("umask", s.string("environment", "umask")?)
        .set("pwd_max_age", s.int("auth", "pw_max_age")?)
        .set("pwd_min_age", s.int("auth", "pw_min_age")?)
        .set("uid_min", s.int("auth", "uid_min")?)
        .set("sys_uid_min", s.int("auth", "sys_uid_min")?)
        .set("sys_uid_max", s.int("auth", "sys_uid_max")?)
        .set("gid_min", s.int("auth", "gid_min")?)
        .set("sys_gid_min", s.int("auth", "sys_gid_min")?)
        .set("sys_gid_max", s.int("auth", "sys_gid_max")?)
        .set("login_retries", s.int("auth", "retries")?)
        .set("login_timeout", s.int("auth", "timeout")?)
        .set("chfn_restrict", s.string("auth", "chfn_restrict")?)
        .set("default_home", default_home)
        .build())
}

impl CategoryCollector for LoginCategory {
    fn name(&self) -> &'static str {
        "login"
    }

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
        Ok(vec![Box::new(ContentAudit::new(
            LOGIN_DEFS,
            "login.defs",
            login_context(&ctx.settings())?,
            root_owned(0o444)?,
            ctx.renderer(),
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::testing;
    use hostguard_core::Error;
    use hostguard_policy::{PolicySource, PolicyValue, Renderer, TemplateRenderer};
    use std::sync::Arc;

    #[test]
    fn test_login_defs_renders_from_policy() {
        let policy = testing::policy(
            "os:\n  environment:\n    extra_user_paths: [/opt/bin]\n  auth:\n    pw_max_age: 90\n",
        );
        let ctx = testing::context(&policy);
        let audits = LoginCategory.collect(&ctx).unwrap();
        assert_eq!(testing::targets(&audits), vec!["content:/etc/login.defs"]);

        let context = login_context(&ctx.settings()).unwrap();
        let text =
            String::from_utf8(TemplateRenderer::new().render("login.defs", &context).unwrap())
                .unwrap();
        assert!(text.contains("PATH=/usr/local/bin:/usr/bin:/bin:/opt/bin\n"));
        assert!(text.contains("PASS_MAX_DAYS   90\n"));
        assert!(text.contains("UMASK           027\n"));
        assert!(text.contains("DEFAULT_HOME    no\n"));
    }

    #[test]
    fn test_missing_key_fails_collection() {
        struct Empty;
        impl PolicySource for Empty {
            fn get(&self, _: &str, _: Option<&str>, _: Option<&str>) -> Option<&PolicyValue> {
                None
            }
        }

        let ctx = CollectContext::new(&Empty, Arc::new(TemplateRenderer::new()), None);
        match LoginCategory.collect(&ctx) {
            Err(Error::MissingPolicy { key }) => {
                assert_eq!(key, "os.environment.extra_user_paths")
            }
            other => panic!("unexpected result {:?}", other.map(|a| a.len())),
        }
    }
}
