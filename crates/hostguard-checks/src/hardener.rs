//! Hardener - entry point for running categories against the host

use crate::collector::CollectContext;
use crate::registry::CategoryRegistry;
use hostguard_audit::{Aborted, AuditRunner, DriftReport, PackageManager};
use hostguard_core::{ComplianceReport, Error, Result};
use hostguard_policy::{PolicySource, Renderer};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs hardening categories with one policy, renderer and package manager.
///
/// The policy is loaded once by the caller and shared read-only by every
/// collector of the run.
pub struct Hardener {
    policy: Arc<dyn PolicySource>,
    renderer: Arc<dyn Renderer>,
    packages: Option<Arc<dyn PackageManager>>,
    registry: CategoryRegistry,
    selected: Vec<String>,
}

impl Hardener {
    pub fn new(
        policy: Arc<dyn PolicySource>,
        renderer: Arc<dyn Renderer>,
        packages: Option<Arc<dyn PackageManager>>,
    ) -> Self {
        Self {
            policy,
            renderer,
            packages,
            registry: CategoryRegistry::builtin(),
            selected: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: CategoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Limit `run_all` to these categories; empty means all of them
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.selected = categories;
        self
    }

    /// Categories `run_all` will execute, in registry order
    pub fn categories(&self) -> Result<Vec<&'static str>> {
        if let Some(unknown) = self
            .selected
            .iter()
            .find(|name| self.registry.get(name).is_none())
        {
            return Err(Error::UnknownCategory(unknown.clone()));
        }
        Ok(self
            .registry
            .names()
            .filter(|name| {
                self.selected.is_empty() || self.selected.iter().any(|s| s.as_str() == *name)
            })
            .collect())
    }

    fn runner(&self, name: &str) -> Result<AuditRunner> {
        let collector = self
            .registry
            .get(name)
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))?;
        let ctx = CollectContext::new(
            self.policy.as_ref(),
            self.renderer.clone(),
            self.packages.clone(),
        );
        let audits = collector.collect(&ctx)?;
        Ok(AuditRunner::new(name, audits))
    }

    /// Collect and run one category
    pub fn run_category(&self, name: &str) -> std::result::Result<ComplianceReport, Aborted> {
        let runner = self.runner(name).map_err(|e| {
            error!("Cannot collect category {}: {}", name, e);
            Aborted::new(Vec::new(), e)
        })?;
        runner.run()
    }

    /// Run every selected category in order.
    ///
    /// A fatal error stops only the category it came from; the rest still
    /// run. Any other collection error stops the whole run before the next
    /// category is touched.
    pub fn run_all(&self) -> std::result::Result<CategoryRun<ComplianceReport>, Aborted> {
        let categories = self
            .categories()
            .map_err(|e| Aborted::new(Vec::new(), e))?;
        info!("Hardening {} categories", categories.len());

        let mut run = CategoryRun::default();
        for name in categories {
            match self.run_category(name) {
                Ok(report) => run.reports.push(report),
                Err(mut aborted) => {
                    run.reports.append(&mut aborted.reports);
                    if !aborted.error.is_fatal() {
                        aborted.reports = run.reports;
                        return Err(aborted);
                    }
                    warn!("Category {} aborted, continuing: {}", name, aborted.error);
                    run.aborted.push(CategoryAbort::new(name, aborted.error));
                }
            }
        }
        Ok(run)
    }

    /// Report drift for one category without changing anything
    pub fn check_category(&self, name: &str) -> Result<DriftReport> {
        Ok(self.runner(name)?.check())
    }

    /// Drift for every selected category. Categories that cannot be
    /// collected because of a fatal error are listed as aborted.
    pub fn check_all(&self) -> Result<CategoryRun<DriftReport>> {
        let mut run = CategoryRun::default();
        for name in self.categories()? {
            match self.check_category(name) {
                Ok(report) => run.reports.push(report),
                Err(e) if e.is_fatal() => {
                    warn!("Cannot check category {}: {}", name, e);
                    run.aborted.push(CategoryAbort::new(name, e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(run)
    }
}

/// A category stopped by a fatal error
#[derive(Debug)]
pub struct CategoryAbort {
    pub category: String,
    pub error: Error,
}

impl CategoryAbort {
    pub fn new(category: impl Into<String>, error: Error) -> Self {
        Self {
            category: category.into(),
            error,
        }
    }
}

/// Per-category results of a multi-category run
#[derive(Debug)]
pub struct CategoryRun<T> {
    pub reports: Vec<T>,
    pub aborted: Vec<CategoryAbort>,
}

impl<T> Default for CategoryRun<T> {
    fn default() -> Self {
        Self {
            reports: Vec::new(),
            aborted: Vec::new(),
        }
    }
}

impl<T> CategoryRun<T> {
    pub fn is_aborted(&self) -> bool {
        !self.aborted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CategoryCollector;
    use hostguard_core::{Audit, AuditIdentity, AuditKind, ComplianceStatus, Outcome};
    use hostguard_policy::{TemplateRenderer, YamlPolicy};

    struct FixedAudit {
        identity: AuditIdentity,
        fatal: bool,
    }

    impl Audit for FixedAudit {
        fn identity(&self) -> &AuditIdentity {
            &self.identity
        }

        fn check(&self) -> Result<ComplianceStatus> {
            if self.fatal {
                Err(Error::Fatal("dpkg-query not found".into()))
            } else {
                Ok(ComplianceStatus::compliant())
            }
        }

        fn remediate(&self) -> Result<()> {
            Ok(())
        }
    }

    enum Plan {
        Audits(usize),
        FatalSecond,
        MissingPolicy,
    }

    struct Scripted(&'static str, Plan);

    impl CategoryCollector for Scripted {
        fn name(&self) -> &'static str {
            self.0
        }

        fn collect(&self, _ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>> {
            let audit = |i: usize, fatal: bool| -> Box<dyn Audit> {
                Box::new(FixedAudit {
                    identity: AuditIdentity::new(
                        AuditKind::FileAttribute,
                        format!("/{}/{}", self.0, i),
                    ),
                    fatal,
                })
            };
            match self.1 {
                Plan::Audits(n) => Ok((0..n).map(|i| audit(i, false)).collect()),
                Plan::FatalSecond => Ok(vec![audit(0, false), audit(1, true), audit(2, false)]),
                Plan::MissingPolicy => Err(Error::MissingPolicy {
                    key: format!("os.{}.enabled", self.0),
                }),
            }
        }
    }

    fn hardener(plans: Vec<(&'static str, Plan)>) -> Hardener {
        let mut registry = CategoryRegistry::new();
        for (name, plan) in plans {
            registry.register(Arc::new(Scripted(name, plan)));
        }
        Hardener::new(
            Arc::new(YamlPolicy::defaults().unwrap()),
            Arc::new(TemplateRenderer::new()),
            None,
        )
        .with_registry(registry)
    }

    #[test]
    fn test_run_all_in_order() {
        let hardener = hardener(vec![("one", Plan::Audits(2)), ("two", Plan::Audits(1))]);
        let run = hardener.run_all().unwrap();
        assert!(!run.is_aborted());
        let reports = run.reports;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].category, "one");
        assert_eq!(reports[0].len(), 2);
        assert_eq!(reports[1].entries[0].outcome, Outcome::Compliant);
    }

    #[test]
    fn test_fatal_stops_only_its_category() {
        let hardener = hardener(vec![
            ("one", Plan::Audits(1)),
            ("two", Plan::FatalSecond),
            ("three", Plan::Audits(1)),
        ]);
        let run = hardener.run_all().unwrap();
        let categories: Vec<_> = run.reports.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["one", "two", "three"]);
        // the audit after the fatal one in "two" never ran
        assert_eq!(run.reports[1].len(), 1);
        assert_eq!(run.aborted.len(), 1);
        assert_eq!(run.aborted[0].category, "two");
        assert!(run.aborted[0].error.is_fatal());
    }

    #[test]
    fn test_policy_error_aborts_before_any_audit() {
        let hardener = hardener(vec![("one", Plan::MissingPolicy), ("two", Plan::Audits(1))]);
        let aborted = hardener.run_all().unwrap_err();
        assert_eq!(aborted.error.code(), "MISSING_POLICY");
        assert!(aborted.reports.is_empty());
    }

    #[test]
    fn test_selection_and_unknown_categories() {
        let hardener = hardener(vec![("one", Plan::Audits(1)), ("two", Plan::Audits(1))])
            .with_categories(vec!["two".into()]);
        assert_eq!(hardener.categories().unwrap(), vec!["two"]);
        assert_eq!(hardener.run_all().unwrap().reports.len(), 1);

        let hardener = hardener.with_categories(vec!["ssh".into()]);
        assert_eq!(
            hardener.run_all().unwrap_err().error.code(),
            "UNKNOWN_CATEGORY"
        );
        assert!(hardener.run_category("ssh").is_err());
    }

    #[test]
    fn test_check_category_reports_probe_errors() {
        let hardener = hardener(vec![("two", Plan::FatalSecond)]);
        let drift = hardener.check_category("two").unwrap();
        assert_eq!(drift.entries.len(), 3);
        assert_eq!(drift.drifted().len(), 1);
        assert!(drift.entries[1].error.is_some());
    }

    #[test]
    fn test_builtin_categories_collect_from_defaults() {
        let hardener = Hardener::new(
            Arc::new(YamlPolicy::defaults().unwrap()),
            Arc::new(TemplateRenderer::new()),
            None,
        );
        for name in [
            "limits",
            "login",
            "minimize-access",
            "profile",
            "securetty",
            "suid-sgid",
            "sysctl",
        ] {
            assert!(hardener.runner(name).is_ok(), "{} failed to collect", name);
        }
        // package audits need a package manager
        assert!(matches!(hardener.runner("apt"), Err(e) if e.is_fatal()));
    }

    #[test]
    fn test_missing_package_manager_skips_only_apt() {
        let hardener = Hardener::new(
            Arc::new(YamlPolicy::defaults().unwrap()),
            Arc::new(TemplateRenderer::new()),
            None,
        )
        .with_categories(vec!["apt".into(), "securetty".into()]);

        let drift = hardener.check_all().unwrap();
        assert_eq!(drift.aborted.len(), 1);
        assert_eq!(drift.aborted[0].category, "apt");
        assert!(drift.aborted[0].error.is_fatal());
        assert_eq!(drift.reports.len(), 1);
        assert_eq!(drift.reports[0].category, "securetty");
    }

    #[test]
    fn test_run_all_continues_after_collection_fatal() {
        let mut registry = CategoryRegistry::new();
        registry.register(Arc::new(crate::categories::AptCategory));
        registry.register(Arc::new(Scripted("one", Plan::Audits(2))));
        let hardener = Hardener::new(
            Arc::new(YamlPolicy::defaults().unwrap()),
            Arc::new(TemplateRenderer::new()),
            None,
        )
        .with_registry(registry);

        let run = hardener.run_all().unwrap();
        assert!(run.is_aborted());
        assert_eq!(run.aborted[0].category, "apt");
        assert_eq!(run.reports.len(), 1);
        assert_eq!(run.reports[0].category, "one");
        assert_eq!(run.reports[0].len(), 2);
    }
}
