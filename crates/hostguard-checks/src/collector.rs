//! Category collectors - build a category's ordered audit list from policy

use hostguard_audit::{FileAttributes, PackageManager};
use hostguard_core::{Audit, Error, Result};
use hostguard_policy::{PolicySource, PolicyValue, Renderer, Settings, TemplateContext};
use std::sync::Arc;

/// Policy category group every built-in collector reads from
pub const POLICY_GROUP: &str = "os";

/// Everything a collector may consult while building audits
#[derive(Clone)]
pub struct CollectContext<'a> {
    pub policy: &'a dyn PolicySource,
    pub renderer: Arc<dyn Renderer>,
    pub packages: Option<Arc<dyn PackageManager>>,
}

impl<'a> CollectContext<'a> {
    pub fn new(
        policy: &'a dyn PolicySource,
        renderer: Arc<dyn Renderer>,
        packages: Option<Arc<dyn PackageManager>>,
    ) -> Self {
        Self {
            policy,
            renderer,
            packages,
        }
    }

    /// Typed view of the `os` policy group
    pub fn settings(&self) -> Settings<'a> {
        Settings::new(self.policy, POLICY_GROUP)
    }

    /// The host package manager; its absence makes package audits impossible
    pub fn package_manager(&self) -> Result<Arc<dyn PackageManager>> {
        self.packages
            .clone()
            .ok_or_else(|| Error::Fatal("no supported package manager found".into()))
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        self.renderer.clone()
    }
}

/// Builds the audits of one category.
///
/// Optional audits whose policy flag is off are left out of the list rather
/// than constructed disabled. Any missing or malformed policy key fails the
/// whole collection, so a category gets a complete list or none.
pub trait CategoryCollector: Send + Sync {
    /// Category name, e.g. `minimize-access`
    fn name(&self) -> &'static str;

    fn collect(&self, ctx: &CollectContext<'_>) -> Result<Vec<Box<dyn Audit>>>;
}

/// `root:root` with an exact mode
pub(crate) fn root_owned(mode: u32) -> Result<FileAttributes> {
    FileAttributes::owned("root", "root", mode)
}

/// Small helper for building template contexts
#[derive(Debug, Default)]
pub(crate) struct ContextBuilder(TemplateContext);

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<PolicyValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TemplateContext {
        self.0
    }
}
