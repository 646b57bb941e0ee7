//! Category registry - ordered index of category collectors

use crate::categories::*;
use crate::collector::CategoryCollector;
use std::sync::Arc;

/// Collectors in execution order. Names are unique.
pub struct CategoryRegistry {
    collectors: Vec<Arc<dyn CategoryCollector>>,
}

impl CategoryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }

    /// All built-in categories in their fixed order
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AptCategory));
        registry.register(Arc::new(LimitsCategory));
        registry.register(Arc::new(LoginCategory));
        registry.register(Arc::new(MinimizeAccessCategory));
        registry.register(Arc::new(PamCategory));
        registry.register(Arc::new(ProfileCategory));
        registry.register(Arc::new(SecurettyCategory));
        registry.register(Arc::new(SuidSgidCategory));
        registry.register(Arc::new(SysctlCategory));
        registry
    }

    /// Append a collector, replacing one with the same name in place
    pub fn register(&mut self, collector: Arc<dyn CategoryCollector>) {
        match self
            .collectors
            .iter_mut()
            .find(|c| c.name() == collector.name())
        {
            Some(existing) => *existing = collector,
            None => self.collectors.push(collector),
        }
    }

    /// Get a collector by category name
    pub fn get(&self, name: &str) -> Option<Arc<dyn CategoryCollector>> {
        self.collectors.iter().find(|c| c.name() == name).cloned()
    }

    /// Category names in execution order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.collectors.iter().map(|c| c.name())
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
