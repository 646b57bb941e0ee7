//! HostGuard Checks - Hardening categories and the run facade
//!
//! This crate provides:
//! - `CategoryCollector`: builds one category's ordered audits from policy
//! - `CategoryRegistry`: the built-in categories in their fixed order
//! - `Hardener`: runs or checks categories and returns their reports

pub mod categories;
pub mod collector;
pub mod hardener;
pub mod registry;

pub use collector::{CategoryCollector, CollectContext};
pub use hardener::{CategoryAbort, CategoryRun, Hardener};
pub use registry::CategoryRegistry;
