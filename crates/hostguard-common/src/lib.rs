//! HostGuard Common - Shared utilities: configuration, logging, retry policy, digests
//!
//! This crate provides common functionality used across all HostGuard crates.

pub mod config;
pub mod digest;
pub mod logging;
pub mod retry;

pub use config::{Config, ConfigBuilder};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use retry::{Backoff, RetryPolicy};
