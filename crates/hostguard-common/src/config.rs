//! Configuration management for HostGuard

use hostguard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Policy source settings
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Template rendering settings
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Package manager settings
    #[serde(default)]
    pub packages: PackagesConfig,

    /// Category selection
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (HOSTGUARD_ prefix)
    pub fn merge_env(mut self) -> Self {
        if let Ok(val) = std::env::var("HOSTGUARD_POLICY_OVERRIDES") {
            self.policy.overrides_path = Some(val);
        }
        if let Ok(val) = std::env::var("HOSTGUARD_TEMPLATES_DIR") {
            self.templates.dir = Some(val);
        }
        if let Ok(val) = std::env::var("HOSTGUARD_PACKAGE_MANAGER") {
            self.packages.manager = val;
        }

        // Logging
        if let Ok(val) = std::env::var("HOSTGUARD_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("HOSTGUARD_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }
}

/// Policy source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// YAML file with overrides for the built-in defaults (read only if present)
    pub overrides_path: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            overrides_path: Some(String::from("/etc/hostguard/hardening.yaml")),
        }
    }
}

/// Template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory whose files replace built-in templates of the same name
    pub dir: Option<String>,
}

/// Package manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// auto, apt or dnf
    #[serde(default = "default_manager")]
    pub manager: String,

    /// Drop-in file HostGuard owns for apt configuration entries
    #[serde(default = "default_apt_conf_file")]
    pub apt_conf_file: String,

    /// dnf main configuration file
    #[serde(default = "default_dnf_conf_file")]
    pub dnf_conf_file: String,

    /// Attempts when the package database is locked
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Delay between lock retries in milliseconds
    #[serde(default = "default_lock_backoff")]
    pub lock_backoff_ms: u64,
}

fn default_manager() -> String {
    String::from("auto")
}

fn default_apt_conf_file() -> String {
    String::from("/etc/apt/apt.conf.d/99-hostguard-hardening")
}

fn default_dnf_conf_file() -> String {
    String::from("/etc/dnf/dnf.conf")
}

fn default_lock_retries() -> u32 {
    3
}

fn default_lock_backoff() -> u64 {
    2000
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            manager: default_manager(),
            apt_conf_file: default_apt_conf_file(),
            dnf_conf_file: default_dnf_conf_file(),
            lock_retries: default_lock_retries(),
            lock_backoff_ms: default_lock_backoff(),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Categories to run (empty = all known categories)
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Emit a line with timing when each audit span closes
    #[serde(default)]
    pub spans: bool,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("compact")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            spans: false,
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn overrides_path(mut self, path: impl Into<String>) -> Self {
        self.config.policy.overrides_path = Some(path.into());
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.templates.dir = Some(dir.into());
        self
    }

    pub fn package_manager(mut self, manager: impl Into<String>) -> Self {
        self.config.packages.manager = manager.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.config.runner.categories.push(category.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
