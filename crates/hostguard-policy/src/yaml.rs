//! YAML-backed policy: built-in defaults merged with local overrides

use crate::source::PolicySource;
use crate::value::PolicyValue;
use hostguard_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Built-in defaults, one top-level key per policy category
const DEFAULTS: &str = include_str!("../defaults/os.yaml");

/// Policy loaded once per run and passed explicitly to collectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlPolicy {
    categories: BTreeMap<String, PolicyValue>,
}

impl YamlPolicy {
    /// Parse a policy document (top-level mapping of categories)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Parse(format!("Invalid policy document: {}", e)))?;

        match PolicyValue::from_yaml(&raw, "policy")? {
            PolicyValue::Map(categories) => Ok(Self { categories }),
            other => Err(Error::InvalidPolicy {
                key: "policy".into(),
                message: format!("expected a mapping of categories, found {}", other.type_name()),
            }),
        }
    }

    /// The built-in defaults
    pub fn defaults() -> Result<Self> {
        Self::from_yaml(DEFAULTS)
    }

    /// Defaults merged with the overrides file at `path`, if it exists
    pub fn load(overrides_path: Option<&Path>) -> Result<Self> {
        let policy = Self::defaults()?;

        let Some(path) = overrides_path else {
            return Ok(policy);
        };

        if !path.exists() {
            debug!("No policy overrides at {}, using defaults", path.display());
            return Ok(policy);
        }

        info!("Loading policy overrides from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let overrides = Self::from_yaml(&content).map_err(|e| match e {
            Error::Parse(message) => Error::Parse(format!("{}: {}", path.display(), message)),
            other => other,
        })?;
        policy.merged(overrides)
    }

    /// Apply `overrides` on top of this policy.
    ///
    /// Categories and sections merge recursively. Keys are leaves: an override
    /// replaces the whole value after a shape check. Keys unknown to the
    /// defaults are ignored.
    pub fn merged(mut self, overrides: YamlPolicy) -> Result<Self> {
        for (category, value) in overrides.categories {
            let Some(PolicyValue::Map(sections)) = self.categories.get_mut(&category) else {
                warn!("Unknown policy category '{}' - ignoring", category);
                continue;
            };
            let PolicyValue::Map(override_sections) = value else {
                return Err(Error::InvalidPolicy {
                    key: category,
                    message: "expected a mapping of sections".into(),
                });
            };

            for (section, value) in override_sections {
                let path = format!("{}.{}", category, section);
                let Some(PolicyValue::Map(keys)) = sections.get_mut(&section) else {
                    warn!("Unknown policy override section '{}' - ignoring", path);
                    continue;
                };
                let PolicyValue::Map(override_keys) = value else {
                    return Err(Error::InvalidPolicy {
                        key: path,
                        message: "expected a mapping of keys".into(),
                    });
                };
                merge_keys(keys, override_keys, &path)?;
            }
        }
        Ok(self)
    }
}

fn merge_keys(
    keys: &mut BTreeMap<String, PolicyValue>,
    overrides: BTreeMap<String, PolicyValue>,
    section_path: &str,
) -> Result<()> {
    for (key, value) in overrides {
        let path = format!("{}.{}", section_path, key);
        match keys.get_mut(&key) {
            None => warn!("Unknown policy override key '{}' - ignoring", path),
            Some(current) if !current.same_shape(&value) => {
                return Err(Error::InvalidPolicy {
                    key: path,
                    message: format!(
                        "expected {}, found {}",
                        current.type_name(),
                        value.type_name()
                    ),
                });
            }
            Some(current) => {
                debug!("Policy override {} = {}", path, value);
                *current = match value {
                    PolicyValue::Int(i) if matches!(current, PolicyValue::Str(_)) => {
                        PolicyValue::Str(i.to_string())
                    }
                    other => other,
                };
            }
        }
    }
    Ok(())
}

impl PolicySource for YamlPolicy {
    fn get(
        &self,
        category: &str,
        section: Option<&str>,
        key: Option<&str>,
    ) -> Option<&PolicyValue> {
        let mut value = self.categories.get(category)?;
        for part in [section, key].into_iter().flatten() {
            value = value.as_map()?.get(part)?;
        }
        Some(value)
    }
}
