//! Policy source trait and typed accessors

use crate::value::PolicyValue;
use hostguard_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Supplies expected values per category/section/key
pub trait PolicySource: Send + Sync {
    /// Look up a category, a section inside it, or a key inside a section
    fn get(&self, category: &str, section: Option<&str>, key: Option<&str>)
        -> Option<&PolicyValue>;
}

/// Typed, required-key view over one category of a [`PolicySource`].
///
/// A missing key is a `MissingPolicy` error and a value of the wrong type is
/// `InvalidPolicy`; nothing is silently defaulted.
#[derive(Clone, Copy)]
pub struct Settings<'a> {
    source: &'a dyn PolicySource,
    category: &'a str,
}

impl<'a> Settings<'a> {
    pub fn new(source: &'a dyn PolicySource, category: &'a str) -> Self {
        Self { source, category }
    }

    pub fn category(&self) -> &str {
        self.category
    }

    fn path(&self, section: &str, key: &str) -> String {
        format!("{}.{}.{}", self.category, section, key)
    }

    fn invalid(&self, section: &str, key: &str, expected: &str, found: &PolicyValue) -> Error {
        Error::InvalidPolicy {
            key: self.path(section, key),
            message: format!("expected {}, found {}", expected, found.type_name()),
        }
    }

    /// Raw value for `section.key`
    pub fn value(&self, section: &str, key: &str) -> Result<&'a PolicyValue> {
        self.source
            .get(self.category, Some(section), Some(key))
            .ok_or_else(|| Error::MissingPolicy {
                key: self.path(section, key),
            })
    }

    pub fn bool(&self, section: &str, key: &str) -> Result<bool> {
        let value = self.value(section, key)?;
        value
            .as_bool()
            .ok_or_else(|| self.invalid(section, key, "boolean", value))
    }

    pub fn int(&self, section: &str, key: &str) -> Result<i64> {
        let value = self.value(section, key)?;
        value
            .as_int()
            .ok_or_else(|| self.invalid(section, key, "integer", value))
    }

    /// String value; integers are accepted and formatted
    pub fn string(&self, section: &str, key: &str) -> Result<String> {
        match self.value(section, key)? {
            PolicyValue::Str(s) => Ok(s.clone()),
            PolicyValue::Int(i) => Ok(i.to_string()),
            other => Err(self.invalid(section, key, "string", other)),
        }
    }

    /// List value in declared order
    pub fn string_list(&self, section: &str, key: &str) -> Result<Vec<String>> {
        let value = self.value(section, key)?;
        value
            .as_list()
            .map(|items| items.to_vec())
            .ok_or_else(|| self.invalid(section, key, "list", value))
    }

    /// List value as a set
    pub fn string_set(&self, section: &str, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.string_list(section, key)?.into_iter().collect())
    }

    pub fn map(&self, section: &str, key: &str) -> Result<&'a BTreeMap<String, PolicyValue>> {
        let value = self.value(section, key)?;
        value
            .as_map()
            .ok_or_else(|| self.invalid(section, key, "mapping", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapSource(BTreeMap<String, PolicyValue>);

    impl PolicySource for MapSource {
        fn get(
            &self,
            category: &str,
            section: Option<&str>,
            key: Option<&str>,
        ) -> Option<&PolicyValue> {
            let mut value = self.0.get(category)?;
            for part in [section, key].into_iter().flatten() {
                value = value.as_map()?.get(part)?;
            }
            Some(value)
        }
    }

    fn source() -> MapSource {
        let mut auth = BTreeMap::new();
        auth.insert("retries".to_string(), PolicyValue::Int(5));
        auth.insert("allow_homeless".to_string(), PolicyValue::Bool(false));
        auth.insert(
            "root_ttys".to_string(),
            PolicyValue::List(vec!["tty2".into(), "console".into(), "tty2".into()]),
        );
        let mut os = BTreeMap::new();
        os.insert("auth".to_string(), PolicyValue::Map(auth));
        let mut root = BTreeMap::new();
        root.insert("os".to_string(), PolicyValue::Map(os));
        MapSource(root)
    }

    #[test]
    fn test_typed_accessors() {
        let source = source();
        let settings = Settings::new(&source, "os");
        assert_eq!(settings.int("auth", "retries").unwrap(), 5);
        assert!(!settings.bool("auth", "allow_homeless").unwrap());
        assert_eq!(settings.string("auth", "retries").unwrap(), "5");
        assert_eq!(settings.string_list("auth", "root_ttys").unwrap().len(), 3);
        assert_eq!(settings.string_set("auth", "root_ttys").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_key_is_policy_error() {
        let source = source();
        let settings = Settings::new(&source, "os");
        match settings.bool("security", "packages_clean").unwrap_err() {
            Error::MissingPolicy { key } => assert_eq!(key, "os.security.packages_clean"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_is_invalid_policy() {
        let source = source();
        let settings = Settings::new(&source, "os");
        let err = settings.bool("auth", "retries").unwrap_err();
        assert_eq!(err.code(), "INVALID_POLICY");
        assert!(err.to_string().contains("expected boolean, found integer"));
    }
}
