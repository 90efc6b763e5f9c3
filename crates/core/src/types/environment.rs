//! Environment snapshots and their contribution to cache keys

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable name→value view of a process environment.
///
/// Ordered so that anything derived from it is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSnapshot(BTreeMap<String, String>);

impl EnvSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn capture() -> Self {
        Self(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        )
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Resolve declared names into key contributions, keeping unset names
    /// distinguishable from empty values.
    #[must_use]
    pub fn resolve<'a, I>(&self, names: I) -> BTreeMap<String, EnvValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| {
                let value = match self.0.get(name) {
                    Some(v) => EnvValue::Set(v.clone()),
                    None => EnvValue::Unset,
                };
                (name.to_string(), value)
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A declared variable as seen by the cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EnvValue {
    Unset,
    Set(String),
}

impl EnvValue {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            EnvValue::Unset => None,
            EnvValue::Set(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_differs_from_empty() {
        let env = EnvSnapshot::new().with("EMPTY", "");
        let resolved = env.resolve(["EMPTY", "MISSING"]);
        assert_eq!(resolved["EMPTY"], EnvValue::Set(String::new()));
        assert_eq!(resolved["MISSING"], EnvValue::Unset);
        assert_ne!(
            serde_json::to_string(&resolved["EMPTY"]).unwrap(),
            serde_json::to_string(&resolved["MISSING"]).unwrap()
        );
    }

    #[test]
    fn test_resolve_is_sorted() {
        let env: EnvSnapshot = [("B", "2"), ("A", "1")].into_iter().collect();
        let names: Vec<_> = env.resolve(["B", "A"]).into_keys().collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    #[serial_test::serial]
    fn test_capture_sees_process_env() {
        std::env::set_var("PLASMA_SNAPSHOT_TEST", "yes");
        let env = EnvSnapshot::capture();
        assert_eq!(env.get("PLASMA_SNAPSHOT_TEST"), Some("yes"));
        std::env::remove_var("PLASMA_SNAPSHOT_TEST");
    }
}
