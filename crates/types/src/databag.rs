//! String-keyed relation data.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One commit of key updates. `None` deletes the key.
pub type DataDelta = BTreeMap<String, Option<String>>;

/// Key/value data one side of a relation exposes.
///
/// Last write to a key wins. A deleted key is absent, which is distinct
/// from a key holding an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBag {
    entries: BTreeMap<String, String>,
}

impl DataBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Get the value under `key`, treating an empty string as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Check whether `key` is present (possibly empty).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set or delete a key. Returns true if the stored value changed.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) -> bool {
        let key = key.into();
        match value {
            Some(value) => self.entries.insert(key, value.clone()).as_ref() != Some(&value),
            None => self.entries.remove(&key).is_some(),
        }
    }

    /// Apply a commit, returning the keys whose value actually changed.
    pub fn apply(&mut self, delta: &DataDelta) -> BTreeSet<String> {
        delta
            .iter()
            .filter_map(|(key, value)| {
                self.set(key.clone(), value.clone())
                    .then(|| key.clone())
            })
            .collect()
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DataBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
