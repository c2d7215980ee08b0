// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The record of what is currently applied to the render surface.

use std::collections::{BTreeMap, HashMap};

/// Map of `key -> last applied value`.
///
/// Only the batcher commits to it, and only for values it has just written,
/// so it always mirrors the render surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedValueCache {
    values: HashMap<String, String>,
}

impl AppliedValueCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last value written for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `true` if `value` is exactly what is applied for `key`.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// Number of keys ever applied.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if nothing was applied yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A sorted copy of the applied key/value set.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn commit(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_match() {
        let mut cache = AppliedValueCache::new();
        assert!(!cache.matches("--cadence-hue", "120"));
        cache.commit("--cadence-hue".into(), "120".into());
        assert!(cache.matches("--cadence-hue", "120"));
        assert!(!cache.matches("--cadence-hue", "121"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let mut cache = AppliedValueCache::new();
        cache.commit("b".into(), "2".into());
        cache.commit("a".into(), "1".into());
        let keys: Vec<_> = cache.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
