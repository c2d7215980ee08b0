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

//! Change detection against the applied value cache.

use super::cache::AppliedValueCache;
use cadence_core::Priority;

/// A queued, not yet applied property write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Property key.
    pub key: String,
    /// Proposed value.
    pub value: String,
    /// Ordering hint within the flush pass.
    pub priority: Priority,
    /// Group the write is attributed to in metrics.
    pub group: Option<String>,
}

/// Result of comparing pending writes with the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Writes whose value differs from the applied one, in queue order.
    pub staged: Vec<PendingWrite>,
    /// Writes dropped because the value was already applied.
    pub skipped: usize,
    /// Total writes compared.
    pub evaluated: usize,
}

impl ChangeSet {
    /// `true` when nothing needs to reach the render surface.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

/// Splits pending writes into changed and unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Compares every pending write with the applied value for its key.
    pub fn detect(cache: &AppliedValueCache, pending: Vec<PendingWrite>) -> ChangeSet {
        let evaluated = pending.len();
        let staged: Vec<PendingWrite> = pending
            .into_iter()
            .filter(|write| !cache.matches(&write.key, &write.value))
            .collect();
        ChangeSet {
            skipped: evaluated - staged.len(),
            staged,
            evaluated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(key: &str, value: &str) -> PendingWrite {
        PendingWrite {
            key: key.into(),
            value: value.into(),
            priority: Priority::Normal,
            group: None,
        }
    }

    #[test]
    fn test_unchanged_values_are_skipped() {
        let mut cache = AppliedValueCache::new();
        cache.commit("a".into(), "1".into());
        cache.commit("b".into(), "2".into());

        let set = ChangeDetector::detect(
            &cache,
            vec![write("a", "1"), write("b", "3"), write("c", "4")],
        );
        assert_eq!(set.evaluated, 3);
        assert_eq!(set.skipped, 1);
        let keys: Vec<_> = set.staged.iter().map(|w| w.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_all_unchanged_is_empty() {
        let mut cache = AppliedValueCache::new();
        cache.commit("a".into(), "1".into());
        let set = ChangeDetector::detect(&cache, vec![write("a", "1")]);
        assert!(set.is_empty());
        assert_eq!(set.skipped, 1);
    }
}
