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

//! The boundary to the host render surface that receives property writes.

use crate::utils::sync::lock_recover;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A single key/value property write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyWrite {
    /// Opaque, namespaced property key.
    pub key: String,
    /// The value to apply.
    pub value: String,
}

impl PropertyWrite {
    /// Creates a new write.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The host surface that style properties are written to.
///
/// Every call is one write pass. Implementations must not call back into the
/// variable batcher from `apply`.
pub trait RenderSurface: Send {
    /// Applies all writes in one pass.
    fn apply(&mut self, writes: &[PropertyWrite]);
}

#[derive(Debug, Default)]
struct MemorySurfaceState {
    values: BTreeMap<String, String>,
    write_calls: usize,
    total_writes: usize,
}

/// An in-memory render surface, used for headless hosts and for inspection.
///
/// Clones share the same state, so one clone can be handed to the batcher
/// while another is kept to observe what was written.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemorySurfaceState>>,
}

impl MemorySurface {
    /// Creates an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current value of a property.
    pub fn value(&self, key: &str) -> Option<String> {
        lock_recover(&self.state).values.get(key).cloned()
    }

    /// Number of `apply` calls received.
    pub fn write_calls(&self) -> usize {
        lock_recover(&self.state).write_calls
    }

    /// Number of individual property writes received across all calls.
    pub fn total_writes(&self) -> usize {
        lock_recover(&self.state).total_writes
    }

    /// A copy of every property currently set.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock_recover(&self.state).values.clone()
    }
}

impl RenderSurface for MemorySurface {
    fn apply(&mut self, writes: &[PropertyWrite]) {
        let mut state = lock_recover(&self.state);
        state.write_calls += 1;
        state.total_writes += writes.len();
        for write in writes {
            state.values.insert(write.key.clone(), write.value.clone());
        }
    }
}
