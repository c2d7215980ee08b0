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

use crate::utils::clock::Clock;
use std::sync::Arc;

/// Measures elapsed milliseconds against a [`Clock`].
#[derive(Debug, Clone)]
pub struct Stopwatch {
    clock: Arc<dyn Clock>,
    start_ms: f64,
}

impl Stopwatch {
    /// Starts a stopwatch at the clock's current time.
    #[inline]
    pub fn start(clock: &Arc<dyn Clock>) -> Self {
        Self {
            clock: Arc::clone(clock),
            start_ms: clock.now_ms(),
        }
    }

    /// The clock time at which the stopwatch started.
    #[inline]
    pub fn started_at_ms(&self) -> f64 {
        self.start_ms
    }

    /// Milliseconds since the stopwatch started. Never negative.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        (self.clock.now_ms() - self.start_ms).max(0.0)
    }
}
