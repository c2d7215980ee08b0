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

//! Millisecond time sources.
//!
//! The scheduler, batcher and registry never call `Instant::now()` directly;
//! they read a [`Clock`] so tests can drive time deterministically.

use crate::utils::sync::lock_recover;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A monotonic source of milliseconds.
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> f64;
}

/// Wall-clock time measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so work under test can advance the clock to
/// simulate how long it ran.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Creates a clock at `start_ms`.
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_ms)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: f64) {
        *lock_recover(&self.now) += ms;
    }

    /// Jumps to an absolute time.
    pub fn set(&self, ms: f64) {
        *lock_recover(&self.now) = ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *lock_recover(&self.now)
    }
}
