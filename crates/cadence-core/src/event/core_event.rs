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

//! Event payloads published by the coordination core.

use crate::frame::{OptimizationLevel, PerformanceMode};
use crate::health::{HealthAggregate, HealthIssue};
use std::collections::BTreeMap;

/// A notification observable by code outside the core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A flush wrote at least one property to the render surface.
    VariablesApplied {
        /// The full post-flush applied key/value set.
        values: BTreeMap<String, String>,
        /// Number of properties this flush actually wrote.
        written: usize,
        /// Clock time of the flush, in ms.
        timestamp_ms: f64,
    },
    /// The scheduler switched performance mode.
    PerformanceModeChanged {
        /// Previous mode.
        old: PerformanceMode,
        /// New mode.
        new: PerformanceMode,
        /// Why the change happened.
        reason: String,
    },
    /// The monitor asked consumers to reduce cost.
    OptimizationRequested {
        /// Requested level.
        level: OptimizationLevel,
        /// Why it was requested.
        reason: String,
    },
    /// Work was removed from the scheduler after repeated failures.
    WorkAutoUnregistered(HealthIssue),
    /// A registry-wide health check finished.
    HealthCheckCompleted(HealthAggregate),
}
