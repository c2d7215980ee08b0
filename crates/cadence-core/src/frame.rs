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

//! Per-frame types shared by the scheduler and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a unit of work registered with the frame scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkId(String);

impl WorkId {
    /// Creates a new work id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Execution priority of frame work and of queued property writes.
///
/// The variant order is the execution order within a tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Always executed, regardless of the remaining frame budget.
    Critical,
    /// Executed while frame budget remains.
    #[default]
    Normal,
    /// Executed only when the remaining budget exceeds the safety margin.
    Background,
}

impl Priority {
    /// All priorities in execution order.
    pub const ALL: [Priority; 3] = [Priority::Critical, Priority::Normal, Priority::Background];
}

/// What kind of work a registration wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// An animation-bearing [`Subsystem`](crate::subsystem::Subsystem).
    Subsystem,
    /// A raw frame callback closure.
    RawCallback,
}

/// Global quality mode observed by the scheduler and by subsystems.
///
/// Ordered from most to least expensive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    /// Full budget, every effect at its target rate.
    Quality,
    /// Slightly reduced budget.
    #[default]
    Balanced,
    /// Reduced budget and halved update cadence for non-critical work.
    Performance,
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PerformanceMode::Quality => "quality",
            PerformanceMode::Balanced => "balanced",
            PerformanceMode::Performance => "performance",
        };
        f.write_str(name)
    }
}

/// Optimization hint levels a monitor may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// Trim the budget a little.
    Mild,
    /// Switch to the cheaper update cadence.
    Moderate,
    /// Cheapest cadence and suspend background work entirely.
    Aggressive,
}

impl OptimizationLevel {
    /// The performance mode a consumer should switch to for this level.
    pub fn target_mode(self) -> PerformanceMode {
        match self {
            OptimizationLevel::Mild => PerformanceMode::Balanced,
            OptimizationLevel::Moderate | OptimizationLevel::Aggressive => {
                PerformanceMode::Performance
            }
        }
    }
}

/// A hint published by the performance monitor. Consumers decide how to respond.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationRequest {
    /// Reduce cost.
    Degrade {
        /// Requested level.
        level: OptimizationLevel,
        /// Human-readable reason for telemetry.
        reason: String,
    },
    /// Conditions recovered; return to the configured mode.
    Restore {
        /// Human-readable reason for telemetry.
        reason: String,
    },
}

/// Concrete budget and cadence adjustments derived from a mode or optimization level.
///
/// | Source | Budget | Background margin | Rate scale |
/// |---|---|---|---|
/// | Quality | 1.0 | 20% | 1.0 |
/// | Balanced | 0.9 | 25% | 1.0 |
/// | Performance | 0.75 | 35% | 0.5 |
/// | Aggressive | 0.75 | suspended | 0.5 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetPolicy {
    /// Multiplier applied to the nominal frame interval to obtain the frame budget.
    pub budget_multiplier: f64,
    /// Fraction of the frame budget that must remain before background work runs.
    pub background_margin: f64,
    /// Multiplier applied to non-critical target rates.
    pub rate_scale: f64,
    /// When set, background work is skipped unconditionally.
    pub background_suspended: bool,
}

impl BudgetPolicy {
    /// Returns the policy for a performance mode.
    pub fn for_mode(mode: PerformanceMode) -> Self {
        match mode {
            PerformanceMode::Quality => Self {
                budget_multiplier: 1.0,
                background_margin: 0.2,
                rate_scale: 1.0,
                background_suspended: false,
            },
            PerformanceMode::Balanced => Self {
                budget_multiplier: 0.9,
                background_margin: 0.25,
                rate_scale: 1.0,
                background_suspended: false,
            },
            PerformanceMode::Performance => Self {
                budget_multiplier: 0.75,
                background_margin: 0.35,
                rate_scale: 0.5,
                background_suspended: false,
            },
        }
    }

    /// Returns the policy for an optimization level.
    pub fn for_optimization(level: OptimizationLevel) -> Self {
        let mut policy = Self::for_mode(level.target_mode());
        if level == OptimizationLevel::Aggressive {
            policy.background_suspended = true;
        }
        policy
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::for_mode(PerformanceMode::default())
    }
}

/// Ephemeral per-tick context handed to every unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Host timestamp of this tick, in milliseconds.
    pub timestamp_ms: f64,
    /// Milliseconds since the previous tick.
    pub delta_ms: f64,
    /// Time allowance for this tick before lower-priority work is skipped.
    pub frame_budget_ms: f64,
    /// The performance mode in effect for this tick.
    pub performance_mode: PerformanceMode,
    /// Dropped frames counted before this tick.
    pub dropped_so_far: u64,
    /// Monotonic tick counter, starting at 1.
    pub frame_number: u64,
}
