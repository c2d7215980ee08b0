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

//! Registered units of frame work.

use super::control::SchedulerControl;
use cadence_core::utils::panic_message;
use cadence_core::utils::sync::lock_recover;
use cadence_core::{
    CallbackExecutionError, FrameContext, PerformanceMode, Priority, SharedSubsystem,
    SubsystemCapabilities, WorkId, WorkKind,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A raw per-frame callback. Receives the frame context with `delta_ms` set
/// to the time since this callback last ran.
pub type FrameCallback = Box<dyn FnMut(&FrameContext) -> anyhow::Result<()> + Send>;

/// Slack allowed when deciding whether rate-limited work is due, in ms.
pub const RATE_TOLERANCE_MS: f64 = 1.0;

pub(crate) enum WorkTarget {
    Subsystem {
        instance: SharedSubsystem,
        capabilities: SubsystemCapabilities,
    },
    Callback(FrameCallback),
}

/// Per-work counters.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkStats {
    /// Execution tier.
    pub priority: Priority,
    /// Subsystem or raw callback.
    pub kind: WorkKind,
    /// Requested rate in Hz; 0 runs every frame.
    pub target_rate: f64,
    /// Successful and failed executions.
    pub executions: u64,
    /// Ticks where the work was due but the budget did not allow it.
    pub skipped: u64,
    /// Ticks where the work was not due yet because of its target rate.
    pub throttled: u64,
    /// Failed executions, lifetime.
    pub failures: u64,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// The most recent failure.
    pub last_error: Option<CallbackExecutionError>,
}

pub(crate) struct WorkEntry {
    pub(crate) id: WorkId,
    pub(crate) target: WorkTarget,
    pub(crate) last_run_ms: Option<f64>,
    pub(crate) stats: WorkStats,
}

impl WorkEntry {
    pub(crate) fn new(id: WorkId, priority: Priority, target_rate: f64, target: WorkTarget) -> Self {
        let kind = match target {
            WorkTarget::Subsystem { .. } => WorkKind::Subsystem,
            WorkTarget::Callback(_) => WorkKind::RawCallback,
        };
        Self {
            id,
            target,
            last_run_ms: None,
            stats: WorkStats {
                priority,
                kind,
                target_rate: target_rate.max(0.0),
                executions: 0,
                skipped: 0,
                throttled: 0,
                failures: 0,
                consecutive_failures: 0,
                last_error: None,
            },
        }
    }

    pub(crate) fn priority(&self) -> Priority {
        self.stats.priority
    }

    /// Whether enough time passed since the last run for the target rate.
    /// Critical work ignores `rate_scale`.
    pub(crate) fn is_due(&self, timestamp_ms: f64, rate_scale: f64) -> bool {
        let rate = self.stats.target_rate;
        if rate <= 0.0 {
            return true;
        }
        let Some(last) = self.last_run_ms else {
            return true;
        };
        let scale = if self.priority() == Priority::Critical {
            1.0
        } else {
            rate_scale
        };
        let min_interval = 1000.0 / (rate * scale);
        timestamp_ms - last >= min_interval - RATE_TOLERANCE_MS
    }

    /// Runs the work once, isolating errors and panics.
    pub(crate) fn run(&mut self, frame: &FrameContext) -> Result<(), CallbackExecutionError> {
        self.stats.executions += 1;
        let outcome = match &mut self.target {
            WorkTarget::Subsystem { instance, .. } => {
                let mut subsystem = lock_recover(instance);
                catch_unwind(AssertUnwindSafe(|| {
                    subsystem.on_animate(frame.delta_ms, frame)
                }))
            }
            WorkTarget::Callback(callback) => catch_unwind(AssertUnwindSafe(|| callback(frame))),
        };

        let error = match outcome {
            Ok(Ok(())) => {
                self.stats.consecutive_failures = 0;
                return Ok(());
            }
            Ok(Err(e)) => CallbackExecutionError::Failed {
                id: self.id.clone(),
                message: format!("{:#}", e),
            },
            Err(payload) => CallbackExecutionError::Panicked {
                id: self.id.clone(),
                message: panic_message(payload.as_ref()),
            },
        };
        self.stats.failures += 1;
        self.stats.consecutive_failures += 1;
        self.stats.last_error = Some(error.clone());
        Err(error)
    }

    /// Forwards a mode change if the subsystem declared the hook.
    pub(crate) fn notify_mode(&self, mode: PerformanceMode) {
        if let WorkTarget::Subsystem {
            instance,
            capabilities,
        } = &self.target
        {
            if !capabilities.performance_mode_hook {
                return;
            }
            let mut subsystem = lock_recover(instance);
            if let Err(payload) =
                catch_unwind(AssertUnwindSafe(|| subsystem.on_performance_mode_change(mode)))
            {
                log::warn!(
                    "FrameScheduler: '{}' panicked handling mode change: {}",
                    self.id,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// Returned by registration. Unregistering through the handle takes effect
/// at the start of the next tick, so it is safe from inside running work.
#[derive(Debug, Clone)]
pub struct WorkHandle {
    id: WorkId,
    control: SchedulerControl,
}

impl WorkHandle {
    pub(crate) fn new(id: WorkId, control: SchedulerControl) -> Self {
        Self { id, control }
    }

    /// The registered id.
    pub fn id(&self) -> &WorkId {
        &self.id
    }

    /// Requests removal of this work from the next tick on.
    pub fn unregister(&self) {
        self.control.unregister(self.id.clone());
    }
}
