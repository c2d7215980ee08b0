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

//! Traits for independently developed visual and audio subsystems.

use crate::frame::{FrameContext, PerformanceMode};
use crate::health::HealthCheckResult;
use std::sync::{Arc, Mutex};

/// A subsystem shared between the registry (lifecycle) and the scheduler (ticks).
pub type SharedSubsystem = Arc<Mutex<dyn Subsystem>>;

/// Wraps a subsystem for registration.
pub fn shared<S: Subsystem + 'static>(subsystem: S) -> SharedSubsystem {
    Arc::new(Mutex::new(subsystem))
}

/// Optional hooks a subsystem implements.
///
/// Queried once at registration time; callers branch on these flags instead of
/// probing the hooks on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubsystemCapabilities {
    /// The subsystem reacts to [`Subsystem::on_performance_mode_change`].
    pub performance_mode_hook: bool,
    /// The subsystem reacts to [`Subsystem::force_repaint`].
    pub force_repaint: bool,
}

impl SubsystemCapabilities {
    /// No optional hooks.
    pub const NONE: Self = Self {
        performance_mode_hook: false,
        force_repaint: false,
    };

    /// Every optional hook.
    pub const ALL: Self = Self {
        performance_mode_hook: true,
        force_repaint: true,
    };
}

/// The interface every animated subsystem implements to take part in the
/// coordinated frame loop.
///
/// Subsystems never write the render surface directly. They queue property
/// writes on the variable batcher from [`on_animate`](Subsystem::on_animate);
/// the scheduler flushes them once at the end of the tick.
pub trait Subsystem: Send {
    /// Prepares the subsystem. Called once, after all declared dependencies
    /// initialized successfully.
    fn initialize(&mut self) -> anyhow::Result<()>;

    /// Advances the subsystem by `delta_ms`, the time since it last ran.
    fn on_animate(&mut self, _delta_ms: f64, _frame: &FrameContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases resources. Called in reverse dependency order.
    fn destroy(&mut self) {}

    /// Reports operational status. An `Err` counts as unhealthy.
    fn health_check(&self) -> anyhow::Result<HealthCheckResult>;

    /// Declares which optional hooks this subsystem implements.
    fn capabilities(&self) -> SubsystemCapabilities {
        SubsystemCapabilities::NONE
    }

    /// Called when the global performance mode changes, if declared.
    fn on_performance_mode_change(&mut self, _mode: PerformanceMode) {}

    /// Called to request a full repaint of the effect, if declared.
    fn force_repaint(&mut self, _reason: Option<&str>) {}
}
