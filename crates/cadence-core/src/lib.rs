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

//! # Cadence Core
//!
//! Foundational crate containing traits, core types, and interface contracts
//! shared by the frame scheduler, the variable batcher, the subsystem registry
//! and the performance monitor.
//!
//! Nothing in this crate renders or schedules anything by itself. It defines
//! the "common language" that independently developed visual subsystems and
//! the coordination core use to talk to each other.

#![warn(missing_docs)]

pub mod config;
pub mod critical_keys;
pub mod error;
pub mod event;
pub mod frame;
pub mod health;
pub mod subsystem;
pub mod surface;
pub mod telemetry;
pub mod utils;

pub use config::CoreConfig;
pub use error::{CallbackExecutionError, CoreError, CoreResult, SubsystemInitError};
pub use event::{CoreEvent, EventChannel};
pub use frame::{
    BudgetPolicy, FrameContext, OptimizationLevel, OptimizationRequest, PerformanceMode, Priority,
    WorkId, WorkKind,
};
pub use health::{HealthAggregate, HealthCheckResult, HealthIssue};
pub use subsystem::{shared, SharedSubsystem, Subsystem, SubsystemCapabilities};
pub use surface::{MemorySurface, PropertyWrite, RenderSurface};
pub use utils::clock::{Clock, ManualClock, SystemClock};
pub use utils::timer::Stopwatch;
