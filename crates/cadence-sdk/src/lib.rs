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

//! The public-facing SDK for Cadence.
//! This crate provides a single context object, [`ThemeCore`], that hosts
//! create once per render surface, plus a paced loop and logger bootstrap.

#![warn(missing_docs)]

mod frame_loop;
mod logging;
mod theme;

pub use frame_loop::FrameLoop;
pub use logging::init_logging;
pub use theme::{CoreMetrics, FrameSchedule, ThemeCore};

/// The types a subsystem author needs.
pub mod prelude {
    pub use crate::{FrameSchedule, ThemeCore};
    pub use cadence_control::{FrameReport, InitializationReport, VariableUpdateBatcher};
    pub use cadence_core::{
        shared, CoreConfig, CoreEvent, FrameContext, HealthCheckResult, MemorySurface,
        PerformanceMode, Priority, PropertyWrite, RenderSurface, Subsystem,
        SubsystemCapabilities,
    };
}
