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

//! # Cadence Control
//!
//! The hot path of the coordination core: the frame scheduler that runs
//! registered work under a budget, the batcher that coalesces property writes
//! into one surface pass per tick, and the registry that brings subsystems up
//! and down in dependency order.

#![warn(missing_docs)]

pub mod batcher;
pub mod registry;
pub mod scheduler;

pub use batcher::{
    AppliedValueCache, ChangeDetector, ChangeSet, FlushOutcome, PendingWrite, UpdateMetrics,
    VariableUpdateBatcher,
};
pub use registry::{InitializationReport, SubsystemState, SystemRegistry};
pub use scheduler::{
    FrameCallback, FrameReport, FrameScheduler, SchedulerControl, SchedulerMetrics, WorkHandle,
    WorkStats, MAX_CONSECUTIVE_FAILURES,
};
