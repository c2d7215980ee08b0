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

//! # Cadence Telemetry
//!
//! Consumes timing samples from the frame scheduler and the variable batcher,
//! polls system resources, classifies health, and publishes optimization
//! hints that the scheduler and subsystems observe.

#![warn(missing_docs)]

pub mod health;
pub mod metrics;
pub mod monitor;
pub mod system;

pub use health::{HealthState, HealthStatus, HealthThresholds};
pub use metrics::{MetricSample, MetricStore, RingBuffer, METRIC_WINDOW};
pub use monitor::PerformanceMonitor;
pub use system::SystemResourceMonitor;
