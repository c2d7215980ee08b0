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

//! Metric names and categories shared between producers and the monitor.

use serde::Serialize;

/// Broad classification of a recorded metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    /// Durations, in milliseconds.
    Timing,
    /// Rates, in events per second.
    Rate,
    /// Memory usage, in megabytes.
    Memory,
    /// CPU load, as a fraction in `0.0..=1.0`.
    Cpu,
    /// Anything a subsystem chooses to report.
    Custom,
}

/// Wall time of one scheduler tick including the flush, in ms.
pub const FRAME_TIME: &str = "frame_time";
/// Instantaneous frame rate derived from tick deltas, in fps.
pub const FRAME_RATE: &str = "frame_rate";
/// Wall time of one batcher flush, in ms.
pub const FLUSH_TIME: &str = "flush_time";
/// Process memory usage, in MB.
pub const MEMORY_USAGE: &str = "memory_usage";
/// Global CPU load, as a fraction.
pub const CPU_USAGE: &str = "cpu_usage";
