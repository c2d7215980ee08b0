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

//! Provides traits for active resource monitoring.
//!
//! "Monitoring" is distinct from "metrics" in that it involves actively polling
//! a system resource (process memory, CPU) to get a snapshot of its state,
//! whereas metrics are discrete measurements pushed by the scheduler and batcher.

use std::borrow::Cow;
use std::fmt::Debug;

/// The core trait for a resource monitor.
///
/// The performance monitor holds a collection of these and periodically calls
/// `update` followed by `sample`.
pub trait ResourceMonitor: Send + Sync + Debug + 'static {
    /// Returns a unique, human-readable identifier for this monitor instance.
    fn monitor_id(&self) -> Cow<'static, str>;

    /// Returns the type of resource being monitored.
    fn resource_type(&self) -> MonitoredResourceType;

    /// Returns the latest reading, in the unit of the resource type.
    ///
    /// `None` when the resource could not be read on this platform.
    fn sample(&self) -> Option<f64>;

    /// Triggers the monitor to refresh its internal state by polling the resource.
    /// This default implementation does nothing, for monitors that update passively.
    fn update(&self) {
        // Default: no-op
    }
}

/// An enumeration of the types of resources that can be monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredResourceType {
    /// Process memory, sampled in megabytes.
    Memory,
    /// CPU load, sampled as a fraction in `0.0..=1.0`.
    Cpu,
}
