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

//! sysinfo-based implementation of the ResourceMonitor trait.

use cadence_core::telemetry::{MonitoredResourceType, ResourceMonitor};
use cadence_core::utils::sync::lock_recover;
use std::borrow::Cow;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A resource monitor that uses the `sysinfo` crate.
///
/// Memory is the resident size of the current process in MB; CPU is the
/// global load as a fraction.
#[derive(Debug)]
pub struct SystemResourceMonitor {
    resource: MonitoredResourceType,
    system: Mutex<System>,
    pid: Option<Pid>,
    last: Mutex<Option<f64>>,
}

impl SystemResourceMonitor {
    /// Monitors the memory of the current process.
    pub fn memory() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::warn!("SystemResourceMonitor: current pid unavailable: {}", e);
                None
            }
        };
        Self::with_resource(MonitoredResourceType::Memory, pid)
    }

    /// Monitors global CPU load.
    pub fn cpu() -> Self {
        Self::with_resource(MonitoredResourceType::Cpu, None)
    }

    fn with_resource(resource: MonitoredResourceType, pid: Option<Pid>) -> Self {
        Self {
            resource,
            system: Mutex::new(System::new()),
            pid,
            last: Mutex::new(None),
        }
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn monitor_id(&self) -> Cow<'static, str> {
        match self.resource {
            MonitoredResourceType::Memory => Cow::Borrowed("system_memory"),
            MonitoredResourceType::Cpu => Cow::Borrowed("system_cpu"),
        }
    }

    fn resource_type(&self) -> MonitoredResourceType {
        self.resource
    }

    fn sample(&self) -> Option<f64> {
        *lock_recover(&self.last)
    }

    fn update(&self) {
        let mut system = lock_recover(&self.system);
        let reading = match self.resource {
            MonitoredResourceType::Memory => self.pid.and_then(|pid| {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system
                    .process(pid)
                    .map(|process| process.memory() as f64 / BYTES_PER_MB)
            }),
            MonitoredResourceType::Cpu => {
                // The first refresh only establishes a baseline.
                system.refresh_cpu_usage();
                Some(f64::from(system.global_cpu_usage()) / 100.0)
            }
        };
        *lock_recover(&self.last) = reading;
    }
}
