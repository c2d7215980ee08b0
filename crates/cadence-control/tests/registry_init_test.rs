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

use anyhow::Result;
use cadence_control::{SubsystemState, SystemRegistry};
use cadence_core::{shared, HealthCheckResult, ManualClock, Subsystem, SubsystemInitError};
use std::sync::{Arc, Mutex};

type Timeline = Arc<Mutex<Vec<String>>>;

struct Effect {
    name: &'static str,
    timeline: Timeline,
    fail: bool,
}

impl Subsystem for Effect {
    fn initialize(&mut self) -> Result<()> {
        self.timeline
            .lock()
            .unwrap()
            .push(format!("start:{}", self.name));
        if self.fail {
            anyhow::bail!("{} has no canvas", self.name);
        }
        self.timeline
            .lock()
            .unwrap()
            .push(format!("ready:{}", self.name));
        Ok(())
    }

    fn health_check(&self) -> Result<HealthCheckResult> {
        Ok(HealthCheckResult::healthy(format!("{} running", self.name)))
    }
}

fn effect(name: &'static str, timeline: &Timeline, fail: bool) -> Effect {
    Effect {
        name,
        timeline: Arc::clone(timeline),
        fail,
    }
}

fn position(timeline: &[String], entry: &str) -> usize {
    timeline
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{} missing from {:?}", entry, timeline))
}

#[test]
fn test_dependencies_initialize_before_dependents() -> Result<()> {
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let mut registry = SystemRegistry::new(Arc::new(ManualClock::new(0.0)), 5_000.0);

    // Registered in reverse so that order cannot come from registration.
    registry.register("C", shared(effect("C", &timeline, false)), ["A", "B"])?;
    registry.register("B", shared(effect("B", &timeline, false)), ["A"])?;
    registry.register("A", shared(effect("A", &timeline, false)), Vec::<String>::new())?;

    let report = registry.initialize_all()?;
    assert_eq!(report.success, vec!["A", "B", "C"]);
    assert!(report.failed.is_empty() && report.skipped.is_empty());

    let timeline = timeline.lock().unwrap();
    let c_start = position(&timeline, "start:C");
    assert!(position(&timeline, "ready:A") < c_start);
    assert!(position(&timeline, "ready:B") < c_start);
    Ok(())
}

#[test]
fn test_failure_is_isolated_to_dependents() -> Result<()> {
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let mut registry = SystemRegistry::new(Arc::new(ManualClock::new(0.0)), 5_000.0);

    registry.register("A", shared(effect("A", &timeline, false)), Vec::<String>::new())?;
    registry.register("B", shared(effect("B", &timeline, true)), ["A"])?;
    registry.register("C", shared(effect("C", &timeline, false)), ["A", "B"])?;

    let report = registry.initialize_all()?;
    assert_eq!(report.success, vec!["A"]);
    assert_eq!(report.failed, vec!["B"]);
    assert_eq!(report.skipped, vec!["C"]);
    assert_eq!(
        report.errors,
        vec![(
            "B".to_string(),
            SubsystemInitError::Failed("B has no canvas".into())
        )]
    );

    assert!(
        !timeline.lock().unwrap().contains(&"start:C".to_string()),
        "skipped subsystems are never started"
    );
    assert_eq!(registry.state("C")?, SubsystemState::Skipped);

    let health = registry.perform_health_check();
    assert_eq!(health.healthy, vec!["A"]);
    assert_eq!(health.unhealthy, vec!["B", "C"]);
    Ok(())
}
