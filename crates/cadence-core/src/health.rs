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

//! Health reporting types for subsystems and scheduled work.

use crate::frame::WorkId;
use serde::Serialize;
use std::collections::BTreeMap;

/// An on-demand self-report of a subsystem's operational status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckResult {
    /// `true` when the subsystem is working as intended.
    pub ok: bool,
    /// Human-readable summary.
    pub details: String,
    /// Individual problems, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl HealthCheckResult {
    /// A healthy result.
    pub fn healthy(details: impl Into<String>) -> Self {
        Self {
            ok: true,
            details: details.into(),
            issues: Vec::new(),
        }
    }

    /// An unhealthy result.
    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            ok: false,
            details: details.into(),
            issues: Vec::new(),
        }
    }

    /// Attaches an issue, returning the updated result.
    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }
}

/// Registry-wide aggregation of per-subsystem health results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthAggregate {
    /// Names of subsystems reporting `ok`.
    pub healthy: Vec<String>,
    /// Names of subsystems that reported a problem, threw, or never initialized.
    pub unhealthy: Vec<String>,
    /// The individual results keyed by subsystem name.
    pub results: BTreeMap<String, HealthCheckResult>,
}

impl HealthAggregate {
    /// Records one subsystem's result.
    pub fn record(&mut self, name: impl Into<String>, result: HealthCheckResult) {
        let name = name.into();
        if result.ok {
            self.healthy.push(name.clone());
        } else {
            self.unhealthy.push(name.clone());
        }
        self.results.insert(name, result);
    }

    /// Folds in a scheduler-raised issue. The affected entry becomes unhealthy
    /// even if its own check passed; work unknown to the aggregate is added.
    pub fn raise(&mut self, issue: &HealthIssue) {
        let name = issue.id.as_str();
        let text = format!(
            "auto-unregistered after {} consecutive failures: {}",
            issue.consecutive_failures, issue.reason
        );
        let result = self
            .results
            .entry(name.to_string())
            .or_insert_with(|| HealthCheckResult::unhealthy("removed from the frame loop"));
        result.ok = false;
        result.issues.push(text);

        self.healthy.retain(|healthy| healthy != name);
        if !self.unhealthy.iter().any(|unhealthy| unhealthy == name) {
            self.unhealthy.push(name.to_string());
        }
    }

    /// `true` when no subsystem is unhealthy.
    pub fn all_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }
}

/// A problem raised by the scheduler about a unit of work, e.g. after it was
/// auto-unregistered for failing repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthIssue {
    /// The affected work.
    pub id: WorkId,
    /// The last error message observed.
    pub reason: String,
    /// Consecutive failures at the time the issue was raised.
    pub consecutive_failures: u32,
}
