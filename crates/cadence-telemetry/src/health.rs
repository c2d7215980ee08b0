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

//! Threshold-based health classification of resources.

use cadence_core::CoreConfig;
use serde::Serialize;

/// Classification of a single resource, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Within limits, or no data yet.
    #[default]
    Healthy,
    /// Approaching a limit.
    Warning,
    /// Past a limit.
    Critical,
}

/// Limits used to classify memory, CPU and frame-rate readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthThresholds {
    /// Memory at or above this many MB is a warning.
    pub memory_warning_mb: f64,
    /// Memory at or above this many MB is critical.
    pub memory_critical_mb: f64,
    /// CPU load at or above this fraction is a warning.
    pub cpu_warning: f64,
    /// CPU load at or above this fraction is critical.
    pub cpu_critical: f64,
    /// Frame rate below this is a warning.
    pub fps_warning: f64,
    /// Frame rate below this is critical.
    pub fps_critical: f64,
}

impl HealthThresholds {
    /// Derives thresholds from the configured memory ceiling and target frame rate.
    pub fn from_config(config: &CoreConfig) -> Self {
        let target = f64::from(config.target_fps);
        Self {
            memory_warning_mb: config.max_memory_usage * 0.8,
            memory_critical_mb: config.max_memory_usage,
            cpu_warning: 0.7,
            cpu_critical: 0.9,
            fps_warning: target * 0.8,
            fps_critical: target * 0.5,
        }
    }

    /// Classifies a memory reading in MB.
    pub fn classify_memory(&self, mb: Option<f64>) -> HealthState {
        classify_rising(mb, self.memory_warning_mb, self.memory_critical_mb)
    }

    /// Classifies a CPU load fraction.
    pub fn classify_cpu(&self, load: Option<f64>) -> HealthState {
        classify_rising(load, self.cpu_warning, self.cpu_critical)
    }

    /// Classifies an average frame rate. Lower is worse.
    pub fn classify_frame_rate(&self, fps: Option<f64>) -> HealthState {
        match fps {
            None => HealthState::Healthy,
            Some(v) if v < self.fps_critical => HealthState::Critical,
            Some(v) if v < self.fps_warning => HealthState::Warning,
            Some(_) => HealthState::Healthy,
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

fn classify_rising(value: Option<f64>, warning: f64, critical: f64) -> HealthState {
    match value {
        None => HealthState::Healthy,
        Some(v) if v >= critical => HealthState::Critical,
        Some(v) if v >= warning => HealthState::Warning,
        Some(_) => HealthState::Healthy,
    }
}

/// Per-resource health plus the worst-of rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Process memory.
    pub memory: HealthState,
    /// CPU load.
    pub cpu: HealthState,
    /// Frame rate.
    pub frame_rate: HealthState,
    /// Worst of the three.
    pub overall: HealthState,
}

impl HealthStatus {
    /// Builds a status, computing `overall` from the individual states.
    pub fn new(memory: HealthState, cpu: HealthState, frame_rate: HealthState) -> Self {
        Self {
            memory,
            cpu,
            frame_rate,
            overall: memory.max(cpu).max(frame_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_follow_config() {
        let config = CoreConfig {
            target_fps: 60,
            max_memory_usage: 100.0,
            ..CoreConfig::default()
        };
        let t = HealthThresholds::from_config(&config);
        assert_eq!(t.memory_warning_mb, 80.0);
        assert_eq!(t.fps_warning, 48.0);
        assert_eq!(t.fps_critical, 30.0);
    }

    #[test]
    fn test_classification_boundaries() {
        let t = HealthThresholds::from_config(&CoreConfig {
            max_memory_usage: 100.0,
            ..CoreConfig::default()
        });
        assert_eq!(t.classify_memory(Some(79.9)), HealthState::Healthy);
        assert_eq!(t.classify_memory(Some(80.0)), HealthState::Warning);
        assert_eq!(t.classify_memory(Some(100.0)), HealthState::Critical);
        assert_eq!(t.classify_cpu(Some(0.95)), HealthState::Critical);
        assert_eq!(t.classify_frame_rate(Some(59.0)), HealthState::Healthy);
        assert_eq!(t.classify_frame_rate(Some(40.0)), HealthState::Warning);
        assert_eq!(t.classify_frame_rate(Some(20.0)), HealthState::Critical);
    }

    #[test]
    fn test_missing_data_is_healthy() {
        let t = HealthThresholds::default();
        assert_eq!(t.classify_memory(None), HealthState::Healthy);
        assert_eq!(t.classify_cpu(None), HealthState::Healthy);
        assert_eq!(t.classify_frame_rate(None), HealthState::Healthy);
    }

    #[test]
    fn test_overall_takes_worst() {
        let status = HealthStatus::new(
            HealthState::Healthy,
            HealthState::Warning,
            HealthState::Critical,
        );
        assert_eq!(status.overall, HealthState::Critical);

        let status = HealthStatus::new(
            HealthState::Warning,
            HealthState::Healthy,
            HealthState::Healthy,
        );
        assert_eq!(status.overall, HealthState::Warning);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = HealthStatus::default();
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["frameRate"], "healthy");
        assert_eq!(json["overall"], "healthy");
    }
}
