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

//! In-memory options object recognised by the coordination core.

use crate::critical_keys::default_critical_keys;
use crate::error::{CoreError, CoreResult};
use crate::frame::PerformanceMode;
use serde::{Deserialize, Serialize};

/// Lowest accepted `targetFPS`.
pub const MIN_TARGET_FPS: u32 = 1;
/// Highest accepted `targetFPS`.
pub const MAX_TARGET_FPS: u32 = 240;

/// Configuration for the coordination core.
///
/// Field names serialize in camelCase so that host-side option objects
/// (`{ "enableDebug": true, "targetFPS": 60, ... }`) deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    /// Enables per-frame debug logging.
    pub enable_debug: bool,
    /// Nominal frame rate; the frame budget is derived from it.
    #[serde(rename = "targetFPS")]
    pub target_fps: u32,
    /// Memory ceiling in megabytes used for health classification.
    pub max_memory_usage: f64,
    /// Mode the scheduler starts in and restores to after recovery.
    pub performance_mode: PerformanceMode,
    /// Interval between resource samples and registry health checks, in ms.
    pub health_check_interval: u64,
    /// Longest a subsystem initializer may take before it counts as failed, in ms.
    pub max_initialization_time: u64,
    /// Keys whose writes bypass batching.
    pub critical_keys: Vec<String>,
    /// Lets the performance monitor request degradation on its own.
    pub auto_optimize: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enable_debug: false,
            target_fps: 60,
            max_memory_usage: 50.0,
            performance_mode: PerformanceMode::Balanced,
            health_check_interval: 5_000,
            max_initialization_time: 5_000,
            critical_keys: default_critical_keys(),
            auto_optimize: true,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON options object and validates it.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: CoreConfig = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidConfig(format!("malformed options: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field for an acceptable range.
    pub fn validate(&self) -> CoreResult<()> {
        if !(MIN_TARGET_FPS..=MAX_TARGET_FPS).contains(&self.target_fps) {
            return Err(CoreError::InvalidConfig(format!(
                "targetFPS must be within {MIN_TARGET_FPS}..={MAX_TARGET_FPS}, got {}",
                self.target_fps
            )));
        }
        if !(self.max_memory_usage.is_finite() && self.max_memory_usage > 0.0) {
            return Err(CoreError::InvalidConfig(format!(
                "maxMemoryUsage must be a positive number of MB, got {}",
                self.max_memory_usage
            )));
        }
        if self.health_check_interval == 0 {
            return Err(CoreError::InvalidConfig(
                "healthCheckInterval must be greater than zero".into(),
            ));
        }
        if self.max_initialization_time == 0 {
            return Err(CoreError::InvalidConfig(
                "maxInitializationTime must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Nominal milliseconds between frames at `target_fps`.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(MIN_TARGET_FPS) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.frame_interval_ms() - 16.666).abs() < 0.01);
        assert!(!config.critical_keys.is_empty());
    }

    #[test]
    fn test_parse_camel_case_options() {
        let config = CoreConfig::from_json(
            r#"{
                "enableDebug": true,
                "targetFPS": 30,
                "maxMemoryUsage": 128,
                "performanceMode": "performance",
                "healthCheckInterval": 1000,
                "maxInitializationTime": 250
            }"#,
        )
        .unwrap();

        assert!(config.enable_debug);
        assert_eq!(config.target_fps, 30);
        assert_eq!(config.max_memory_usage, 128.0);
        assert_eq!(config.performance_mode, PerformanceMode::Performance);
        assert_eq!(config.health_check_interval, 1000);
        assert_eq!(config.max_initialization_time, 250);
        // Unspecified fields keep their defaults.
        assert!(config.auto_optimize);
    }

    #[test]
    fn test_rejects_out_of_range_fps() {
        let err = CoreConfig::from_json(r#"{ "targetFPS": 0 }"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));

        let err = CoreConfig::from_json(r#"{ "targetFPS": 1000 }"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = CoreConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("malformed options"));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let config = CoreConfig {
            health_check_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
