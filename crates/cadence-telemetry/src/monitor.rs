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

//! The performance monitor.
//!
//! Aggregates samples pushed by the scheduler and the batcher, polls resource
//! monitors on an interval, classifies health, and turns sustained frame-rate
//! trouble into optimization hints. A hint is never applied here: it is queued
//! for the scheduler to pick up and published for anyone else listening.

use crate::health::{HealthState, HealthStatus, HealthThresholds};
use crate::metrics::MetricStore;
use cadence_core::telemetry::metrics::{CPU_USAGE, FRAME_RATE, MEMORY_USAGE};
use cadence_core::telemetry::{MetricCategory, MonitoredResourceType, ResourceMonitor};
use cadence_core::utils::sync::lock_recover;
use cadence_core::{
    Clock, CoreConfig, CoreEvent, EventChannel, OptimizationLevel, OptimizationRequest,
};
use std::sync::{Arc, Mutex};

/// Frame-rate samples required before adaptive evaluation starts.
pub const MIN_ADAPTIVE_SAMPLES: usize = 5;
/// Consecutive critical evaluations that trigger a degrade request.
pub const CRITICAL_STREAK: u32 = 3;
/// Consecutive healthy evaluations, while degraded, that trigger a restore.
pub const RECOVERY_STREAK: u32 = 10;

#[derive(Debug)]
struct MonitorState {
    store: MetricStore,
    thresholds: HealthThresholds,
    monitors: Vec<Arc<dyn ResourceMonitor>>,
    sample_interval_ms: f64,
    last_sample_ms: Option<f64>,
    auto_optimize: bool,
    degradation: Option<OptimizationLevel>,
    critical_streak: u32,
    healthy_streak: u32,
    pending: Option<OptimizationRequest>,
}

/// Shared handle to the performance monitor. Cloning is cheap; all clones
/// observe the same state.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    state: Arc<Mutex<MonitorState>>,
    clock: Arc<dyn Clock>,
    events: EventChannel<CoreEvent>,
}

impl PerformanceMonitor {
    /// Creates a monitor with thresholds derived from `config`.
    pub fn new(config: &CoreConfig, clock: Arc<dyn Clock>, events: EventChannel<CoreEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                store: MetricStore::new(),
                thresholds: HealthThresholds::from_config(config),
                monitors: Vec::new(),
                sample_interval_ms: config.health_check_interval as f64,
                last_sample_ms: None,
                auto_optimize: config.auto_optimize,
                degradation: None,
                critical_streak: 0,
                healthy_streak: 0,
                pending: None,
            })),
            clock,
            events,
        }
    }

    /// Appends a sample to the named metric's rolling window.
    ///
    /// Frame-rate samples also drive adaptive degradation when enabled.
    pub fn record_metric(&self, name: &str, value: f64, category: MetricCategory) {
        let now = self.clock.now_ms();
        let published = {
            let mut state = lock_recover(&self.state);
            state.store.push(name, value, category, now);
            if name == FRAME_RATE {
                evaluate_frame_rate(&mut state)
            } else {
                None
            }
        };
        if let Some(event) = published {
            self.events.publish(event);
        }
    }

    /// Moving average of a metric over its window.
    pub fn average(&self, name: &str) -> Option<f64> {
        lock_recover(&self.state).store.average(name)
    }

    /// Number of samples held for a metric.
    pub fn sample_count(&self, name: &str) -> usize {
        lock_recover(&self.state).store.sample_count(name)
    }

    /// Names of every metric recorded so far.
    pub fn metric_names(&self) -> Vec<String> {
        lock_recover(&self.state).store.names()
    }

    /// Classifies memory, CPU and frame rate against the configured thresholds.
    ///
    /// Resources without samples are reported healthy.
    pub fn get_health_status(&self) -> HealthStatus {
        let state = lock_recover(&self.state);
        let memory = state
            .thresholds
            .classify_memory(state.store.latest(MEMORY_USAGE).map(|s| s.value));
        let cpu = state
            .thresholds
            .classify_cpu(state.store.average(CPU_USAGE));
        let frame_rate = state
            .thresholds
            .classify_frame_rate(state.store.average(FRAME_RATE));
        HealthStatus::new(memory, cpu, frame_rate)
    }

    /// The thresholds in use.
    pub fn thresholds(&self) -> HealthThresholds {
        lock_recover(&self.state).thresholds
    }

    /// Queues an optimization hint for the scheduler and publishes it.
    pub fn request_optimization(&self, level: OptimizationLevel) {
        self.request_optimization_with_reason(level, "requested by host");
    }

    /// Like [`request_optimization`](Self::request_optimization) with an explicit reason.
    pub fn request_optimization_with_reason(&self, level: OptimizationLevel, reason: &str) {
        log::info!(
            "PerformanceMonitor: optimization requested ({:?}): {}",
            level,
            reason
        );
        {
            let mut state = lock_recover(&self.state);
            state.degradation = Some(level);
            state.critical_streak = 0;
            state.healthy_streak = 0;
            state.pending = Some(OptimizationRequest::Degrade {
                level,
                reason: reason.to_string(),
            });
        }
        self.events.publish(CoreEvent::OptimizationRequested {
            level,
            reason: reason.to_string(),
        });
    }

    /// Takes the most recent unconsumed hint, if any.
    pub fn take_optimization_request(&self) -> Option<OptimizationRequest> {
        lock_recover(&self.state).pending.take()
    }

    /// The degradation level currently requested, if any.
    pub fn degradation(&self) -> Option<OptimizationLevel> {
        lock_recover(&self.state).degradation
    }

    /// Forgets any degradation, pending hint and streaks. Called when the host
    /// picks a mode itself; frame-rate evidence is collected afresh.
    pub fn clear_degradation(&self) {
        let mut state = lock_recover(&self.state);
        if state.degradation.is_some() {
            log::debug!("PerformanceMonitor: degradation cleared by host mode change");
        }
        state.degradation = None;
        state.pending = None;
        state.critical_streak = 0;
        state.healthy_streak = 0;
        state.store.reset(FRAME_RATE);
    }

    /// Adds a resource monitor polled by [`sample_resources`](Self::sample_resources).
    pub fn register_monitor(&self, monitor: Arc<dyn ResourceMonitor>) {
        let id = monitor.monitor_id().to_string();
        lock_recover(&self.state).monitors.push(monitor);
        log::info!("PerformanceMonitor: registered resource monitor '{}'", id);
    }

    /// Polls every resource monitor if the sampling interval has elapsed.
    ///
    /// Returns `true` when monitors were polled.
    pub fn sample_resources(&self) -> bool {
        let now = self.clock.now_ms();
        let monitors = {
            let mut state = lock_recover(&self.state);
            if let Some(last) = state.last_sample_ms {
                if now - last < state.sample_interval_ms {
                    return false;
                }
            }
            state.last_sample_ms = Some(now);
            state.monitors.clone()
        };

        log::trace!("PerformanceMonitor: polling {} monitors", monitors.len());
        for monitor in monitors {
            monitor.update();
            let Some(value) = monitor.sample() else {
                continue;
            };
            let (name, category) = match monitor.resource_type() {
                MonitoredResourceType::Memory => (MEMORY_USAGE, MetricCategory::Memory),
                MonitoredResourceType::Cpu => (CPU_USAGE, MetricCategory::Cpu),
            };
            self.record_metric(name, value, category);
        }
        true
    }
}

/// Updates the streak counters after a frame-rate sample and queues a hint
/// when a streak completes. Returns the event to publish outside the lock.
fn evaluate_frame_rate(state: &mut MonitorState) -> Option<CoreEvent> {
    if !state.auto_optimize || state.store.sample_count(FRAME_RATE) < MIN_ADAPTIVE_SAMPLES {
        return None;
    }

    let average = state.store.average(FRAME_RATE);
    match state.thresholds.classify_frame_rate(average) {
        HealthState::Critical => {
            state.healthy_streak = 0;
            state.critical_streak += 1;
            if state.critical_streak < CRITICAL_STREAK {
                return None;
            }
            state.critical_streak = 0;

            let next = match state.degradation {
                None | Some(OptimizationLevel::Mild) => OptimizationLevel::Moderate,
                Some(OptimizationLevel::Moderate) => OptimizationLevel::Aggressive,
                Some(OptimizationLevel::Aggressive) => return None,
            };
            let reason = format!(
                "frame rate averaging {:.1} fps, below critical threshold {:.1}",
                average.unwrap_or_default(),
                state.thresholds.fps_critical
            );
            log::warn!("PerformanceMonitor: {}; requesting {:?}", reason, next);

            state.degradation = Some(next);
            // Fresh evidence is needed before escalating further.
            state.store.reset(FRAME_RATE);
            state.pending = Some(OptimizationRequest::Degrade {
                level: next,
                reason: reason.clone(),
            });
            Some(CoreEvent::OptimizationRequested {
                level: next,
                reason,
            })
        }
        HealthState::Warning => {
            state.critical_streak = 0;
            state.healthy_streak = 0;
            None
        }
        HealthState::Healthy => {
            state.critical_streak = 0;
            if state.degradation.is_none() {
                return None;
            }
            state.healthy_streak += 1;
            if state.healthy_streak < RECOVERY_STREAK {
                return None;
            }
            state.healthy_streak = 0;
            state.degradation = None;
            log::info!("PerformanceMonitor: frame rate recovered, requesting restore");
            state.pending = Some(OptimizationRequest::Restore {
                reason: "frame rate recovered".to_string(),
            });
            None
        }
    }
}
