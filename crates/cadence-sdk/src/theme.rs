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

//! The context object that owns and wires the four coordination components.

use cadence_control::{
    FrameReport, FrameScheduler, InitializationReport, SchedulerMetrics, SystemRegistry,
    UpdateMetrics, VariableUpdateBatcher,
};
use cadence_core::{
    Clock, CoreConfig, CoreEvent, CoreResult, EventChannel, HealthAggregate, PerformanceMode,
    Priority, RenderSurface, SharedSubsystem, SystemClock, WorkId,
};
use cadence_telemetry::{HealthStatus, PerformanceMonitor, SystemResourceMonitor};
use std::collections::HashMap;
use std::sync::Arc;

/// How a subsystem takes part in the frame loop once initialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSchedule {
    /// Execution tier.
    pub priority: Priority,
    /// Target rate in Hz; 0 runs every frame.
    pub target_rate: f64,
}

impl FrameSchedule {
    /// Creates a schedule.
    pub fn new(priority: Priority, target_rate: f64) -> Self {
        Self {
            priority,
            target_rate,
        }
    }

    /// Every frame at `priority`.
    pub fn every_frame(priority: Priority) -> Self {
        Self::new(priority, 0.0)
    }
}

impl Default for FrameSchedule {
    fn default() -> Self {
        Self::every_frame(Priority::Normal)
    }
}

/// Combined metrics of the scheduler, the batcher and the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreMetrics {
    /// Frame scheduler counters.
    pub scheduler: SchedulerMetrics,
    /// Variable batcher counters.
    pub updates: UpdateMetrics,
    /// Current resource health.
    pub health: HealthStatus,
}

/// Owns the frame scheduler, the variable batcher, the subsystem registry
/// and the performance monitor, and drives them together.
///
/// There is no global instance: create one per host surface and pass it,
/// or the handles it gives out, to whoever needs them.
pub struct ThemeCore {
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    events: EventChannel<CoreEvent>,
    monitor: PerformanceMonitor,
    batcher: VariableUpdateBatcher,
    scheduler: FrameScheduler,
    registry: SystemRegistry,
    schedules: HashMap<String, FrameSchedule>,
    last_health_check_ms: Option<f64>,
    last_health: Option<HealthAggregate>,
}

impl std::fmt::Debug for ThemeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeCore")
            .field("scheduler", &self.scheduler)
            .field("registry", &self.registry)
            .field("batcher", &self.batcher)
            .finish()
    }
}

impl ThemeCore {
    /// Creates a core on the system clock, with process memory and CPU monitors.
    pub fn new(config: CoreConfig, surface: Box<dyn RenderSurface>) -> CoreResult<Self> {
        let core = Self::with_clock(config, surface, Arc::new(SystemClock::new()))?;
        core.monitor
            .register_monitor(Arc::new(SystemResourceMonitor::memory()));
        core.monitor
            .register_monitor(Arc::new(SystemResourceMonitor::cpu()));
        Ok(core)
    }

    /// Creates a core reading time from `clock`, with no resource monitors.
    pub fn with_clock(
        config: CoreConfig,
        surface: Box<dyn RenderSurface>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let events = EventChannel::new();
        let monitor = PerformanceMonitor::new(&config, Arc::clone(&clock), events.clone());

        let batcher = VariableUpdateBatcher::new(
            surface,
            config.critical_keys.iter().cloned(),
            Arc::clone(&clock),
        );
        batcher.attach_monitor(monitor.clone());
        batcher.attach_events(events.clone());

        let mut scheduler = FrameScheduler::new(&config, Arc::clone(&clock), events.clone());
        scheduler.attach_batcher(batcher.clone());
        scheduler.attach_monitor(monitor.clone());

        let registry = SystemRegistry::new(
            Arc::clone(&clock),
            config.max_initialization_time as f64,
        );

        log::info!(
            "ThemeCore: created ({} fps, {} mode, {} critical keys)",
            config.target_fps,
            config.performance_mode,
            config.critical_keys.len()
        );

        Ok(Self {
            config,
            clock,
            events,
            monitor,
            batcher,
            scheduler,
            registry,
            schedules: HashMap::new(),
            last_health_check_ms: None,
            last_health: None,
        })
    }

    /// Registers a subsystem with the registry. With a `schedule`, it is
    /// added to the frame loop once it initializes successfully.
    pub fn register_subsystem<I, S>(
        &mut self,
        name: &str,
        instance: SharedSubsystem,
        dependencies: I,
        schedule: Option<FrameSchedule>,
    ) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register(name, instance, dependencies)?;
        if let Some(schedule) = schedule {
            self.schedules.insert(name.to_string(), schedule);
        }
        Ok(())
    }

    /// Initializes every registered subsystem in dependency order and
    /// schedules those that came up.
    pub fn initialize(&mut self) -> CoreResult<InitializationReport> {
        let report = self.registry.initialize_all()?;
        for name in &report.success {
            let Some(schedule) = self.schedules.get(name) else {
                continue;
            };
            let id = WorkId::new(name.as_str());
            if self.scheduler.contains(&id) {
                continue;
            }
            self.scheduler.register(
                id,
                schedule.priority,
                schedule.target_rate,
                self.registry.get(name)?,
            )?;
        }
        Ok(report)
    }

    /// Starts the frame loop.
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Stops the frame loop; registrations are kept.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Suspends ticking.
    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    /// Resumes ticking.
    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    /// Runs one frame at `timestamp_ms`, then polls resource monitors and
    /// runs the periodic health check when due.
    pub fn tick(&mut self, timestamp_ms: f64) -> Option<FrameReport> {
        let report = self.scheduler.tick(timestamp_ms)?;
        self.monitor.sample_resources();

        let now = self.clock.now_ms();
        let due = self
            .last_health_check_ms
            .is_none_or(|last| now - last >= self.config.health_check_interval as f64);
        if due {
            self.health_check();
        }
        Some(report)
    }

    /// Runs a registry-wide health check now and publishes the result.
    ///
    /// Work the scheduler retired for repeated failures is reported unhealthy
    /// regardless of what its own check says.
    pub fn health_check(&mut self) -> HealthAggregate {
        self.last_health_check_ms = Some(self.clock.now_ms());
        let mut aggregate = self.registry.perform_health_check();
        for issue in self.scheduler.health_issues() {
            aggregate.raise(issue);
        }
        if !aggregate.all_healthy() {
            log::warn!(
                "ThemeCore: unhealthy subsystems: {:?}",
                aggregate.unhealthy
            );
        }
        self.events
            .publish(CoreEvent::HealthCheckCompleted(aggregate.clone()));
        self.last_health = Some(aggregate.clone());
        aggregate
    }

    /// The most recent health check result.
    pub fn last_health(&self) -> Option<&HealthAggregate> {
        self.last_health.as_ref()
    }

    /// Switches performance mode for the scheduler and every capable subsystem.
    pub fn set_performance_mode(&mut self, mode: PerformanceMode) {
        self.scheduler.set_performance_mode(mode);
    }

    /// Asks every capable subsystem to repaint.
    pub fn force_repaint(&self, reason: Option<&str>) -> usize {
        self.registry.force_repaint_all(reason)
    }

    /// Subscribes to core events.
    pub fn subscribe(&self) -> flume::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Combined metrics snapshot.
    pub fn get_metrics(&self) -> CoreMetrics {
        CoreMetrics {
            scheduler: self.scheduler.get_metrics(),
            updates: self.batcher.get_update_metrics(),
            health: self.monitor.get_health_status(),
        }
    }

    /// The batcher handle to give to subsystems.
    pub fn batcher(&self) -> &VariableUpdateBatcher {
        &self.batcher
    }

    /// The performance monitor handle.
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// The frame scheduler.
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Mutable access to the frame scheduler, e.g. to register raw callbacks.
    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    /// The subsystem registry.
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// The event channel, for publishers outside the core.
    pub fn events(&self) -> &EventChannel<CoreEvent> {
        &self.events
    }

    /// The clock all components read.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The validated configuration.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Stops the loop, drops pending writes, unschedules subsystems and
    /// destroys them in reverse dependency order.
    pub fn destroy(&mut self) {
        self.scheduler.stop();
        self.batcher.clear_queue();
        for name in self.registry.names() {
            self.scheduler.unregister(&WorkId::new(name));
        }
        let destroyed = self.registry.destroy_all();
        log::info!("ThemeCore: destroyed {} subsystems", destroyed.len());
    }
}
