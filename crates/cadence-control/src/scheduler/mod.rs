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

//! The frame scheduler.
//!
//! One tick runs every due unit of work in priority tiers (critical, then
//! normal, then background), registration order within a tier, under a
//! frame budget derived from the target frame rate and the performance mode.
//! Critical work always runs; normal work runs while budget remains;
//! background work needs a safety margin. Work that is left out is counted,
//! never silently dropped. The batcher is flushed exactly once at the end.

mod control;
mod work;

pub use control::SchedulerControl;
pub use work::{FrameCallback, WorkHandle, WorkStats, RATE_TOLERANCE_MS};

use crate::batcher::VariableUpdateBatcher;
use cadence_core::telemetry::metrics::{FRAME_RATE, FRAME_TIME};
use cadence_core::telemetry::MetricCategory;
use cadence_core::utils::sync::lock_recover;
use cadence_core::{
    BudgetPolicy, CallbackExecutionError, Clock, CoreConfig, CoreError, CoreEvent, CoreResult,
    EventChannel, FrameContext, HealthIssue, OptimizationLevel, OptimizationRequest,
    PerformanceMode, Priority, SharedSubsystem, Stopwatch, WorkId,
};
use cadence_telemetry::{PerformanceMonitor, RingBuffer, METRIC_WINDOW};
use control::{CallbackIds, ControlRequest, CALLBACK_ID_PREFIX};
use crossbeam_channel::Receiver;
use std::fmt;
use std::sync::Arc;
use work::{WorkEntry, WorkTarget};

/// Consecutive failures after which work is unregistered automatically.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// A tick whose delta exceeds this many frame intervals counts dropped frames.
const DROPPED_FRAME_FACTOR: f64 = 1.5;

/// Aggregated scheduler counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerMetrics {
    /// Ticks executed.
    pub total_frames: u64,
    /// Frames missed between ticks, estimated from tick deltas.
    pub dropped_frames: u64,
    /// Ticks whose own execution time exceeded the frame budget.
    pub over_budget_frames: u64,
    /// Budget skips across all work.
    pub skipped_work: u64,
    /// Moving average of tick execution time, in ms.
    pub average_frame_time: f64,
    /// Longest tick execution time, in ms.
    pub max_frame_time: f64,
    /// Frame rate derived from the moving average of tick deltas.
    pub frame_rate: f64,
    /// Registered work.
    pub active_work: usize,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Tick counter, starting at 1.
    pub frame_number: u64,
    /// Time since the previous tick, in ms.
    pub delta_ms: f64,
    /// Budget in effect, in ms.
    pub frame_budget_ms: f64,
    /// Execution time of the tick including the flush, in ms.
    pub frame_time_ms: f64,
    /// Work that ran successfully, in execution order.
    pub executed: Vec<WorkId>,
    /// Work that was due but skipped for lack of budget.
    pub skipped: Vec<WorkId>,
    /// Work that returned an error or panicked.
    pub failed: Vec<CallbackExecutionError>,
    /// Work removed after repeated failures.
    pub auto_unregistered: Vec<WorkId>,
    /// Property writes sent to the render surface by the flush.
    pub flushed_writes: usize,
}

/// Drives registered work once per tick under a frame budget.
pub struct FrameScheduler {
    entries: Vec<WorkEntry>,
    clock: Arc<dyn Clock>,
    events: EventChannel<CoreEvent>,
    batcher: Option<VariableUpdateBatcher>,
    monitor: Option<PerformanceMonitor>,
    ids: CallbackIds,
    control: SchedulerControl,
    control_rx: Receiver<ControlRequest>,
    frame_interval_ms: f64,
    debug: bool,

    configured_mode: PerformanceMode,
    mode: PerformanceMode,
    optimization: Option<OptimizationLevel>,
    policy: BudgetPolicy,

    running: bool,
    paused: bool,
    resuming: bool,
    last_timestamp: Option<f64>,

    frame_number: u64,
    dropped_frames: u64,
    over_budget_frames: u64,
    skipped_work: u64,
    frame_times: RingBuffer<f64, METRIC_WINDOW>,
    frame_deltas: RingBuffer<f64, METRIC_WINDOW>,
    max_frame_time: f64,
    health_issues: Vec<HealthIssue>,
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("work", &self.work_ids())
            .field("mode", &self.mode)
            .field("running", &self.running)
            .field("paused", &self.paused)
            .field("frame_number", &self.frame_number)
            .finish()
    }
}

impl FrameScheduler {
    /// Creates a stopped scheduler with no work.
    pub fn new(config: &CoreConfig, clock: Arc<dyn Clock>, events: EventChannel<CoreEvent>) -> Self {
        let ids = CallbackIds::default();
        let (control, control_rx) = SchedulerControl::channel(ids.clone());
        Self {
            entries: Vec::new(),
            clock,
            events,
            batcher: None,
            monitor: None,
            ids,
            control,
            control_rx,
            frame_interval_ms: config.frame_interval_ms(),
            debug: config.enable_debug,
            configured_mode: config.performance_mode,
            mode: config.performance_mode,
            optimization: None,
            policy: BudgetPolicy::for_mode(config.performance_mode),
            running: false,
            paused: false,
            resuming: false,
            last_timestamp: None,
            frame_number: 0,
            dropped_frames: 0,
            over_budget_frames: 0,
            skipped_work: 0,
            frame_times: RingBuffer::new(),
            frame_deltas: RingBuffer::new(),
            max_frame_time: 0.0,
            health_issues: Vec::new(),
        }
    }

    /// Sets the batcher flushed at the end of every tick.
    pub fn attach_batcher(&mut self, batcher: VariableUpdateBatcher) {
        self.batcher = Some(batcher);
    }

    /// Sets the monitor that receives frame samples and supplies optimization hints.
    pub fn attach_monitor(&mut self, monitor: PerformanceMonitor) {
        self.monitor = Some(monitor);
    }

    /// A handle for deferred changes from inside running work.
    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    /// Registers a subsystem's `on_animate` as frame work.
    ///
    /// `target_rate` is in Hz; 0 runs every frame. Optional hooks are looked
    /// up once, here.
    pub fn register(
        &mut self,
        id: impl Into<WorkId>,
        priority: Priority,
        target_rate: f64,
        subsystem: SharedSubsystem,
    ) -> CoreResult<WorkHandle> {
        let id = id.into();
        if id.as_str().starts_with(CALLBACK_ID_PREFIX) {
            return Err(CoreError::ReservedId(id));
        }
        if self.contains(&id) {
            return Err(CoreError::DuplicateId(id));
        }
        let capabilities = lock_recover(&subsystem).capabilities();
        log::info!(
            "FrameScheduler: registered '{}' ({:?}, {} Hz)",
            id,
            priority,
            target_rate
        );
        self.entries.push(WorkEntry::new(
            id.clone(),
            priority,
            target_rate,
            WorkTarget::Subsystem {
                instance: subsystem,
                capabilities,
            },
        ));
        Ok(WorkHandle::new(id, self.control.clone()))
    }

    /// Registers a raw callback that runs every frame at `priority`.
    pub fn register_frame_callback<F>(&mut self, callback: F, priority: Priority) -> WorkHandle
    where
        F: FnMut(&FrameContext) -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.ids.next();
        self.insert_callback(id.clone(), priority, Box::new(callback));
        WorkHandle::new(id, self.control.clone())
    }

    fn insert_callback(&mut self, id: WorkId, priority: Priority, callback: FrameCallback) {
        log::debug!("FrameScheduler: registered callback '{}' ({:?})", id, priority);
        self.entries.push(WorkEntry::new(
            id,
            priority,
            0.0,
            WorkTarget::Callback(callback),
        ));
    }

    /// Removes work immediately. Returns `false` if `id` was not registered.
    pub fn unregister(&mut self, id: &WorkId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.id != id);
        let removed = self.entries.len() < before;
        if removed {
            log::info!("FrameScheduler: unregistered '{}'", id);
        } else {
            log::debug!("FrameScheduler: unregister of unknown work '{}'", id);
        }
        removed
    }

    /// `true` if `id` is registered.
    pub fn contains(&self, id: &WorkId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    /// Registered ids in registration order.
    pub fn work_ids(&self) -> Vec<WorkId> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    /// Counters for one unit of work.
    pub fn work_stats(&self, id: &WorkId) -> Option<WorkStats> {
        self.entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.stats.clone())
    }

    /// Issues raised so far, oldest first.
    pub fn health_issues(&self) -> &[HealthIssue] {
        &self.health_issues
    }

    /// Starts ticking. Registrations are kept across stop/start; the first
    /// tick after a start uses the nominal frame interval as its delta.
    pub fn start(&mut self) {
        if self.running {
            if self.paused {
                self.resume();
            }
            return;
        }
        self.running = true;
        self.paused = false;
        self.resuming = false;
        self.last_timestamp = None;
        for entry in &mut self.entries {
            entry.last_run_ms = None;
        }
        log::info!(
            "FrameScheduler: started ({} work, {:.2}ms interval, {} mode)",
            self.entries.len(),
            self.frame_interval_ms,
            self.mode
        );
    }

    /// Stops ticking. Nothing is unregistered.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.paused = false;
        log::info!("FrameScheduler: stopped after {} frames", self.frame_number);
    }

    /// Suspends ticking, keeping timing state.
    pub fn pause(&mut self) {
        if self.running && !self.paused {
            self.paused = true;
            log::debug!("FrameScheduler: paused");
        }
    }

    /// Resumes ticking. The paused interval is not counted as elapsed time:
    /// no frames are reported dropped and rate-limited work keeps its phase.
    pub fn resume(&mut self) {
        if self.running && self.paused {
            self.paused = false;
            self.resuming = true;
            log::debug!("FrameScheduler: resumed");
        }
    }

    /// `true` between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The mode in effect.
    pub fn performance_mode(&self) -> PerformanceMode {
        self.mode
    }

    /// The budget policy in effect.
    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// The optimization level applied from a monitor hint, if any.
    pub fn optimization_level(&self) -> Option<OptimizationLevel> {
        self.optimization
    }

    /// Nominal time between frames, in ms.
    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    /// Switches performance mode and makes it the mode restored after degradation.
    pub fn set_performance_mode(&mut self, mode: PerformanceMode) {
        self.set_performance_mode_with_reason(mode, "requested by host");
    }

    /// Like [`set_performance_mode`](Self::set_performance_mode) with an explicit reason.
    pub fn set_performance_mode_with_reason(&mut self, mode: PerformanceMode, reason: &str) {
        self.configured_mode = mode;
        self.optimization = None;
        if let Some(monitor) = &self.monitor {
            monitor.clear_degradation();
        }
        self.switch_mode(mode, BudgetPolicy::for_mode(mode), reason);
    }

    fn switch_mode(&mut self, mode: PerformanceMode, policy: BudgetPolicy, reason: &str) {
        self.policy = policy;
        let old = self.mode;
        if old == mode {
            log::debug!("FrameScheduler: policy updated, mode stays {}", mode);
            return;
        }
        self.mode = mode;
        log::info!(
            "FrameScheduler: performance mode {} -> {} ({})",
            old,
            mode,
            reason
        );
        for entry in &self.entries {
            entry.notify_mode(mode);
        }
        self.events.publish(CoreEvent::PerformanceModeChanged {
            old,
            new: mode,
            reason: reason.to_string(),
        });
    }

    fn apply_optimization_request(&mut self) {
        let Some(request) = self
            .monitor
            .as_ref()
            .and_then(PerformanceMonitor::take_optimization_request)
        else {
            return;
        };

        match request {
            OptimizationRequest::Degrade { level, reason } => {
                // A degrade never moves to a more expensive mode than configured.
                let mode = level.target_mode().max(self.configured_mode);
                let policy = if mode == level.target_mode() {
                    BudgetPolicy::for_optimization(level)
                } else {
                    BudgetPolicy::for_mode(mode)
                };
                self.optimization = Some(level);
                self.switch_mode(mode, policy, &reason);
            }
            OptimizationRequest::Restore { reason } => {
                let mode = self.configured_mode;
                self.optimization = None;
                self.switch_mode(mode, BudgetPolicy::for_mode(mode), &reason);
            }
        }
    }

    fn apply_control_requests(&mut self) {
        while let Ok(request) = self.control_rx.try_recv() {
            match request {
                ControlRequest::Unregister(id) => {
                    self.unregister(&id);
                }
                ControlRequest::RegisterCallback {
                    id,
                    priority,
                    callback,
                } => {
                    if self.contains(&id) {
                        log::warn!("FrameScheduler: deferred callback '{}' already registered", id);
                    } else {
                        self.insert_callback(id, priority, callback);
                    }
                }
                ControlRequest::SetPerformanceMode { mode, reason } => {
                    self.set_performance_mode_with_reason(mode, &reason);
                }
            }
        }
    }

    /// Runs one frame at host time `timestamp_ms`.
    ///
    /// Returns `None` when stopped or paused.
    pub fn tick(&mut self, timestamp_ms: f64) -> Option<FrameReport> {
        if !self.running || self.paused {
            return None;
        }
        self.apply_control_requests();
        self.apply_optimization_request();

        let interval = self.frame_interval_ms;
        let delta_ms = match self.last_timestamp {
            None => interval,
            Some(last) if self.resuming => {
                let gap = (timestamp_ms - last - interval).max(0.0);
                for entry in &mut self.entries {
                    if let Some(run) = entry.last_run_ms.as_mut() {
                        *run += gap;
                    }
                }
                interval
            }
            Some(last) => (timestamp_ms - last).max(0.0),
        };
        self.resuming = false;
        self.last_timestamp = Some(timestamp_ms);
        self.frame_number += 1;

        let policy = self.policy;
        let budget = interval * policy.budget_multiplier;
        let frame = FrameContext {
            timestamp_ms,
            delta_ms,
            frame_budget_ms: budget,
            performance_mode: self.mode,
            dropped_so_far: self.dropped_frames,
            frame_number: self.frame_number,
        };
        let mut report = FrameReport {
            frame_number: self.frame_number,
            delta_ms,
            frame_budget_ms: budget,
            ..FrameReport::default()
        };

        let stopwatch = Stopwatch::start(&self.clock);
        for tier in Priority::ALL {
            for entry in self.entries.iter_mut().filter(|e| e.priority() == tier) {
                if !entry.is_due(timestamp_ms, policy.rate_scale) {
                    entry.stats.throttled += 1;
                    continue;
                }

                let remaining = budget - stopwatch.elapsed_ms();
                let allowed = match tier {
                    Priority::Critical => true,
                    Priority::Normal => remaining > 0.0,
                    Priority::Background => {
                        !policy.background_suspended
                            && remaining > budget * policy.background_margin
                    }
                };
                if !allowed {
                    entry.stats.skipped += 1;
                    report.skipped.push(entry.id.clone());
                    continue;
                }

                let work_frame = FrameContext {
                    delta_ms: entry
                        .last_run_ms
                        .map_or(delta_ms, |last| timestamp_ms - last),
                    ..frame
                };
                entry.last_run_ms = Some(timestamp_ms);
                match entry.run(&work_frame) {
                    Ok(()) => report.executed.push(entry.id.clone()),
                    Err(error) => {
                        log::warn!("FrameScheduler: {}", error);
                        report.failed.push(error);
                    }
                }
            }
        }
        self.skipped_work += report.skipped.len() as u64;
        self.retire_failing_work(&mut report);

        if let Some(batcher) = &self.batcher {
            report.flushed_writes = batcher.flush().written;
        }
        report.frame_time_ms = stopwatch.elapsed_ms();
        self.record_frame(&report);
        Some(report)
    }

    fn retire_failing_work(&mut self, report: &mut FrameReport) {
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].stats.consecutive_failures < MAX_CONSECUTIVE_FAILURES {
                index += 1;
                continue;
            }
            let entry = self.entries.remove(index);
            let issue = HealthIssue {
                id: entry.id.clone(),
                reason: entry
                    .stats
                    .last_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                consecutive_failures: entry.stats.consecutive_failures,
            };
            log::error!(
                "FrameScheduler: '{}' failed {} times in a row, unregistered: {}",
                issue.id,
                issue.consecutive_failures,
                issue.reason
            );
            report.auto_unregistered.push(entry.id);
            self.events
                .publish(CoreEvent::WorkAutoUnregistered(issue.clone()));
            self.health_issues.push(issue);
        }
    }

    fn record_frame(&mut self, report: &FrameReport) {
        let interval = self.frame_interval_ms;
        self.frame_times.push(report.frame_time_ms);
        self.frame_deltas.push(report.delta_ms);
        self.max_frame_time = self.max_frame_time.max(report.frame_time_ms);

        if report.delta_ms > interval * DROPPED_FRAME_FACTOR {
            let elapsed_frames = (report.delta_ms / interval).round() as u64;
            self.dropped_frames += elapsed_frames.saturating_sub(1);
        }
        if report.frame_time_ms > report.frame_budget_ms {
            self.over_budget_frames += 1;
        }

        if let Some(monitor) = &self.monitor {
            monitor.record_metric(FRAME_TIME, report.frame_time_ms, MetricCategory::Timing);
            if report.delta_ms > 0.0 {
                monitor.record_metric(FRAME_RATE, 1000.0 / report.delta_ms, MetricCategory::Rate);
            }
        }

        if self.debug {
            log::debug!(
                "FrameScheduler: frame {} delta={:.2}ms time={:.2}ms/{:.2}ms ran={} skipped={} failed={} writes={}",
                report.frame_number,
                report.delta_ms,
                report.frame_time_ms,
                report.frame_budget_ms,
                report.executed.len(),
                report.skipped.len(),
                report.failed.len(),
                report.flushed_writes
            );
        } else {
            log::trace!(
                "FrameScheduler: frame {} done in {:.2}ms",
                report.frame_number,
                report.frame_time_ms
            );
        }
    }

    /// Aggregated counters.
    pub fn get_metrics(&self) -> SchedulerMetrics {
        let average_delta = self.frame_deltas.average();
        SchedulerMetrics {
            total_frames: self.frame_number,
            dropped_frames: self.dropped_frames,
            over_budget_frames: self.over_budget_frames,
            skipped_work: self.skipped_work,
            average_frame_time: self.frame_times.average(),
            max_frame_time: self.max_frame_time,
            frame_rate: if average_delta > 0.0 {
                1000.0 / average_delta
            } else {
                0.0
            },
            active_work: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{shared, HealthCheckResult, ManualClock, Subsystem, SubsystemCapabilities};
    use std::sync::Mutex;

    fn scheduler(clock: &ManualClock) -> FrameScheduler {
        let config = CoreConfig {
            target_fps: 50, // 20ms interval
            performance_mode: PerformanceMode::Quality,
            auto_optimize: false,
            ..CoreConfig::default()
        };
        FrameScheduler::new(&config, Arc::new(clock.clone()), EventChannel::new())
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> impl FnMut(&FrameContext) -> anyhow::Result<()> + Send + 'static {
        let log = Arc::clone(log);
        let name = name.to_string();
        move |_| {
            log.lock().unwrap().push(name.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct ModeAware {
        modes: Vec<PerformanceMode>,
    }

    impl Subsystem for ModeAware {
        fn initialize(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
            Ok(HealthCheckResult::healthy("ok"))
        }
        fn capabilities(&self) -> SubsystemCapabilities {
            SubsystemCapabilities::ALL
        }
        fn on_performance_mode_change(&mut self, mode: PerformanceMode) {
            self.modes.push(mode);
        }
    }

    #[test]
    fn test_tick_requires_start_and_respects_pause() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        assert!(scheduler.tick(0.0).is_none());

        scheduler.start();
        assert!(scheduler.tick(0.0).is_some());
        scheduler.pause();
        assert!(scheduler.tick(20.0).is_none());
        scheduler.resume();
        assert!(scheduler.tick(40.0).is_some());
        assert_eq!(scheduler.get_metrics().total_frames, 2);
    }

    #[test]
    fn test_stop_then_start_keeps_registrations() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = scheduler.register_frame_callback(recorder(&log, "pulse"), Priority::Normal);

        scheduler.start();
        scheduler.tick(0.0);
        scheduler.stop();
        assert!(scheduler.tick(20.0).is_none());
        assert!(scheduler.contains(handle.id()));

        scheduler.start();
        let report = scheduler.tick(1000.0).unwrap();
        assert_eq!(report.executed, vec![handle.id().clone()]);
        // The first tick after a restart uses the nominal interval.
        assert_eq!(report.delta_ms, 20.0);
        assert_eq!(*log.lock().unwrap(), vec!["pulse", "pulse"]);
    }

    #[test]
    fn test_tiers_run_in_priority_then_registration_order() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.register_frame_callback(recorder(&log, "bg"), Priority::Background);
        scheduler.register_frame_callback(recorder(&log, "n1"), Priority::Normal);
        scheduler.register_frame_callback(recorder(&log, "c"), Priority::Critical);
        scheduler.register_frame_callback(recorder(&log, "n2"), Priority::Normal);

        scheduler.start();
        scheduler.tick(0.0);
        assert_eq!(*log.lock().unwrap(), vec!["c", "n1", "n2", "bg"]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler
            .register("glow", Priority::Normal, 0.0, shared(ModeAware::default()))
            .unwrap();
        let err = scheduler
            .register("glow", Priority::Critical, 0.0, shared(ModeAware::default()))
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateId(WorkId::new("glow")));
    }

    #[test]
    fn test_generated_callback_ids_stay_unique() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let err = scheduler
            .register("frame-callback-1", Priority::Normal, 0.0, shared(ModeAware::default()))
            .unwrap_err();
        assert_eq!(err, CoreError::ReservedId(WorkId::new("frame-callback-1")));

        let first = scheduler.register_frame_callback(|_| Ok(()), Priority::Normal);
        let second = scheduler.register_frame_callback(|_| Ok(()), Priority::Normal);
        assert_ne!(first.id(), second.id());
        assert_eq!(scheduler.work_ids(), vec![first.id().clone(), second.id().clone()]);
    }

    #[test]
    fn test_background_needs_margin() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let spender = clock.clone();
        // Quality: budget 20ms, margin 20% => background needs > 4ms left.
        scheduler.register_frame_callback(
            move |_| {
                spender.advance(17.0);
                Ok(())
            },
            Priority::Critical,
        );
        let bg = scheduler.register_frame_callback(|_| Ok(()), Priority::Background);

        scheduler.start();
        let report = scheduler.tick(0.0).unwrap();
        assert_eq!(report.skipped, vec![bg.id().clone()]);
        assert_eq!(scheduler.work_stats(bg.id()).unwrap().skipped, 1);
        assert_eq!(scheduler.get_metrics().skipped_work, 1);
    }

    #[test]
    fn test_three_failures_auto_unregister() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let events = scheduler.events.clone();
        let rx = events.subscribe();
        let bad = scheduler.register_frame_callback(
            |_| anyhow::bail!("lost context"),
            Priority::Normal,
        );

        scheduler.start();
        for frame in 0..2 {
            let report = scheduler.tick(frame as f64 * 20.0).unwrap();
            assert_eq!(report.failed.len(), 1);
            assert!(report.auto_unregistered.is_empty());
        }
        let report = scheduler.tick(40.0).unwrap();
        assert_eq!(report.auto_unregistered, vec![bad.id().clone()]);
        assert!(!scheduler.contains(bad.id()));

        let issue = &scheduler.health_issues()[0];
        assert_eq!(issue.consecutive_failures, 3);
        assert!(issue.reason.contains("lost context"));
        assert!(matches!(rx.try_recv(), Ok(CoreEvent::WorkAutoUnregistered(_))));
    }

    #[test]
    fn test_dropped_frames_from_delta() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start();
        scheduler.tick(0.0);
        scheduler.tick(20.0);
        // 60ms gap = 3 intervals, 2 of them missed.
        scheduler.tick(80.0);
        assert_eq!(scheduler.get_metrics().dropped_frames, 2);
    }

    #[test]
    fn test_resume_does_not_count_pause_as_dropped() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        scheduler.start();
        scheduler.tick(0.0);
        scheduler.pause();
        scheduler.resume();
        let report = scheduler.tick(5_000.0).unwrap();
        assert_eq!(report.delta_ms, scheduler.frame_interval_ms());
        assert_eq!(scheduler.get_metrics().dropped_frames, 0);
    }

    #[test]
    fn test_target_rate_throttles_work() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let subsystem = shared(ModeAware::default());
        let handle = scheduler
            .register("slow", Priority::Normal, 25.0, subsystem)
            .unwrap();

        scheduler.start();
        for frame in 0..4 {
            scheduler.tick(frame as f64 * 20.0);
        }
        // 25 Hz = 40ms: runs at 0 and 40, throttled at 20 and 60.
        let stats = scheduler.work_stats(handle.id()).unwrap();
        assert_eq!(stats.executions, 2);
        assert_eq!(stats.throttled, 2);
    }

    #[test]
    fn test_mode_change_notifies_capable_subsystems() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let rx = scheduler.events.subscribe();
        let aware = Arc::new(Mutex::new(ModeAware::default()));
        scheduler
            .register("aware", Priority::Normal, 0.0, aware.clone())
            .unwrap();

        scheduler.set_performance_mode(PerformanceMode::Performance);
        assert_eq!(aware.lock().unwrap().modes, vec![PerformanceMode::Performance]);
        assert_eq!(scheduler.policy(), BudgetPolicy::for_mode(PerformanceMode::Performance));
        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::PerformanceModeChanged {
                old: PerformanceMode::Quality,
                new: PerformanceMode::Performance,
                ..
            })
        ));

        // Same mode again: no notification.
        scheduler.set_performance_mode(PerformanceMode::Performance);
        assert_eq!(aware.lock().unwrap().modes.len(), 1);
    }

    #[test]
    fn test_aggressive_hint_suspends_background_until_restore() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let monitor = PerformanceMonitor::new(
            &CoreConfig {
                auto_optimize: false,
                ..CoreConfig::default()
            },
            Arc::new(clock.clone()),
            EventChannel::new(),
        );
        scheduler.attach_monitor(monitor.clone());
        let bg = scheduler.register_frame_callback(|_| Ok(()), Priority::Background);

        scheduler.start();
        monitor.request_optimization(OptimizationLevel::Aggressive);
        let report = scheduler.tick(0.0).unwrap();
        assert_eq!(report.skipped, vec![bg.id().clone()]);
        assert_eq!(scheduler.performance_mode(), PerformanceMode::Performance);
        assert_eq!(scheduler.optimization_level(), Some(OptimizationLevel::Aggressive));

        scheduler.set_performance_mode(PerformanceMode::Quality);
        let report = scheduler.tick(20.0).unwrap();
        assert_eq!(report.executed, vec![bg.id().clone()]);
    }

    #[test]
    fn test_host_mode_override_lets_monitor_degrade_again() {
        let clock = ManualClock::new(0.0);
        let config = CoreConfig {
            target_fps: 60,
            performance_mode: PerformanceMode::Quality,
            auto_optimize: true,
            ..CoreConfig::default()
        };
        let monitor = PerformanceMonitor::new(&config, Arc::new(clock.clone()), EventChannel::new());
        let mut scheduler = FrameScheduler::new(&config, Arc::new(clock.clone()), EventChannel::new());
        scheduler.attach_monitor(monitor.clone());

        scheduler.start();
        monitor.request_optimization(OptimizationLevel::Aggressive);
        scheduler.tick(0.0);
        assert_eq!(scheduler.optimization_level(), Some(OptimizationLevel::Aggressive));

        scheduler.set_performance_mode(PerformanceMode::Quality);
        assert_eq!(monitor.degradation(), None);

        // 10 fps against a 60 fps target: the seventh sample completes the streak.
        for frame in 1..=10 {
            scheduler.tick(frame as f64 * 100.0);
        }
        assert_eq!(scheduler.performance_mode(), PerformanceMode::Performance);
        assert_eq!(scheduler.optimization_level(), Some(OptimizationLevel::Moderate));
    }

    #[test]
    fn test_control_requests_apply_next_tick() {
        let clock = ManualClock::new(0.0);
        let mut scheduler = scheduler(&clock);
        let control = scheduler.control();
        let counter = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&counter);
        let spawned = Arc::new(Mutex::new(None));
        let spawned_id = Arc::clone(&spawned);

        scheduler.register_frame_callback(
            move |_| {
                let mut slot = spawned_id.lock().unwrap();
                if slot.is_none() {
                    let seen = Arc::clone(&seen);
                    *slot = Some(control.register_frame_callback(
                        move |_| {
                            *seen.lock().unwrap() += 1;
                            Ok(())
                        },
                        Priority::Normal,
                    ));
                }
                Ok(())
            },
            Priority::Critical,
        );

        scheduler.start();
        let first = scheduler.tick(0.0).unwrap();
        assert_eq!(first.executed.len(), 1);
        assert_eq!(*counter.lock().unwrap(), 0);

        scheduler.tick(20.0);
        assert_eq!(*counter.lock().unwrap(), 1);
        assert_eq!(scheduler.get_metrics().active_work, 2);
    }
}
