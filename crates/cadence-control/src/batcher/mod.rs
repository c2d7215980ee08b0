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

//! The variable update batcher.
//!
//! Collects style-property writes from every subsystem during a tick and
//! applies them to the render surface in a single pass when the scheduler
//! flushes. Writes whose value is already applied are dropped before the
//! surface is touched; a flush where nothing changed makes no surface call
//! at all. Keys on the critical allowlist skip the queue and are written
//! immediately.

mod cache;
mod detector;

pub use cache::AppliedValueCache;
pub use detector::{ChangeDetector, ChangeSet, PendingWrite};

use cadence_core::telemetry::metrics::FLUSH_TIME;
use cadence_core::telemetry::MetricCategory;
use cadence_core::utils::sync::lock_recover;
use cadence_core::{
    Clock, CoreEvent, EventChannel, Priority, PropertyWrite, RenderSurface, Stopwatch,
};
use cadence_telemetry::{PerformanceMonitor, RingBuffer, METRIC_WINDOW};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Snapshot of the batcher's counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMetrics {
    /// Every queued write, critical or not.
    pub total_updates: u64,
    /// Writes that took the immediate critical path.
    pub critical_updates: u64,
    /// Writes currently pending.
    pub queue_size: usize,
    /// Moving average of flush duration, in ms.
    pub average_update_time: f64,
    /// Longest flush observed, in ms.
    pub max_update_time: f64,
    /// Clock time of the last flush, if any.
    pub last_flush: Option<f64>,
    /// Individual property writes sent to the render surface.
    pub total_writes: u64,
    /// Number of `flush` calls.
    pub flush_count: u64,
    /// Pending writes dropped by change detection, lifetime.
    pub skipped_count: u64,
    /// Pending writes compared by change detection, lifetime.
    pub total_evaluated: u64,
    /// `skipped / evaluated` of the most recent flush that evaluated anything.
    pub efficiency_ratio: f64,
    /// `skipped_count / total_evaluated`.
    pub lifetime_efficiency: f64,
    /// Writes applied per group id.
    pub group_updates: BTreeMap<String, u64>,
}

/// What a single flush did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Pending writes compared against the cache.
    pub evaluated: usize,
    /// Writes dropped as unchanged.
    pub skipped: usize,
    /// Writes sent to the render surface.
    pub written: usize,
}

#[derive(Debug, Default)]
struct BatcherStats {
    total_updates: u64,
    critical_updates: u64,
    total_writes: u64,
    flush_count: u64,
    skipped_count: u64,
    total_evaluated: u64,
    last_efficiency: f64,
    last_flush: Option<f64>,
    flush_times: RingBuffer<f64, METRIC_WINDOW>,
    max_flush_time: f64,
    group_updates: BTreeMap<String, u64>,
}

struct BatcherState {
    surface: Box<dyn RenderSurface>,
    critical_keys: HashSet<String>,
    pending: Vec<PendingWrite>,
    pending_index: HashMap<String, usize>,
    cache: AppliedValueCache,
    stats: BatcherStats,
    monitor: Option<PerformanceMonitor>,
    events: Option<EventChannel<CoreEvent>>,
}

impl BatcherState {
    fn enqueue(&mut self, write: PendingWrite) {
        match self.pending_index.get(&write.key) {
            // Last write wins; the slot keeps its original queue position.
            Some(&slot) => self.pending[slot] = write,
            None => {
                self.pending_index.insert(write.key.clone(), self.pending.len());
                self.pending.push(write);
            }
        }
    }

    fn remove_pending(&mut self, key: &str) {
        if let Some(slot) = self.pending_index.remove(key) {
            self.pending.remove(slot);
            for index in self.pending_index.values_mut() {
                if *index > slot {
                    *index -= 1;
                }
            }
        }
    }

    fn attribute(&mut self, group: Option<&String>) {
        if let Some(group) = group {
            *self.stats.group_updates.entry(group.clone()).or_insert(0) += 1;
        }
    }

    fn write_immediately(&mut self, key: String, value: String, group: Option<String>) {
        self.stats.critical_updates += 1;
        // A queued value for the same key is now stale.
        self.remove_pending(&key);
        if self.cache.matches(&key, &value) {
            return;
        }
        self.surface
            .apply(&[PropertyWrite::new(key.clone(), value.clone())]);
        self.stats.total_writes += 1;
        self.attribute(group.as_ref());
        self.cache.commit(key, value);
    }

    fn queue(&mut self, key: String, value: String, priority: Priority, group: Option<String>) {
        self.stats.total_updates += 1;
        if self.critical_keys.contains(&key) {
            self.write_immediately(key, value, group);
        } else {
            self.enqueue(PendingWrite {
                key,
                value,
                priority,
                group,
            });
        }
    }
}

/// Shared handle to the batcher. Clones are cheap and queue into the same
/// pending set; subsystems usually hold one each.
#[derive(Clone)]
pub struct VariableUpdateBatcher {
    state: Arc<Mutex<BatcherState>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for VariableUpdateBatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_recover(&self.state);
        f.debug_struct("VariableUpdateBatcher")
            .field("queue_size", &state.pending.len())
            .field("applied", &state.cache.len())
            .field("critical_keys", &state.critical_keys.len())
            .finish()
    }
}

impl VariableUpdateBatcher {
    /// Creates a batcher writing to `surface`, treating `critical_keys` as
    /// the immediate-write allowlist.
    pub fn new<I, S>(surface: Box<dyn RenderSurface>, critical_keys: I, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Arc::new(Mutex::new(BatcherState {
                surface,
                critical_keys: critical_keys.into_iter().map(Into::into).collect(),
                pending: Vec::new(),
                pending_index: HashMap::new(),
                cache: AppliedValueCache::new(),
                stats: BatcherStats::default(),
                monitor: None,
                events: None,
            })),
            clock,
        }
    }

    /// Reports flush durations to `monitor`.
    pub fn attach_monitor(&self, monitor: PerformanceMonitor) {
        lock_recover(&self.state).monitor = Some(monitor);
    }

    /// Publishes `VariablesApplied` on `events` after every flush that wrote something.
    pub fn attach_events(&self, events: EventChannel<CoreEvent>) {
        lock_recover(&self.state).events = Some(events);
    }

    /// Queues one write, or writes it immediately if `key` is critical.
    pub fn queue_update(&self, key: impl Into<String>, value: impl Into<String>, priority: Priority) {
        lock_recover(&self.state).queue(key.into(), value.into(), priority, None);
    }

    /// Queues every entry of `updates`.
    pub fn queue_batch<I, K, V>(&self, updates: I, priority: Priority)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = lock_recover(&self.state);
        for (key, value) in updates {
            state.queue(key.into(), value.into(), priority, None);
        }
    }

    /// Queues every entry of `updates`, attributing applied writes to `group_id`.
    pub fn queue_group_update<I, K, V>(&self, group_id: &str, updates: I, priority: Priority)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = lock_recover(&self.state);
        for (key, value) in updates {
            state.queue(
                key.into(),
                value.into(),
                priority,
                Some(group_id.to_string()),
            );
        }
    }

    /// Applies every changed pending write in one surface pass and commits
    /// them to the cache. The queue is emptied even when nothing changed.
    pub fn flush(&self) -> FlushOutcome {
        let stopwatch = Stopwatch::start(&self.clock);
        let mut state = lock_recover(&self.state);
        state.pending_index.clear();
        let pending = std::mem::take(&mut state.pending);

        let changes = ChangeDetector::detect(&state.cache, pending);
        let outcome = FlushOutcome {
            evaluated: changes.evaluated,
            skipped: changes.skipped,
            written: changes.staged.len(),
        };

        state.stats.flush_count += 1;
        state.stats.total_evaluated += outcome.evaluated as u64;
        state.stats.skipped_count += outcome.skipped as u64;
        if outcome.evaluated > 0 {
            state.stats.last_efficiency = outcome.skipped as f64 / outcome.evaluated as f64;
        }

        let mut applied_event = None;
        if !changes.is_empty() {
            let mut staged = changes.staged;
            // Stable: queue order is kept within a priority.
            staged.sort_by_key(|write| write.priority);

            let writes: Vec<PropertyWrite> = staged
                .iter()
                .map(|write| PropertyWrite::new(write.key.clone(), write.value.clone()))
                .collect();
            state.surface.apply(&writes);

            for write in staged {
                state.attribute(write.group.as_ref());
                state.cache.commit(write.key, write.value);
            }
            state.stats.total_writes += outcome.written as u64;

            if state.events.is_some() {
                applied_event = Some(CoreEvent::VariablesApplied {
                    values: state.cache.snapshot(),
                    written: outcome.written,
                    timestamp_ms: stopwatch.started_at_ms(),
                });
            }
        }

        let elapsed = stopwatch.elapsed_ms();
        state.stats.last_flush = Some(stopwatch.started_at_ms());
        state.stats.flush_times.push(elapsed);
        state.stats.max_flush_time = state.stats.max_flush_time.max(elapsed);

        let monitor = state.monitor.clone();
        let events = state.events.clone();
        drop(state);

        log::trace!(
            "VariableUpdateBatcher: flushed {} evaluated, {} skipped, {} written in {:.3}ms",
            outcome.evaluated,
            outcome.skipped,
            outcome.written,
            elapsed
        );

        if let Some(monitor) = monitor {
            monitor.record_metric(FLUSH_TIME, elapsed, MetricCategory::Timing);
        }
        if let (Some(events), Some(event)) = (events, applied_event) {
            events.publish(event);
        }
        outcome
    }

    /// Drops every pending write without touching the cache. Returns how many were dropped.
    pub fn clear_queue(&self) -> usize {
        let mut state = lock_recover(&self.state);
        state.pending_index.clear();
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            log::debug!("VariableUpdateBatcher: cleared {} pending writes", dropped);
        }
        dropped
    }

    /// The value currently applied for `key`.
    pub fn applied_value(&self, key: &str) -> Option<String> {
        lock_recover(&self.state).cache.get(key).map(str::to_string)
    }

    /// Sorted copy of every applied key/value.
    pub fn applied_snapshot(&self) -> BTreeMap<String, String> {
        lock_recover(&self.state).cache.snapshot()
    }

    /// Adds `key` to the critical allowlist. Returns `false` if it was already there.
    ///
    /// A write for `key` already pending stays queued and is applied by the next flush.
    pub fn declare_critical_key(&self, key: impl Into<String>) -> bool {
        let key = key.into();
        let added = lock_recover(&self.state).critical_keys.insert(key.clone());
        if added {
            log::debug!("VariableUpdateBatcher: '{}' declared critical", key);
        }
        added
    }

    /// `true` if writes to `key` bypass the queue.
    pub fn is_critical(&self, key: &str) -> bool {
        lock_recover(&self.state).critical_keys.contains(key)
    }

    /// The critical allowlist, sorted.
    pub fn critical_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock_recover(&self.state)
            .critical_keys
            .iter()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of pending writes.
    pub fn queue_size(&self) -> usize {
        lock_recover(&self.state).pending.len()
    }

    /// Snapshot of all counters.
    pub fn get_update_metrics(&self) -> UpdateMetrics {
        let state = lock_recover(&self.state);
        let stats = &state.stats;
        let lifetime_efficiency = if stats.total_evaluated > 0 {
            stats.skipped_count as f64 / stats.total_evaluated as f64
        } else {
            0.0
        };
        UpdateMetrics {
            total_updates: stats.total_updates,
            critical_updates: stats.critical_updates,
            queue_size: state.pending.len(),
            average_update_time: stats.flush_times.average(),
            max_update_time: stats.max_flush_time,
            last_flush: stats.last_flush,
            total_writes: stats.total_writes,
            flush_count: stats.flush_count,
            skipped_count: stats.skipped_count,
            total_evaluated: stats.total_evaluated,
            efficiency_ratio: stats.last_efficiency,
            lifetime_efficiency,
            group_updates: stats.group_updates.clone(),
        }
    }
}
