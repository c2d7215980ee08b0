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

// Cadence Sandbox
// Drives three layers against an in-memory surface for a few seconds.

use anyhow::Result;
use cadence_control::VariableUpdateBatcher;
use cadence_sdk::prelude::*;
use cadence_sdk::{init_logging, FrameLoop};

const RUN_FRAMES: u64 = 180;

/// Slowly rotating background gradient.
struct Gradient {
    batcher: VariableUpdateBatcher,
    angle: f64,
}

impl Subsystem for Gradient {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.batcher
            .queue_update("--cadence-gradient-angle", "0deg", Priority::Normal);
        Ok(())
    }

    fn on_animate(&mut self, delta_ms: f64, _frame: &FrameContext) -> anyhow::Result<()> {
        // One turn every 20 seconds, snapped to whole degrees.
        self.angle = (self.angle + delta_ms * 0.018) % 360.0;
        self.batcher.queue_update(
            "--cadence-gradient-angle",
            format!("{}deg", self.angle.floor()),
            Priority::Normal,
        );
        Ok(())
    }

    fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
        Ok(HealthCheckResult::healthy(format!("angle {:.0}", self.angle)))
    }
}

/// Beat-synchronised pulse. The intensity key bypasses batching.
struct BeatPulse {
    batcher: VariableUpdateBatcher,
    bpm: f64,
    beats: u64,
}

impl Subsystem for BeatPulse {
    fn initialize(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(self.bpm > 0.0, "bpm must be positive");
        Ok(())
    }

    fn on_animate(&mut self, _delta_ms: f64, frame: &FrameContext) -> anyhow::Result<()> {
        let beat_ms = 60_000.0 / self.bpm;
        let beat = (frame.timestamp_ms / beat_ms).floor() as u64;
        let phase = (frame.timestamp_ms % beat_ms) / beat_ms;
        self.beats = beat;

        self.batcher.queue_update(
            "--cadence-beat-intensity",
            format!("{:.2}", 1.0 - phase),
            Priority::Critical,
        );
        self.batcher
            .queue_update("--cadence-beat-count", beat.to_string(), Priority::Normal);
        Ok(())
    }

    fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
        Ok(HealthCheckResult::healthy(format!("{} beats", self.beats)))
    }
}

/// Decorative particles; the first thing to give up under load.
struct Particles {
    batcher: VariableUpdateBatcher,
    count: u32,
    dirty: bool,
}

impl Subsystem for Particles {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.dirty = true;
        Ok(())
    }

    fn on_animate(&mut self, _delta_ms: f64, _frame: &FrameContext) -> anyhow::Result<()> {
        if self.dirty {
            self.batcher.queue_update(
                "--cadence-particle-count",
                self.count.to_string(),
                Priority::Background,
            );
            self.dirty = false;
        }
        Ok(())
    }

    fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
        Ok(HealthCheckResult::healthy(format!("{} particles", self.count)))
    }

    fn capabilities(&self) -> SubsystemCapabilities {
        SubsystemCapabilities::ALL
    }

    fn on_performance_mode_change(&mut self, mode: PerformanceMode) {
        self.count = match mode {
            PerformanceMode::Quality => 400,
            PerformanceMode::Balanced => 200,
            PerformanceMode::Performance => 50,
        };
        self.dirty = true;
    }

    fn force_repaint(&mut self, _reason: Option<&str>) {
        self.dirty = true;
    }
}

fn main() -> Result<()> {
    let config = CoreConfig {
        enable_debug: std::env::args().any(|arg| arg == "--debug"),
        ..CoreConfig::default()
    };
    init_logging(&config);

    let surface = MemorySurface::new();
    let mut core = ThemeCore::new(config, Box::new(surface.clone()))?;
    let events = core.subscribe();
    let batcher = core.batcher().clone();

    core.register_subsystem(
        "gradient",
        shared(Gradient {
            batcher: batcher.clone(),
            angle: 0.0,
        }),
        Vec::<String>::new(),
        Some(FrameSchedule::every_frame(Priority::Normal)),
    )?;
    core.register_subsystem(
        "beat",
        shared(BeatPulse {
            batcher: batcher.clone(),
            bpm: 120.0,
            beats: 0,
        }),
        ["gradient"],
        Some(FrameSchedule::every_frame(Priority::Critical)),
    )?;
    core.register_subsystem(
        "particles",
        shared(Particles {
            batcher,
            count: 200,
            dirty: false,
        }),
        ["gradient"],
        Some(FrameSchedule::new(Priority::Background, 30.0)),
    )?;

    let report = core.initialize()?;
    log::info!(
        "Sandbox: initialized {:?} in {:.2}ms",
        report.success,
        report.total_time_ms
    );

    let frame_loop = FrameLoop::new(core.config().target_fps);
    frame_loop.run(&mut core, |core, report| {
        if report.frame_number == RUN_FRAMES / 2 {
            core.force_repaint(Some("halfway"));
        }
        report.frame_number < RUN_FRAMES
    });

    let metrics = core.get_metrics();
    log::info!(
        "Sandbox: {} frames, {} dropped, avg {:.3}ms, {:.1} fps",
        metrics.scheduler.total_frames,
        metrics.scheduler.dropped_frames,
        metrics.scheduler.average_frame_time,
        metrics.scheduler.frame_rate
    );
    log::info!(
        "Sandbox: {} writes in {} flushes, {} critical, efficiency {:.2}",
        metrics.updates.total_writes,
        metrics.updates.flush_count,
        metrics.updates.critical_updates,
        metrics.updates.lifetime_efficiency
    );
    log::info!("Sandbox: health {:?}", metrics.health.overall);

    let mode_changes = events
        .try_iter()
        .filter(|event| matches!(event, CoreEvent::PerformanceModeChanged { .. }))
        .count();
    log::info!(
        "Sandbox: {} surface passes, {} mode changes, final surface {:?}",
        surface.write_calls(),
        mode_changes,
        surface.snapshot()
    );

    core.destroy();
    Ok(())
}
