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

//! A paced host loop for headless and native hosts.

use crate::theme::ThemeCore;
use cadence_control::FrameReport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Drives a [`ThemeCore`] at its target frame rate, sleeping between ticks.
///
/// Tick timestamps come from the core's own clock.
#[derive(Debug)]
pub struct FrameLoop {
    frame_duration: Duration,
    running: Arc<AtomicBool>,
}

impl FrameLoop {
    /// Creates a loop paced at `target_fps` (at least 1).
    pub fn new(target_fps: u32) -> Self {
        Self {
            frame_duration: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that stops the loop from another thread when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Runs until `on_frame` returns `false` or the running flag is cleared.
    ///
    /// Paused frames call nothing and just sleep. Returns the number of
    /// frames ticked.
    pub fn run<F>(&self, core: &mut ThemeCore, mut on_frame: F) -> u64
    where
        F: FnMut(&mut ThemeCore, &FrameReport) -> bool,
    {
        self.running.store(true, Ordering::SeqCst);
        core.start();
        log::info!(
            "FrameLoop: started at {:.2}ms per frame",
            self.frame_duration.as_secs_f64() * 1000.0
        );

        let mut frames = 0;
        while self.running.load(Ordering::Relaxed) {
            let start_time = Instant::now();

            let timestamp = core.clock().now_ms();
            if let Some(report) = core.tick(timestamp) {
                frames += 1;
                if !on_frame(core, &report) {
                    break;
                }
            }

            let elapsed = start_time.elapsed();
            if elapsed < self.frame_duration {
                thread::sleep(self.frame_duration - elapsed);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        core.stop();
        log::info!("FrameLoop: stopped after {} frames", frames);
        frames
    }

    /// Runs exactly `frames` ticks, unless stopped early.
    pub fn run_for(&self, core: &mut ThemeCore, frames: u64) -> u64 {
        if frames == 0 {
            return 0;
        }
        self.run(core, |_, report| report.frame_number < frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{CoreConfig, MemorySurface};

    #[test]
    fn test_run_for_ticks_requested_frames() {
        let config = CoreConfig {
            target_fps: 240,
            ..CoreConfig::default()
        };
        let mut core = ThemeCore::with_clock(
            config,
            Box::new(MemorySurface::new()),
            Arc::new(cadence_core::SystemClock::new()),
        )
        .unwrap();

        let frame_loop = FrameLoop::new(240);
        assert_eq!(frame_loop.run_for(&mut core, 5), 5);
        assert!(!core.scheduler().is_running());
        assert_eq!(core.get_metrics().scheduler.total_frames, 5);
    }

    #[test]
    fn test_cleared_flag_stops_loop() {
        let mut core = ThemeCore::with_clock(
            CoreConfig::default(),
            Box::new(MemorySurface::new()),
            Arc::new(cadence_core::SystemClock::new()),
        )
        .unwrap();

        let frame_loop = FrameLoop::new(120);
        let flag = frame_loop.running_flag();
        let frames = frame_loop.run(&mut core, move |_, report| {
            if report.frame_number == 3 {
                flag.store(false, Ordering::SeqCst);
            }
            true
        });
        assert_eq!(frames, 3);
    }
}
