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

use cadence_control::VariableUpdateBatcher;
use cadence_core::critical_keys::default_critical_keys;
use cadence_core::{ManualClock, MemorySurface, Priority};
use std::collections::BTreeMap;
use std::sync::Arc;

fn setup() -> (VariableUpdateBatcher, MemorySurface) {
    let surface = MemorySurface::new();
    let batcher = VariableUpdateBatcher::new(
        Box::new(surface.clone()),
        default_critical_keys(),
        Arc::new(ManualClock::new(0.0)),
    );
    (batcher, surface)
}

fn palette(count: usize, changed: usize) -> BTreeMap<String, String> {
    (0..count)
        .map(|i| {
            let value = if i < changed {
                format!("hsl({} 80% 60%)", i + 180)
            } else {
                format!("hsl({} 80% 50%)", i)
            };
            (format!("--cadence-palette-{:03}", i), value)
        })
        .collect()
}

#[test]
fn test_second_flush_without_writes_is_idempotent() {
    let (batcher, surface) = setup();
    batcher.queue_batch(palette(8, 0), Priority::Normal);

    let first = batcher.flush();
    let cache_after_first = batcher.applied_snapshot();
    let calls_after_first = surface.write_calls();

    let second = batcher.flush();

    assert_eq!(first.written, 8);
    assert_eq!(second.written, 0);
    assert_eq!(second.evaluated, 0);
    assert_eq!(surface.write_calls(), calls_after_first);
    assert_eq!(batcher.applied_snapshot(), cache_after_first);
}

#[test]
fn test_requeued_identical_values_cost_nothing() {
    let (batcher, surface) = setup();

    // --- 1. Apply the initial 96-key state ---
    batcher.queue_batch(palette(96, 0), Priority::Normal);
    assert_eq!(batcher.flush().written, 96);
    let calls = surface.write_calls();

    // --- 2. Re-queue the identical state ---
    batcher.queue_batch(palette(96, 0), Priority::Normal);
    let outcome = batcher.flush();
    assert_eq!(outcome.written, 0);
    assert_eq!(outcome.skipped, 96);
    assert_eq!(surface.write_calls(), calls, "unchanged flush must not touch the surface");
    assert_eq!(batcher.get_update_metrics().efficiency_ratio, 1.0);

    // --- 3. Re-queue with 12 values changed ---
    batcher.queue_batch(palette(96, 12), Priority::Normal);
    let outcome = batcher.flush();
    assert_eq!(outcome.written, 12);
    assert_eq!(surface.write_calls(), calls + 1);
    let ratio = batcher.get_update_metrics().efficiency_ratio;
    assert!((ratio - 0.875).abs() < 1e-9, "efficiency was {}", ratio);

    // The cache mirrors the surface exactly.
    assert_eq!(batcher.applied_snapshot(), surface.snapshot());
}

#[test]
fn test_critical_path_is_visible_before_flush() {
    let (batcher, surface) = setup();
    batcher.queue_update("--cadence-beat-intensity", "0.9", Priority::Normal);
    batcher.queue_update("--cadence-hue", "200", Priority::Normal);

    assert_eq!(surface.value("--cadence-beat-intensity").as_deref(), Some("0.9"));
    assert_eq!(surface.value("--cadence-hue"), None);

    batcher.flush();
    assert_eq!(surface.value("--cadence-hue").as_deref(), Some("200"));
    assert_eq!(batcher.applied_snapshot(), surface.snapshot());
}
