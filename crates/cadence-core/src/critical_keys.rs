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

//! The default allowlist of property keys that bypass batching.
//!
//! Writes to these keys are applied to the render surface synchronously from
//! `queue_update` instead of waiting for the end-of-tick flush. Keep this list
//! short: every entry is a write that escapes coalescing.
//! The list can be replaced through `CoreConfig::critical_keys` and extended at
//! runtime by subsystems that own latency-sensitive properties.

/// Keys that must reach the surface within the same frame they are produced.
pub const DEFAULT_CRITICAL_KEYS: &[&str] = &[
    // Beat-synchronised pulse; one frame of latency is visible as drift.
    "--cadence-beat-intensity",
    "--cadence-beat-phase",
    "--cadence-rhythm-pulse",
    // Pointer-following highlight.
    "--cadence-cursor-x",
    "--cadence-cursor-y",
];

/// Returns the default allowlist as owned strings.
pub fn default_critical_keys() -> Vec<String> {
    DEFAULT_CRITICAL_KEYS.iter().map(|k| (*k).to_string()).collect()
}
