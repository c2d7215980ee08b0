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

//! Deferred scheduler requests that can be issued from inside running work.

use super::work::FrameCallback;
use cadence_core::{FrameContext, PerformanceMode, Priority, WorkId};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) enum ControlRequest {
    Unregister(WorkId),
    RegisterCallback {
        id: WorkId,
        priority: Priority,
        callback: FrameCallback,
    },
    SetPerformanceMode {
        mode: PerformanceMode,
        reason: String,
    },
}

/// Prefix of generated raw-callback ids. `FrameScheduler::register` rejects it.
pub(crate) const CALLBACK_ID_PREFIX: &str = "frame-callback-";

/// Generates ids for raw callbacks; shared by the scheduler and its controls.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallbackIds {
    next: Arc<AtomicU64>,
}

impl CallbackIds {
    pub(crate) fn next(&self) -> WorkId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        WorkId::new(format!("{}{}", CALLBACK_ID_PREFIX, n))
    }
}

/// A cloneable handle for changing the scheduler while a tick is running.
///
/// Requests are queued and applied at the start of the next tick, in the
/// order they were sent. Work already executing finishes normally.
#[derive(Debug, Clone)]
pub struct SchedulerControl {
    sender: Sender<ControlRequest>,
    ids: CallbackIds,
}

impl SchedulerControl {
    pub(crate) fn channel(ids: CallbackIds) -> (Self, Receiver<ControlRequest>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender, ids }, receiver)
    }

    /// Removes work from the next tick on.
    pub fn unregister(&self, id: WorkId) {
        self.send(ControlRequest::Unregister(id));
    }

    /// Adds a raw callback from the next tick on and returns its id.
    pub fn register_frame_callback<F>(&self, callback: F, priority: Priority) -> WorkId
    where
        F: FnMut(&FrameContext) -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.ids.next();
        self.send(ControlRequest::RegisterCallback {
            id: id.clone(),
            priority,
            callback: Box::new(callback),
        });
        id
    }

    /// Switches the performance mode at the start of the next tick.
    pub fn set_performance_mode(&self, mode: PerformanceMode, reason: impl Into<String>) {
        self.send(ControlRequest::SetPerformanceMode {
            mode,
            reason: reason.into(),
        });
    }

    fn send(&self, request: ControlRequest) {
        if self.sender.send(request).is_err() {
            log::warn!("SchedulerControl: scheduler dropped, request ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_ids_are_unique_across_clones() {
        let ids = CallbackIds::default();
        let other = ids.clone();
        assert_eq!(ids.next().as_str(), "frame-callback-1");
        assert_eq!(other.next().as_str(), "frame-callback-2");
    }

    #[test]
    fn test_requests_arrive_in_order() {
        let (control, rx) = SchedulerControl::channel(CallbackIds::default());
        control.unregister(WorkId::new("a"));
        control.set_performance_mode(PerformanceMode::Quality, "host");

        assert!(matches!(rx.try_recv(), Ok(ControlRequest::Unregister(id)) if id.as_str() == "a"));
        assert!(matches!(
            rx.try_recv(),
            Ok(ControlRequest::SetPerformanceMode {
                mode: PerformanceMode::Quality,
                ..
            })
        ));
        assert!(rx.try_recv().is_err());
    }
}
