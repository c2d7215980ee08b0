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

use crate::utils::sync::lock_recover;
use std::sync::{Arc, Mutex};

/// A generic, thread-safe fan-out channel.
///
/// Every subscriber receives its own copy of each published event. Clones of
/// the channel share the subscriber list, so a publisher handle can be given
/// to each component while subscribers are added from anywhere.
#[derive(Debug)]
pub struct EventChannel<T: Clone + Send + 'static> {
    subscribers: Arc<Mutex<Vec<flume::Sender<T>>>>,
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    /// Creates a channel with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a subscriber and returns its receiving end.
    ///
    /// Dropping the receiver unsubscribes it on the next publish.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        lock_recover(&self.subscribers).push(sender);
        log::debug!("EventChannel: subscriber added.");
        receiver
    }

    /// Delivers `event` to every live subscriber and returns how many received it.
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = lock_recover(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        let delivered = subscribers.len();
        if delivered < before {
            log::trace!(
                "EventChannel: dropped {} disconnected subscriber(s).",
                before - delivered
            );
        }
        delivered
    }

    /// Number of subscribers still connected as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        lock_recover(&self.subscribers).len()
    }
}

impl<T: Clone + Send + 'static> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
