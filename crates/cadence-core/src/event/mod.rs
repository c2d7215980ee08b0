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

//! Provides the publish/subscribe channel owned by the core.
//!
//! Unrelated UI or telemetry code observes the core through an
//! [`EventChannel`] of typed [`CoreEvent`] payloads instead of ambient global
//! dispatch. The channel is generic so that hosts may reuse it for their own
//! event types.

mod bus;
mod core_event;

pub use self::bus::EventChannel;
pub use self::core_event::CoreEvent;
