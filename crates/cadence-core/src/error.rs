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

//! Defines the hierarchy of error types for the coordination core.
//!
//! Two families live here:
//! - [`CoreError`] covers programmer errors (duplicate registrations, cyclic
//!   dependencies, unknown names). These are returned synchronously to the
//!   caller performing the registration and are never recoverable locally.
//! - [`SubsystemInitError`] and [`CallbackExecutionError`] describe failures
//!   that are recorded by the registry or the scheduler and surfaced through
//!   reports and metrics. They never stop the shared loop.

use crate::frame::WorkId;
use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A fatal configuration or registration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A unit of frame work was registered twice under the same id.
    #[error("work id '{0}' is already registered")]
    DuplicateId(WorkId),
    /// A work id uses the prefix reserved for generated callback ids.
    #[error("work id '{0}' uses a reserved prefix")]
    ReservedId(WorkId),
    /// A subsystem was registered twice under the same name.
    #[error("subsystem '{0}' is already registered")]
    DuplicateName(String),
    /// The declared subsystem dependencies contain a cycle.
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// The subsystems forming the cycle, with the first repeated at the end.
        cycle: Vec<String>,
    },
    /// A subsystem name was requested that was never registered.
    #[error("unknown subsystem '{0}'")]
    UnknownSystem(String),
    /// A subsystem declared a dependency on a name that was never registered.
    #[error("subsystem '{name}' depends on unregistered subsystem '{dependency}'")]
    MissingDependency {
        /// The subsystem declaring the dependency.
        name: String,
        /// The dependency that could not be found.
        dependency: String,
    },
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a subsystem failed to initialize.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubsystemInitError {
    /// The initializer returned an error.
    #[error("initialization failed: {0}")]
    Failed(String),
    /// The initializer panicked.
    #[error("initialization panicked: {0}")]
    Panicked(String),
    /// The initializer returned after the configured time limit.
    #[error("initialization took {elapsed_ms:.1}ms, limit is {limit_ms:.1}ms")]
    TimedOut {
        /// How long the initializer actually ran.
        elapsed_ms: f64,
        /// The configured `maxInitializationTime`.
        limit_ms: f64,
    },
}

/// A per-tick failure of a registered subsystem or frame callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackExecutionError {
    /// The callback returned an error.
    #[error("callback '{id}' failed: {message}")]
    Failed {
        /// The failing work id.
        id: WorkId,
        /// The error message.
        message: String,
    },
    /// The callback panicked.
    #[error("callback '{id}' panicked: {message}")]
    Panicked {
        /// The failing work id.
        id: WorkId,
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl CallbackExecutionError {
    /// Returns the id of the work that failed.
    pub fn id(&self) -> &WorkId {
        match self {
            CallbackExecutionError::Failed { id, .. } | CallbackExecutionError::Panicked { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = CoreError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
    }

    #[test]
    fn test_missing_dependency_message() {
        let err = CoreError::MissingDependency {
            name: "particles".into(),
            dependency: "gradient".into(),
        };
        assert!(err.to_string().contains("'gradient'"));
    }

    #[test]
    fn test_callback_error_exposes_id() {
        let err = CallbackExecutionError::Panicked {
            id: WorkId::new("glow"),
            message: "boom".into(),
        };
        assert_eq!(err.id().as_str(), "glow");
        assert!(err.to_string().contains("panicked"));
    }
}
