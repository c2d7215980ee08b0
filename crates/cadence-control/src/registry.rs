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

//! Subsystem registry for dependency-ordered lifecycle management.

use cadence_core::utils::panic_message;
use cadence_core::utils::sync::lock_recover;
use cadence_core::{
    Clock, CoreError, CoreResult, HealthAggregate, HealthCheckResult, SharedSubsystem, Stopwatch,
    SubsystemCapabilities, SubsystemInitError,
};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Lifecycle state of a registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemState {
    /// Registered, not initialized yet.
    Registered,
    /// `initialize` succeeded.
    Initialized,
    /// `initialize` failed, panicked or timed out.
    Failed,
    /// Not initialized because a dependency is unavailable.
    Skipped,
    /// `destroy` was called.
    Destroyed,
}

/// Outcome of [`SystemRegistry::initialize_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitializationReport {
    /// Initialized subsystems, in initialization order.
    pub success: Vec<String>,
    /// Subsystems whose initializer failed.
    pub failed: Vec<String>,
    /// Subsystems not attempted because a dependency is unavailable.
    pub skipped: Vec<String>,
    /// Wall time of the whole pass, in ms.
    pub total_time_ms: f64,
    /// Why each failed subsystem failed.
    pub errors: Vec<(String, SubsystemInitError)>,
}

struct Registration {
    name: String,
    dependencies: Vec<String>,
    instance: SharedSubsystem,
    capabilities: SubsystemCapabilities,
    state: SubsystemState,
}

/// Holds named subsystems with their declared dependencies and drives
/// their lifecycle.
///
/// Iteration is always in registration order unless dependencies say otherwise.
pub struct SystemRegistry {
    entries: Vec<Registration>,
    index: HashMap<String, usize>,
    init_order: Vec<String>,
    clock: Arc<dyn Clock>,
    max_init_ms: f64,
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("subsystems", &self.names())
            .field("init_order", &self.init_order)
            .finish()
    }
}

impl SystemRegistry {
    /// Creates an empty registry. Initializers slower than `max_init_ms` count as failed.
    pub fn new(clock: Arc<dyn Clock>, max_init_ms: f64) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            init_order: Vec::new(),
            clock,
            max_init_ms,
        }
    }

    /// Registers a subsystem under a unique name.
    ///
    /// Dependencies may name subsystems registered later; they are checked
    /// when the order is resolved.
    pub fn register<I, S>(
        &mut self,
        name: impl Into<String>,
        instance: SharedSubsystem,
        dependencies: I,
    ) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(CoreError::DuplicateName(name));
        }
        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        let capabilities = lock_recover(&instance).capabilities();

        log::info!(
            "SystemRegistry: Registered '{}' (deps: {:?})",
            name,
            deps
        );
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Registration {
            name,
            dependencies: deps,
            instance,
            capabilities,
            state: SubsystemState::Registered,
        });
        Ok(())
    }

    /// The instance registered under `name`.
    pub fn get(&self, name: &str) -> CoreResult<SharedSubsystem> {
        Ok(Arc::clone(&self.entry(name)?.instance))
    }

    /// Lifecycle state of `name`.
    pub fn state(&self, name: &str) -> CoreResult<SubsystemState> {
        Ok(self.entry(name)?.state)
    }

    /// Declared dependencies of `name`.
    pub fn dependencies(&self, name: &str) -> CoreResult<Vec<String>> {
        Ok(self.entry(name)?.dependencies.clone())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Successfully initialized subsystems, in initialization order.
    pub fn initialization_order(&self) -> &[String] {
        &self.init_order
    }

    /// Number of registered subsystems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> CoreResult<&Registration> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| CoreError::UnknownSystem(name.to_string()))
    }

    /// Topologically sorts the registry.
    ///
    /// Ready subsystems are taken in registration order, so the result is
    /// deterministic.
    pub fn resolve_order(&self) -> CoreResult<Vec<String>> {
        for entry in &self.entries {
            if let Some(missing) = entry
                .dependencies
                .iter()
                .find(|dep| !self.index.contains_key(dep.as_str()))
            {
                return Err(CoreError::MissingDependency {
                    name: entry.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let count = self.entries.len();
        let mut in_degree: Vec<usize> = self.entries.iter().map(|e| e.dependencies.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, entry) in self.entries.iter().enumerate() {
            for dep in &entry.dependencies {
                dependents[self.index[dep]].push(i);
            }
        }

        let mut ready: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(i) = ready.pop_front() {
            order.push(self.entries[i].name.clone());
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < count {
            return Err(CoreError::CyclicDependency {
                cycle: self.find_cycle(),
            });
        }
        Ok(order)
    }

    /// Depth-first search for one dependency cycle, returned with its first
    /// node repeated at the end.
    fn find_cycle(&self) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            registry: &SystemRegistry,
            node: usize,
            marks: &mut [Mark],
            path: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            marks[node] = Mark::InProgress;
            path.push(node);
            for dep in &registry.entries[node].dependencies {
                let next = registry.index[dep];
                match marks[next] {
                    Mark::InProgress => {
                        let start = path.iter().position(|&n| n == next).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|&n| registry.entries[n].name.clone())
                            .collect();
                        cycle.push(registry.entries[next].name.clone());
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(registry, next, marks, path) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            path.pop();
            marks[node] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.entries.len()];
        let mut path = Vec::new();
        for start in 0..self.entries.len() {
            if marks[start] == Mark::Unvisited {
                if let Some(cycle) = visit(self, start, &mut marks, &mut path) {
                    return cycle;
                }
            }
        }
        Vec::new()
    }

    /// Initializes every subsystem after its dependencies.
    ///
    /// Fails only on configuration errors (cycle, missing dependency). A
    /// subsystem that fails is recorded and its dependents are skipped; the
    /// rest proceeds. Subsystems already initialized are reported as
    /// successful without being initialized again.
    pub fn initialize_all(&mut self) -> CoreResult<InitializationReport> {
        let order = self.resolve_order()?;
        let total = Stopwatch::start(&self.clock);
        let mut report = InitializationReport::default();

        for name in order {
            let i = self.index[&name];
            if self.entries[i].state == SubsystemState::Initialized {
                report.success.push(name);
                continue;
            }

            let blocked_by = self.entries[i]
                .dependencies
                .iter()
                .find(|dep| self.entries[self.index[dep.as_str()]].state != SubsystemState::Initialized)
                .cloned();
            if let Some(dep) = blocked_by {
                log::warn!(
                    "SystemRegistry: Skipping '{}', dependency '{}' is unavailable",
                    name,
                    dep
                );
                self.entries[i].state = SubsystemState::Skipped;
                report.skipped.push(name);
                continue;
            }

            match self.initialize_one(i) {
                Ok(elapsed) => {
                    log::info!("SystemRegistry: Initialized '{}' in {:.2}ms", name, elapsed);
                    self.entries[i].state = SubsystemState::Initialized;
                    self.init_order.push(name.clone());
                    report.success.push(name);
                }
                Err(error) => {
                    log::error!("SystemRegistry: '{}' failed to initialize: {}", name, error);
                    self.entries[i].state = SubsystemState::Failed;
                    report.failed.push(name.clone());
                    report.errors.push((name, error));
                }
            }
        }

        report.total_time_ms = total.elapsed_ms();
        log::info!(
            "SystemRegistry: Initialization finished in {:.2}ms ({} ok, {} failed, {} skipped)",
            report.total_time_ms,
            report.success.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn initialize_one(&self, i: usize) -> Result<f64, SubsystemInitError> {
        let entry = &self.entries[i];
        let stopwatch = Stopwatch::start(&self.clock);
        let mut subsystem = lock_recover(&entry.instance);
        let outcome = catch_unwind(AssertUnwindSafe(|| subsystem.initialize()));
        let elapsed = stopwatch.elapsed_ms();

        match outcome {
            Ok(Ok(())) if elapsed <= self.max_init_ms => Ok(elapsed),
            Ok(Ok(())) => {
                // Too late: tear down whatever the initializer set up.
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subsystem.destroy())) {
                    log::warn!(
                        "SystemRegistry: '{}' panicked in destroy after timeout: {}",
                        entry.name,
                        panic_message(payload.as_ref())
                    );
                }
                Err(SubsystemInitError::TimedOut {
                    elapsed_ms: elapsed,
                    limit_ms: self.max_init_ms,
                })
            }
            Ok(Err(e)) => Err(SubsystemInitError::Failed(format!("{:#}", e))),
            Err(payload) => Err(SubsystemInitError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Asks every subsystem for its health and aggregates the answers.
    ///
    /// Subsystems that are not initialized, return an error, or panic are
    /// unhealthy; the error text becomes `details`.
    pub fn perform_health_check(&self) -> HealthAggregate {
        let mut aggregate = HealthAggregate::default();
        for entry in &self.entries {
            let result = if entry.state != SubsystemState::Initialized {
                HealthCheckResult::unhealthy(format!("not initialized ({:?})", entry.state))
            } else {
                let subsystem = lock_recover(&entry.instance);
                match catch_unwind(AssertUnwindSafe(|| subsystem.health_check())) {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => HealthCheckResult::unhealthy(format!("{:#}", e)),
                    Err(payload) => HealthCheckResult::unhealthy(panic_message(payload.as_ref())),
                }
            };
            if !result.ok {
                log::warn!(
                    "SystemRegistry: '{}' unhealthy: {}",
                    entry.name,
                    result.details
                );
            }
            aggregate.record(entry.name.clone(), result);
        }
        log::debug!(
            "SystemRegistry: Health check: {} healthy, {} unhealthy",
            aggregate.healthy.len(),
            aggregate.unhealthy.len()
        );
        aggregate
    }

    /// Calls `force_repaint` on every initialized subsystem that declares it.
    /// Returns how many were asked.
    pub fn force_repaint_all(&self, reason: Option<&str>) -> usize {
        let mut count = 0;
        for entry in &self.entries {
            if entry.state != SubsystemState::Initialized || !entry.capabilities.force_repaint {
                continue;
            }
            let mut subsystem = lock_recover(&entry.instance);
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subsystem.force_repaint(reason))) {
                log::warn!(
                    "SystemRegistry: '{}' panicked during repaint: {}",
                    entry.name,
                    panic_message(payload.as_ref())
                );
            }
            count += 1;
        }
        log::debug!(
            "SystemRegistry: Forced repaint of {} subsystems ({})",
            count,
            reason.unwrap_or("no reason")
        );
        count
    }

    /// Destroys initialized subsystems in reverse initialization order, so
    /// dependents go before their dependencies. Returns the destruction order.
    pub fn destroy_all(&mut self) -> Vec<String> {
        let order: Vec<String> = self.init_order.drain(..).rev().collect();
        for name in &order {
            let Some(&i) = self.index.get(name) else {
                continue;
            };
            {
                let mut subsystem = lock_recover(&self.entries[i].instance);
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subsystem.destroy())) {
                    log::warn!(
                        "SystemRegistry: '{}' panicked during destroy: {}",
                        name,
                        panic_message(payload.as_ref())
                    );
                }
            }
            self.entries[i].state = SubsystemState::Destroyed;
            log::debug!("SystemRegistry: Destroyed '{}'", name);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{shared, ManualClock, Subsystem};
    use std::sync::Mutex;

    struct Probe {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_init: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_init: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail_init = true;
            self
        }
    }

    impl Subsystem for Probe {
        fn initialize(&mut self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("init:{}", self.name));
            if self.fail_init {
                anyhow::bail!("{} could not start", self.name);
            }
            Ok(())
        }
        fn destroy(&mut self) {
            self.log.lock().unwrap().push(format!("destroy:{}", self.name));
        }
        fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
            Ok(HealthCheckResult::healthy("ok"))
        }
    }

    fn registry() -> SystemRegistry {
        SystemRegistry::new(Arc::new(ManualClock::new(0.0)), 5_000.0)
    }

    fn no_deps() -> [&'static str; 0] {
        []
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("a", shared(Probe::new("a", &log)), no_deps()).unwrap();
        let err = registry
            .register("a", shared(Probe::new("a", &log)), no_deps())
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateName("a".into()));
    }

    #[test]
    fn test_unknown_system() {
        let registry = registry();
        assert!(matches!(
            registry.get("ghost"),
            Err(CoreError::UnknownSystem(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_order_is_stable_and_dependency_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("c", shared(Probe::new("c", &log)), ["a", "b"]).unwrap();
        registry.register("b", shared(Probe::new("b", &log)), ["a"]).unwrap();
        registry.register("a", shared(Probe::new("a", &log)), no_deps()).unwrap();
        registry.register("z", shared(Probe::new("z", &log)), no_deps()).unwrap();

        assert_eq!(registry.resolve_order().unwrap(), vec!["a", "z", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("root", shared(Probe::new("root", &log)), no_deps()).unwrap();
        registry.register("a", shared(Probe::new("a", &log)), ["b"]).unwrap();
        registry.register("b", shared(Probe::new("b", &log)), ["a"]).unwrap();

        let err = registry.initialize_all().unwrap_err();
        assert_eq!(
            err,
            CoreError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }
        );
        assert!(log.lock().unwrap().is_empty(), "nothing initialized on a cycle");
    }

    #[test]
    fn test_missing_dependency() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("a", shared(Probe::new("a", &log)), ["ghost"]).unwrap();
        assert!(matches!(
            registry.resolve_order(),
            Err(CoreError::MissingDependency { ref dependency, .. }) if dependency == "ghost"
        ));
    }

    #[test]
    fn test_panicking_initializer_is_isolated() {
        struct Bomb;
        impl Subsystem for Bomb {
            fn initialize(&mut self) -> anyhow::Result<()> {
                panic!("kaboom");
            }
            fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
                Ok(HealthCheckResult::healthy("ok"))
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("bomb", shared(Bomb), no_deps()).unwrap();
        registry.register("fine", shared(Probe::new("fine", &log)), no_deps()).unwrap();

        let report = registry.initialize_all().unwrap();
        assert_eq!(report.success, vec!["fine"]);
        assert_eq!(report.failed, vec!["bomb"]);
        assert_eq!(
            report.errors[0].1,
            SubsystemInitError::Panicked("kaboom".into())
        );
    }

    #[test]
    fn test_slow_initializer_times_out_and_is_destroyed() {
        struct Slow {
            clock: ManualClock,
            destroyed: Arc<Mutex<bool>>,
        }
        impl Subsystem for Slow {
            fn initialize(&mut self) -> anyhow::Result<()> {
                self.clock.advance(250.0);
                Ok(())
            }
            fn destroy(&mut self) {
                *self.destroyed.lock().unwrap() = true;
            }
            fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
                Ok(HealthCheckResult::healthy("ok"))
            }
        }

        let clock = ManualClock::new(0.0);
        let destroyed = Arc::new(Mutex::new(false));
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SystemRegistry::new(Arc::new(clock.clone()), 100.0);
        registry
            .register(
                "slow",
                shared(Slow {
                    clock: clock.clone(),
                    destroyed: Arc::clone(&destroyed),
                }),
                no_deps(),
            )
            .unwrap();
        registry.register("after", shared(Probe::new("after", &log)), ["slow"]).unwrap();

        let report = registry.initialize_all().unwrap();
        assert_eq!(report.failed, vec!["slow"]);
        assert_eq!(report.skipped, vec!["after"]);
        assert!(matches!(
            report.errors[0].1,
            SubsystemInitError::TimedOut { limit_ms, .. } if limit_ms == 100.0
        ));
        assert!(*destroyed.lock().unwrap());
        assert_eq!(registry.state("slow").unwrap(), SubsystemState::Failed);
    }

    #[test]
    fn test_health_check_marks_uninitialized_and_errors() {
        struct Sick;
        impl Subsystem for Sick {
            fn initialize(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
            fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
                anyhow::bail!("gpu context lost")
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("ok", shared(Probe::new("ok", &log)), no_deps()).unwrap();
        registry.register("sick", shared(Sick), no_deps()).unwrap();
        registry
            .register("broken", shared(Probe::new("broken", &log).failing()), no_deps())
            .unwrap();
        registry.initialize_all().unwrap();

        let health = registry.perform_health_check();
        assert_eq!(health.healthy, vec!["ok"]);
        assert_eq!(health.unhealthy, vec!["sick", "broken"]);
        assert_eq!(health.results["sick"].details, "gpu context lost");
    }

    #[test]
    fn test_destroy_in_reverse_init_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry.register("a", shared(Probe::new("a", &log)), no_deps()).unwrap();
        registry.register("b", shared(Probe::new("b", &log)), ["a"]).unwrap();
        registry.register("c", shared(Probe::new("c", &log)), ["b"]).unwrap();
        registry.initialize_all().unwrap();
        log.lock().unwrap().clear();

        assert_eq!(registry.destroy_all(), vec!["c", "b", "a"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["destroy:c", "destroy:b", "destroy:a"]
        );
        assert_eq!(registry.state("a").unwrap(), SubsystemState::Destroyed);
    }

    #[test]
    fn test_force_repaint_only_capable() {
        struct Painter {
            reasons: Arc<Mutex<Vec<String>>>,
        }
        impl Subsystem for Painter {
            fn initialize(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
            fn health_check(&self) -> anyhow::Result<HealthCheckResult> {
                Ok(HealthCheckResult::healthy("ok"))
            }
            fn capabilities(&self) -> SubsystemCapabilities {
                SubsystemCapabilities {
                    force_repaint: true,
                    ..SubsystemCapabilities::NONE
                }
            }
            fn force_repaint(&mut self, reason: Option<&str>) {
                self.reasons
                    .lock()
                    .unwrap()
                    .push(reason.unwrap_or_default().to_string());
            }
        }

        let reasons = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = registry();
        registry
            .register(
                "painter",
                shared(Painter {
                    reasons: Arc::clone(&reasons),
                }),
                no_deps(),
            )
            .unwrap();
        registry.register("plain", shared(Probe::new("plain", &log)), no_deps()).unwrap();
        registry.initialize_all().unwrap();

        assert_eq!(registry.force_repaint_all(Some("theme switch")), 1);
        assert_eq!(*reasons.lock().unwrap(), vec!["theme switch"]);
    }
}
