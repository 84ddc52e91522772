//! The execution line: the ordered, generic processing pipeline.

use std::sync::Arc;
use std::time::Instant;

use crate::module::roster::Roster;
use crate::module::{
    ContractViolation, DispatchError, DispatchReport, Module, PipelineStep, Surface,
};
use crate::observability::record_dispatch;

use super::work::WorkUnit;

/// Ordered pipeline of [`PipelineStep`]s.
///
/// Steps run in ascending priority order (lower runs earlier); equal
/// priorities keep attach order. Execution holds the roster's read lock for
/// the whole chain, so a detach that returns is guaranteed to have waited
/// out every in-flight execution. Steps must not attach or detach from
/// inside [`execute`](Self::execute).
pub struct ExecutionLine {
    steps: Roster<dyn PipelineStep>,
}

impl ExecutionLine {
    pub fn new() -> Self {
        Self {
            steps: Roster::new(Surface::Line),
        }
    }

    /// Attach `step` on behalf of `module`. The module must be in the
    /// Initialized state and not already attached here.
    pub fn attach(
        &self,
        module: Arc<dyn Module>,
        step: Arc<dyn PipelineStep>,
    ) -> Result<(), ContractViolation> {
        let name = module.name().to_owned();
        let priority = module.priority();
        self.steps.attach(module, step)?;
        tracing::debug!(
            module = %name,
            priority,
            steps = self.steps.len(),
            "Step attached to execution line"
        );
        Ok(())
    }

    /// Detach the named module's step. Fails without side effects if it is
    /// not attached.
    pub fn detach(&self, name: &str) -> Result<(), ContractViolation> {
        self.steps.detach(name)?;
        tracing::debug!(
            module = %name,
            steps = self.steps.len(),
            "Step detached from execution line"
        );
        Ok(())
    }

    /// Run every step against `work` in order. The first step error aborts
    /// the chain and is returned; the work unit is considered abandoned.
    pub fn execute(&self, work: &mut WorkUnit) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let result = self.steps.dispatch(|entry| {
            let _guard = entry.module.span().enter();
            entry.capability.process(work)
        });
        match result {
            Ok(completed) => {
                record_dispatch("line", "ok", started);
                Ok(DispatchReport { completed })
            }
            Err(err) => {
                tracing::warn!(
                    module = %err.module(),
                    work_id = %work.id(),
                    error = %err,
                    "Execution line aborted"
                );
                record_dispatch("line", "aborted", started);
                Err(err)
            }
        }
    }

    /// Attached module names in execution order.
    pub fn snapshot(&self) -> Vec<String> {
        self.steps.snapshot()
    }

    /// Attached `(name, priority)` pairs in execution order.
    pub fn manifest(&self) -> Vec<(String, i32)> {
        self.steps.manifest()
    }

    /// Whether the named module is attached.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains(name)
    }

    /// Number of attached steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.len() == 0
    }
}

impl Default for ExecutionLine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{LifecycleResult, LifecycleState, ModuleCore, ModuleKind, ModuleVersion};
    use crate::server::Server;
    use std::sync::Mutex;

    struct Recorder {
        core: ModuleCore,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Recorder {
        fn new(name: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<Self> {
            let core = ModuleCore::new(name, priority, ModuleKind::Pipeline, ModuleVersion(0, 1));
            core.set_state(LifecycleState::Initialized);
            Arc::new(Self {
                core,
                log: log.clone(),
                fail,
            })
        }
    }

    impl Module for Recorder {
        fn core(&self) -> &ModuleCore {
            &self.core
        }
        fn init(&self) -> LifecycleResult {
            Ok(())
        }
        fn hook_line(self: Arc<Self>, line: &ExecutionLine) -> LifecycleResult {
            line.attach(self.clone(), self)?;
            Ok(())
        }
        fn hook_server(self: Arc<Self>, _server: &Server) -> LifecycleResult {
            Ok(())
        }
        fn unhook_line(&self, line: &ExecutionLine) -> LifecycleResult {
            line.detach(self.name())?;
            Ok(())
        }
        fn unhook_server(&self, _server: &Server) -> LifecycleResult {
            Ok(())
        }
        fn destroy(&self) -> LifecycleResult {
            Ok(())
        }
    }

    impl PipelineStep for Recorder {
        fn process(&self, work: &mut WorkUnit) -> crate::module::DispatchResult {
            self.log.lock().unwrap().push(self.name().to_owned());
            if self.fail {
                return Err(DispatchError::step(self.name(), "forced failure"));
            }
            work.payload_mut().extend_from_slice(self.name().as_bytes());
            Ok(())
        }
    }

    #[test]
    fn test_steps_run_in_priority_order() {
        let line = ExecutionLine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        Recorder::new("late", 20, &log, false).hook_line(&line).unwrap();
        Recorder::new("early", 10, &log, false).hook_line(&line).unwrap();

        let mut work = WorkUnit::new(Vec::new());
        let report = line.execute(&mut work).unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(work.payload(), b"earlylate");
    }

    #[test]
    fn test_step_error_aborts_chain() {
        let line = ExecutionLine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        Recorder::new("first", 1, &log, false).hook_line(&line).unwrap();
        Recorder::new("bomb", 2, &log, true).hook_line(&line).unwrap();
        Recorder::new("never", 3, &log, false).hook_line(&line).unwrap();

        let mut work = WorkUnit::new(Vec::new());
        let err = line.execute(&mut work).unwrap_err();

        assert_eq!(err.module(), "bomb");
        assert_eq!(*log.lock().unwrap(), vec!["first", "bomb"]);
    }

    #[test]
    fn test_detach_then_execute_skips_module() {
        let line = ExecutionLine::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Recorder::new("a", 1, &log, false);
        a.clone().hook_line(&line).unwrap();
        Recorder::new("b", 2, &log, false).hook_line(&line).unwrap();

        a.unhook_line(&line).unwrap();
        let mut work = WorkUnit::new(Vec::new());
        line.execute(&mut work).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert!(!line.contains("a"));
    }
}
