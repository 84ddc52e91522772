//! Payload metering for the execution line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ModuleConfig;
use crate::module::{
    DispatchResult, LifecycleResult, Module, ModuleCore, ModuleKind, ModuleVersion, PipelineStep,
};
use crate::observability::record_pipeline_bytes;
use crate::pipeline::{ExecutionLine, WorkUnit};
use crate::server::Server;

/// Payload size of a work unit at the moment it was metered. Steps later
/// in the line read this instead of re-measuring a payload that earlier
/// steps may have rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCount(pub u64);

/// Meters every payload flowing down the execution line.
pub struct ByteCounter {
    core: ModuleCore,
    total: AtomicU64,
}

impl ByteCounter {
    pub fn from_config(config: &ModuleConfig) -> Arc<Self> {
        let mut core = ModuleCore::new(
            &config.name,
            config.priority,
            ModuleKind::Pipeline,
            ModuleVersion(1, 0),
        );
        if let Some(path) = &config.conf_file {
            core = core.with_conf_file(path);
        }
        Arc::new(Self {
            core,
            total: AtomicU64::new(0),
        })
    }

    /// Bytes metered since install.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Module for ByteCounter {
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
        tracing::info!(
            module = %self.name(),
            total_bytes = self.total(),
            "Byte counter retired"
        );
        Ok(())
    }
}

impl PipelineStep for ByteCounter {
    fn process(&self, work: &mut WorkUnit) -> DispatchResult {
        let bytes = work.payload().len() as u64;
        self.total.fetch_add(bytes, Ordering::Relaxed);
        record_pipeline_bytes(bytes);
        work.extensions_mut().insert(ByteCount(bytes));
        tracing::debug!(work_id = %work.id(), bytes, "Work unit metered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Arc<ByteCounter> {
        ByteCounter::from_config(&ModuleConfig {
            name: "byte-counter".into(),
            priority: 50,
            ..ModuleConfig::default()
        })
    }

    #[test]
    fn test_total_accumulates_across_work_units() {
        let counter = counter();
        let mut first = WorkUnit::new(b"12345".to_vec());
        let mut second = WorkUnit::new(b"123".to_vec());

        counter.process(&mut first).unwrap();
        counter.process(&mut second).unwrap();

        assert_eq!(counter.total(), 8);
        assert_eq!(first.extensions().get::<ByteCount>(), Some(&ByteCount(5)));
        assert_eq!(second.extensions().get::<ByteCount>(), Some(&ByteCount(3)));
    }

    #[test]
    fn test_payload_passes_through_unchanged() {
        let counter = counter();
        let mut work = WorkUnit::new(b"payload".to_vec());
        counter.process(&mut work).unwrap();
        assert_eq!(work.payload(), b"payload");
    }
}
