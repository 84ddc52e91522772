//! The module lifecycle engine.
//!
//! # Responsibilities
//! - Drive init → hook → unhook → destroy in contract order
//! - Roll back partially hooked modules when a later hook fails
//! - Keep the installed-module table and its install order
//! - Reconcile the installed set against a reloaded configuration
//!
//! # Design Decisions
//! - Hooks run only after a successful `init`; a module that fails `init`
//!   is marked Failed and never touches either surface
//! - Unhooks run in reverse hook order, and both surfaces are clear before
//!   `destroy` is called, so no dispatch path can reach a dying module
//! - A failing module is logged and skipped; the host and server keep
//!   running

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::ModuleConfig;
use crate::module::{
    ContractViolation, LifecycleError, LifecycleResult, LifecycleState, Module, ModuleKind,
    ModuleVersion,
};
use crate::observability::{record_module_install, record_modules_active};
use crate::pipeline::ExecutionLine;
use crate::server::Server;

use super::catalog::ModuleCatalog;

/// Which surfaces a module successfully hooked, for mirror-order unhooks.
#[derive(Debug, Clone, Copy, Default)]
struct HookRecord {
    line: bool,
    server: bool,
}

struct ModuleSlot {
    module: Arc<dyn Module>,
    hooks: HookRecord,
}

/// Point-in-time description of an installed module.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub kind: ModuleKind,
    pub version: ModuleVersion,
    pub priority: i32,
    pub state: LifecycleState,
    pub location: PathBuf,
    pub conf_file: Option<PathBuf>,
}

/// What a reconcile pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub installed: usize,
    pub removed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Owns every installed module and drives the lifecycle contract.
pub struct ModuleHost {
    line: Arc<ExecutionLine>,
    server: Arc<Server>,
    modules: DashMap<String, ModuleSlot>,
    install_order: Mutex<Vec<String>>,
}

impl ModuleHost {
    pub fn new(line: Arc<ExecutionLine>, server: Arc<Server>) -> Self {
        Self {
            line,
            server,
            modules: DashMap::new(),
            install_order: Mutex::new(Vec::new()),
        }
    }

    /// Install a module: init, then hook every surface its kind declares.
    ///
    /// If `init` fails the module is marked Failed and never hooked. If a
    /// later hook fails, surfaces hooked earlier are unhooked again and the
    /// module is destroyed; no trace of it remains on either surface.
    pub fn install(&self, module: Arc<dyn Module>) -> LifecycleResult {
        let name = module.name().to_owned();
        if self.modules.contains_key(&name) {
            return Err(ContractViolation::DuplicateModule(name).into());
        }

        tracing::info!(
            module = %name,
            kind = %module.kind(),
            version = %module.version(),
            priority = module.priority(),
            "Installing module"
        );

        if let Err(err) = module.init() {
            module.core().set_state(LifecycleState::Failed);
            record_module_install("init_failed");
            tracing::error!(module = %name, error = %err, "Module init failed; it will not be hooked");
            return Err(err);
        }
        module.core().set_state(LifecycleState::Initialized);

        let kind = module.kind();
        let mut hooks = HookRecord::default();

        if kind.runs_pipeline() {
            match Arc::clone(&module).hook_line(&self.line) {
                Ok(()) => hooks.line = true,
                Err(err) => {
                    tracing::error!(module = %name, error = %err, "Hook on execution line failed; rolling back");
                    self.rollback(&module, hooks);
                    record_module_install("hook_failed");
                    return Err(err);
                }
            }
        }
        if kind.handles_connections() {
            match Arc::clone(&module).hook_server(&self.server) {
                Ok(()) => hooks.server = true,
                Err(err) => {
                    tracing::error!(module = %name, error = %err, "Hook on server failed; rolling back");
                    self.rollback(&module, hooks);
                    record_module_install("hook_failed");
                    return Err(err);
                }
            }
        }

        match self.modules.entry(name.clone()) {
            Entry::Occupied(_) => {
                // Lost an install race on the same name; undo our hooks.
                self.rollback(&module, hooks);
                record_module_install("duplicate");
                return Err(ContractViolation::DuplicateModule(name).into());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ModuleSlot { module, hooks });
            }
        }
        self.install_order
            .lock()
            .expect("install order lock poisoned")
            .push(name.clone());

        record_module_install("ok");
        record_modules_active(self.modules.len());
        tracing::info!(module = %name, "Module installed");
        Ok(())
    }

    /// Uninstall a module: unhook in reverse hook order, then destroy.
    ///
    /// Failures are reported but never leave the module half-installed:
    /// a surface that refuses a module's own unhook is force-detached so
    /// `destroy` can never race live dispatch.
    pub fn uninstall(&self, name: &str) -> LifecycleResult {
        let (_, slot) = self
            .modules
            .remove(name)
            .ok_or_else(|| ContractViolation::UnknownModule(name.to_owned()))?;
        self.install_order
            .lock()
            .expect("install order lock poisoned")
            .retain(|n| n != name);

        let module = slot.module;
        let mut first_err: Option<LifecycleError> = None;

        if slot.hooks.server {
            if let Err(err) = module.unhook_server(&self.server) {
                tracing::warn!(module = %name, error = %err, "Unhook from server failed");
                if self.server.detach(name).is_ok() {
                    tracing::warn!(module = %name, "Force-detached handler");
                }
                first_err.get_or_insert(err);
            }
        }
        if slot.hooks.line {
            if let Err(err) = module.unhook_line(&self.line) {
                tracing::warn!(module = %name, error = %err, "Unhook from execution line failed");
                if self.line.detach(name).is_ok() {
                    tracing::warn!(module = %name, "Force-detached step");
                }
                first_err.get_or_insert(err);
            }
        }

        // Both surfaces are clear; in-flight chains finished when the
        // detach write locks were granted. Destroy is safe now.
        module.core().set_state(LifecycleState::Destroyed);
        if let Err(err) = module.destroy() {
            tracing::warn!(module = %name, error = %err, "Module destroy reported failure");
            first_err.get_or_insert(err);
        }

        record_modules_active(self.modules.len());
        tracing::info!(module = %name, "Module uninstalled");
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Uninstall every module, newest first. Failures are logged and the
    /// teardown continues.
    pub fn shutdown(&self) {
        let names: Vec<String> = {
            let order = self
                .install_order
                .lock()
                .expect("install order lock poisoned");
            order.iter().rev().cloned().collect()
        };
        tracing::info!(modules = names.len(), "Unloading all modules");
        for name in names {
            if let Err(err) = self.uninstall(&name) {
                tracing::warn!(module = %name, error = %err, "Uninstall during shutdown failed");
            }
        }
    }

    /// Bring the installed set in line with a reloaded module list:
    /// install additions, uninstall removals, reinstall on priority change
    /// (a fresh attach re-seats the dispatch position), re-point conf files
    /// in place.
    pub fn reconcile(&self, catalog: &ModuleCatalog, configs: &[ModuleConfig]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let desired: HashMap<&str, &ModuleConfig> = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| (c.name.as_str(), c))
            .collect();

        let installed: Vec<String> = self
            .install_order
            .lock()
            .expect("install order lock poisoned")
            .clone();
        for name in &installed {
            if !desired.contains_key(name.as_str()) {
                match self.uninstall(name) {
                    Ok(()) => summary.removed += 1,
                    Err(err) => {
                        tracing::warn!(module = %name, error = %err, "Uninstall during reconcile failed");
                        summary.failed += 1;
                    }
                }
            }
        }

        for config in configs.iter().filter(|c| c.enabled) {
            let existing = self
                .modules
                .get(&config.name)
                .map(|slot| (slot.module.priority(), slot.module.conf_file()));
            match existing {
                None => match catalog.build(config).and_then(|m| self.install(m)) {
                    Ok(()) => summary.installed += 1,
                    Err(err) => {
                        tracing::warn!(module = %config.name, error = %err, "Install during reconcile failed");
                        summary.failed += 1;
                    }
                },
                Some((priority, conf_file)) => {
                    if priority != config.priority {
                        if let Err(err) = self.uninstall(&config.name) {
                            tracing::warn!(module = %config.name, error = %err, "Reinstall teardown failed");
                        }
                        match catalog.build(config).and_then(|m| self.install(m)) {
                            Ok(()) => summary.updated += 1,
                            Err(err) => {
                                tracing::warn!(module = %config.name, error = %err, "Reinstall failed");
                                summary.failed += 1;
                            }
                        }
                    } else if let Some(path) = &config.conf_file {
                        if conf_file.as_deref() != Some(path.as_path()) {
                            if let Some(slot) = self.modules.get(&config.name) {
                                slot.module.set_conf_file(path.clone());
                                tracing::info!(module = %config.name, conf_file = %path.display(), "Module conf file re-pointed");
                                summary.updated += 1;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(
            installed = summary.installed,
            removed = summary.removed,
            updated = summary.updated,
            failed = summary.failed,
            "Module reconcile finished"
        );
        summary
    }

    /// Installed module names, oldest first.
    pub fn installed(&self) -> Vec<String> {
        self.install_order
            .lock()
            .expect("install order lock poisoned")
            .clone()
    }

    /// Whether the named module is installed.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Number of installed modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Describe every installed module, in install order.
    pub fn describe(&self) -> Vec<ModuleInfo> {
        self.installed()
            .into_iter()
            .filter_map(|name| {
                self.modules.get(&name).map(|slot| {
                    let m = &slot.module;
                    ModuleInfo {
                        name: m.name().to_owned(),
                        kind: m.kind(),
                        version: m.version(),
                        priority: m.priority(),
                        state: m.core().state(),
                        location: m.location().to_owned(),
                        conf_file: m.conf_file(),
                    }
                })
            })
            .collect()
    }

    /// Undo a partial install: unhook whatever hooked so far (reverse
    /// order), mark the module failed, then best-effort destroy.
    fn rollback(&self, module: &Arc<dyn Module>, hooks: HookRecord) {
        let name = module.name();
        if hooks.server {
            if let Err(err) = module.unhook_server(&self.server) {
                tracing::warn!(module = %name, error = %err, "Rollback unhook from server failed");
                if self.server.detach(name).is_ok() {
                    tracing::warn!(module = %name, "Force-detached handler during rollback");
                }
            }
        }
        if hooks.line {
            if let Err(err) = module.unhook_line(&self.line) {
                tracing::warn!(module = %name, error = %err, "Rollback unhook from execution line failed");
                if self.line.detach(name).is_ok() {
                    tracing::warn!(module = %name, "Force-detached step during rollback");
                }
            }
        }
        module.core().set_state(LifecycleState::Failed);
        if let Err(err) = module.destroy() {
            tracing::warn!(module = %name, error = %err, "Destroy after rollback failed");
        }
    }
}
