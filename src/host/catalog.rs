//! Factory registry mapping configured module names to constructors.
//!
//! Stands in for on-disk module discovery: config names a module, the
//! catalog knows how to build it. Builders receive the whole config entry
//! so priority and conf file land in the module's identity block.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ModuleConfig;
use crate::module::{LifecycleError, LifecycleResult, Module};

/// Constructor for one module flavor.
pub type ModuleBuilder = Box<dyn Fn(&ModuleConfig) -> LifecycleResult<Arc<dyn Module>> + Send + Sync>;

/// Named module constructors.
pub struct ModuleCatalog {
    builders: HashMap<String, ModuleBuilder>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register a constructor under a module name. Re-registering a name
    /// replaces the previous builder.
    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&ModuleConfig) -> LifecycleResult<Arc<dyn Module>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.builders.insert(name.clone(), Box::new(builder)).is_some() {
            tracing::debug!(module = %name, "Catalog builder replaced");
        }
    }

    /// Build the module a config entry names.
    pub fn build(&self, config: &ModuleConfig) -> LifecycleResult<Arc<dyn Module>> {
        match self.builders.get(&config.name) {
            Some(builder) => builder(config),
            None => Err(LifecycleError::init(
                &config.name,
                "no builder registered for this module",
            )),
        }
    }

    /// Whether a builder exists for this name.
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::AccessLog;

    #[test]
    fn test_unknown_name_is_an_init_error() {
        let catalog = ModuleCatalog::new();
        let config = ModuleConfig {
            name: "ghost".into(),
            ..ModuleConfig::default()
        };
        let err = catalog.build(&config).err().unwrap();
        assert!(err.to_string().contains("no builder registered"));
    }

    #[test]
    fn test_registered_builder_runs() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("access-log", |config| Ok(AccessLog::from_config(config)));
        assert!(catalog.contains("access-log"));

        let config = ModuleConfig {
            name: "access-log".into(),
            priority: 7,
            ..ModuleConfig::default()
        };
        let module = catalog.build(&config).unwrap();
        assert_eq!(module.name(), "access-log");
        assert_eq!(module.priority(), 7);
    }
}
