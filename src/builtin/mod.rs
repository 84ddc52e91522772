//! Compiled-in modules.
//!
//! These are real modules shipped with the server, not samples: the
//! default config installs both. They double as the reference for how a
//! module implements the contract (identity from config, hooks that
//! register `self`, mirrored unhooks).

pub mod access_log;
pub mod byte_counter;

pub use self::access_log::{AccessLog, AccessStamp};
pub use self::byte_counter::{ByteCount, ByteCounter};

use crate::host::ModuleCatalog;

/// Catalog with every compiled-in module registered under its config name.
pub fn catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog.register("access-log", |config| Ok(AccessLog::from_config(config)));
    catalog.register("byte-counter", |config| Ok(ByteCounter::from_config(config)));
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_knows_every_builtin() {
        let catalog = catalog();
        assert_eq!(catalog.names(), vec!["access-log", "byte-counter"]);
    }
}
