//! Modular TCP Server Library

pub mod module;
pub mod pipeline;
pub mod server;
pub mod host;
pub mod net;
pub mod config;
pub mod builtin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use host::ModuleHost;
pub use lifecycle::Shutdown;
pub use module::Module;
pub use pipeline::ExecutionLine;
pub use server::Server;
