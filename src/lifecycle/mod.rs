//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections →
//!     Uninstall modules → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, then tear down modules so no
//!   dispatch chain is in flight when a module is destroyed
//! - Drain has a deadline: module teardown proceeds after it even if
//!   connections are still open
//! - Repeated stop signals force exit

pub mod shutdown;
pub mod signals;

pub use self::shutdown::Shutdown;
pub use self::signals::handle_signals;
