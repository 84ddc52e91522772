//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (spans with module and connection identity)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Module name and connection ID flow through all log events via spans
//! - Metrics are cheap (atomic increments behind the recorder)
//! - Dispatch surfaces call the `record_*` helpers instead of raw macros,
//!   so metric names and labels stay consistent across the crate

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::logging::init_logging;
pub use self::metrics::{
    init_metrics, record_connection_closed, record_connection_opened, record_dispatch,
    record_module_install, record_modules_active, record_pipeline_bytes,
};
pub use self::tracing::{connection_span, module_span};
