//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (subscriber with env filter, structured events)
//!     → access_log.rs (global middleware: one event per routed request)
//! tower-http TraceLayer adds a span per HTTP request (see http::server)
//! ```

pub mod access_log;
pub mod logging;

pub use access_log::access_log;
