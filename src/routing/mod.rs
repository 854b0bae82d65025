//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     api_dir / static_dir
//!     → scan.rs (recursive listing, middleware vs route files)
//!     → pattern.rs (file path → anchored regex pattern)
//!     → middleware.rs (scope tree → flattened hook list per route)
//!     → registry.rs (file key → typed RouteModule)
//!     → table.rs (sort by specificity, freeze as immutable RouteTable)
//!
//! Incoming Request (path):
//!     → table.rs (first matching entry)
//!     → Return: matched RouteEntry or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same tree always yields the same table
//! - First match wins (ordered by specificity)
//! - Any startup error is fatal; no partial tables

pub mod error;
pub mod middleware;
pub mod pattern;
pub mod registry;
pub mod scan;
pub mod table;

pub use error::StartupError;
pub use middleware::{MiddlewareResolver, ScopedMiddleware};
pub use registry::{handler_fn, BoxError, Handler, HandlerResult, Method, MiddlewareModule, Registry, RouteModule};
pub use table::{RouteEntry, RouteTable};
