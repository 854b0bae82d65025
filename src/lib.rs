//! File-system routed HTTP server toolkit.
//!
//! Files under an API directory become routes: `users/[id].rs` answers
//! `/users/42`, `docs/[...slug].rs` answers `/docs` and everything below it,
//! and `(name).rs` files are before/after middleware for their directory
//! subtree. A static directory supplies fallback files and HTML views.
//!
//! ```rust,ignore
//! let registry = Registry::new().route(
//!     "users/[id]",
//!     RouteModule::new().get(|req, res| Box::pin(async move {
//!         res.json(&serde_json::json!({ "id": req.param("id") }))?;
//!         Ok(())
//!     })),
//! );
//! let server = fsroute::lifecycle::prepare(config, registry, Vec::new())?;
//! server.run(listener, shutdown.subscribe()).await?;
//! ```

pub mod body;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{Dispatcher, HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{Method, MiddlewareModule, Registry, RouteModule, RouteTable};
