//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → dispatcher.rs (favicon, route vs static precedence, middleware chain)
//!     → request.rs / response.rs (facades handed to handlers)
//!     → static_files.rs (fallback file lookup)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod request_id;
pub mod response;
pub mod server;
pub mod static_files;

pub use dispatcher::Dispatcher;
pub use request::{Request, Store};
pub use request_id::X_REQUEST_ID;
pub use response::{CookieOptions, Response, ResponseError, SameSite};
pub use server::HttpServer;
pub use static_files::{DirectorySource, NoStatic, StaticSource};
