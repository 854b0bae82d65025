//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The route table is fully built before the server exists, so no request
//!   can observe a partially built table
//! - The access logger, when enabled, is the outermost global middleware

use std::sync::Arc;

use crate::body::BodyIngestor;
use crate::config::ServerConfig;
use crate::http::{DirectorySource, Dispatcher, HttpServer, NoStatic, StaticSource};
use crate::observability::access_log;
use crate::routing::{MiddlewareModule, Registry, RouteTable, StartupError};

/// Build the route table and dispatcher, returning a server ready to run.
pub fn prepare(
    config: ServerConfig,
    registry: Registry,
    globals: Vec<MiddlewareModule>,
) -> Result<HttpServer, StartupError> {
    let table = RouteTable::build(&config.routes, registry)?;

    let statics: Arc<dyn StaticSource> = match &config.routes.static_dir {
        Some(dir) => Arc::new(DirectorySource::new(dir)),
        None => Arc::new(NoStatic),
    };

    let mut dispatcher = Dispatcher::new(table, statics, BodyIngestor::from_config(&config.body));
    if config.observability.access_log {
        dispatcher = dispatcher.with_global(access_log());
    }
    for module in globals {
        dispatcher = dispatcher.with_global(module);
    }

    tracing::info!(
        routes = dispatcher.table().len(),
        api_dir = ?config.routes.api_dir,
        static_dir = ?config.routes.static_dir,
        body_limit = config.body.max_size,
        "Startup complete"
    );

    Ok(HttpServer::new(dispatcher, config))
}
