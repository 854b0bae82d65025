//! Per-request orchestration.
//!
//! # Flow
//! ```text
//! /favicon.ico ─→ 204
//! resolve route + static file
//!     ├─ route answers method ─→ global BEFORE → scoped BEFORE → handler
//!     │                          → scoped AFTER → global AFTER
//!     ├─ static file (GET/HEAD) ─→ serve file
//!     ├─ route or file without method ─→ 405
//!     └─ neither ─→ 404
//! any error or panic ─→ fixed status, fixed body
//! ```
//!
//! # Design Decisions
//! - Phases run strictly in sequence; global hooks run in registration order
//! - Global hooks are awaited one at a time, not concurrently: every hook
//!   borrows the request and response mutably, so no two can be in flight
//! - A BEFORE hook that sends a response skips the rest of BEFORE and the
//!   handler; AFTER hooks still run
//! - Errors never leak detail to the client

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use futures_util::FutureExt;

use crate::body::{BodyError, BodyIngestor};
use crate::http::static_files::StaticSource;
use crate::http::{Request, Response};
use crate::routing::{BoxError, Handler, HandlerResult, Method, MiddlewareModule, RouteEntry, RouteTable};

const FAVICON: &str = "/favicon.ico";

/// Drives one request through the route table.
pub struct Dispatcher {
    table: RouteTable,
    statics: Arc<dyn StaticSource>,
    globals: Vec<MiddlewareModule>,
    ingestor: BodyIngestor,
}

/// What the route table and static source say about a request.
enum Resolution<'t> {
    Route(&'t RouteEntry, Handler),
    Static(std::path::PathBuf),
    MethodNotAllowed(Vec<&'static str>),
    NotFound,
}

async fn invoke(hook: &Handler, req: &mut Request, res: &mut Response) -> HandlerResult {
    hook(req, res).await
}

impl Dispatcher {
    pub fn new(table: RouteTable, statics: Arc<dyn StaticSource>, ingestor: BodyIngestor) -> Self {
        Self {
            table,
            statics,
            globals: Vec::new(),
            ingestor,
        }
    }

    /// Add a process-wide middleware. Globals wrap every scoped hook.
    pub fn with_global(mut self, module: MiddlewareModule) -> Self {
        self.globals.push(module);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Handle one request. Never fails; every path yields a response.
    pub async fn dispatch(&self, request: axum::http::Request<Body>) -> axum::response::Response {
        if request.uri().path() == FAVICON {
            return fixed(StatusCode::NO_CONTENT);
        }

        let mut req = Request::from_http(request, self.ingestor.clone());
        let mut res = Response::new();

        let outcome = AssertUnwindSafe(self.run(&mut req, &mut res))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => res.into_http(),
            Ok(Err(e)) => {
                let status = failure_status(e.as_ref());
                tracing::error!(
                    request_id = req.request_id().unwrap_or("unknown"),
                    method = %req.method(),
                    path = %req.path(),
                    status = status.as_u16(),
                    error = %e,
                    "Request failed"
                );
                fixed(status)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(
                    request_id = req.request_id().unwrap_or("unknown"),
                    method = %req.method(),
                    path = %req.path(),
                    panic = %message,
                    "Handler panicked"
                );
                fixed(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn resolve(&self, req: &Request) -> Resolution<'_> {
        let method = Method::from_http(req.method());
        let route = self.table.match_path(req.path());

        if let (Some(entry), Some(method)) = (route, method) {
            let handler = entry.handler(method).or_else(|| {
                // HEAD borrows GET; the transport drops the body.
                (method == Method::Head)
                    .then(|| entry.handler(Method::Get))
                    .flatten()
            });
            if let Some(handler) = handler {
                return Resolution::Route(entry, handler.clone());
            }
        }

        let readable = matches!(method, Some(Method::Get) | Some(Method::Head));
        if let Some(file) = self.statics.locate(req.path()).await {
            if readable {
                return Resolution::Static(file);
            }
            if route.is_none() {
                return Resolution::MethodNotAllowed(vec!["GET", "HEAD"]);
            }
        }

        match route {
            Some(entry) => Resolution::MethodNotAllowed(
                entry.module().methods().map(Method::as_str).collect(),
            ),
            None => Resolution::NotFound,
        }
    }

    async fn run(&self, req: &mut Request, res: &mut Response) -> Result<(), BoxError> {
        match self.resolve(req).await {
            Resolution::Route(entry, handler) => {
                req.bind_params(entry.regex());
                self.run_route(entry, &handler, req, res).await
            }
            Resolution::Static(file) => {
                let data = self.statics.read(&file).await?;
                let mime = mime_guess::from_path(&file).first_or_octet_stream();
                res.set_header(header::CONTENT_TYPE.as_str(), mime.as_ref())?;
                res.send(data);
                Ok(())
            }
            Resolution::MethodNotAllowed(allowed) => {
                res.set_header(header::ALLOW.as_str(), &allowed.join(", "))?;
                res.method_not_allowed();
                Ok(())
            }
            Resolution::NotFound => {
                res.not_found();
                Ok(())
            }
        }
    }

    async fn run_route(
        &self,
        entry: &RouteEntry,
        handler: &Handler,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), BoxError> {
        let scoped = entry.middleware();

        let befores = self
            .globals
            .iter()
            .filter_map(|g| g.before.as_ref())
            .chain(scoped.iter().filter_map(|m| m.module.before.as_ref()));
        for hook in befores {
            invoke(hook, req, res).await?;
            if res.is_sent() {
                break;
            }
        }

        if !res.is_sent() {
            invoke(handler, req, res).await?;
        }

        let afters = scoped
            .iter()
            .filter_map(|m| m.module.after.as_ref())
            .chain(self.globals.iter().filter_map(|g| g.after.as_ref()));
        for hook in afters {
            invoke(hook, req, res).await?;
        }

        Ok(())
    }
}

/// Status for a failed request: body errors keep their own, the rest are 500.
fn failure_status(error: &(dyn std::error::Error + Send + Sync + 'static)) -> StatusCode {
    error
        .downcast_ref::<BodyError>()
        .map(BodyError::status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn fixed(status: StatusCode) -> axum::response::Response {
    let body = if status == StatusCode::NO_CONTENT {
        Body::empty()
    } else {
        Body::from(status.canonical_reason().unwrap_or("Error"))
    };
    let mut response = axum::response::Response::new(body);
    *response.status_mut() = status;
    if status != StatusCode::NO_CONTENT {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    response
}
