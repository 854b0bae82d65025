//! Explicit route module registry.
//!
//! # Responsibilities
//! - Map route files (by path relative to the API directory) to typed modules
//! - Map `(scope)` middleware files to before/after hooks
//! - Provide a total method → handler mapping over a closed method set
//!
//! # Design Decisions
//! - Files on disk decide *which* routes exist; the registry supplies *what*
//!   they do. A file without a registration is a startup failure.
//! - Handlers borrow the request and response facades for the duration of
//!   one call; they never own them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{Request, Response};
use crate::routing::pattern::route_key;

/// Error type returned by handlers and middleware hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a handler or hook invocation.
pub type HandlerResult = Result<(), BoxError>;

/// A route handler or middleware hook.
pub type Handler = Arc<
    dyn for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync,
>;

/// Wrap a closure or function into a [`Handler`].
///
/// ```rust,ignore
/// let hello = handler_fn(|_req, res| Box::pin(async move {
///     res.text("hello");
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// HTTP methods a route module can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    pub const COUNT: usize = 9;

    pub const ALL: [Method; Method::COUNT] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
        Method::Connect,
        Method::Trace,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }

    /// Map a transport method. Extension methods have no variant.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// The handlers one route file exposes.
#[derive(Clone, Default)]
pub struct RouteModule {
    handlers: [Option<Handler>; Method::COUNT],
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler for `method`, replacing any previous one.
    pub fn on<F>(mut self, method: Method, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.set(method, handler_fn(f));
        self
    }

    pub fn get<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.on(Method::Get, f)
    }

    pub fn post<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.on(Method::Post, f)
    }

    pub fn put<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.on(Method::Put, f)
    }

    pub fn delete<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.on(Method::Delete, f)
    }

    pub fn patch<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.on(Method::Patch, f)
    }

    pub fn set(&mut self, method: Method, handler: Handler) {
        self.handlers[method.index()] = Some(handler);
    }

    pub fn handler(&self, method: Method) -> Option<&Handler> {
        self.handlers[method.index()].as_ref()
    }

    pub fn supports(&self, method: Method) -> bool {
        self.handler(method).is_some()
    }

    /// Methods with a handler, in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(|m| self.supports(*m))
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.methods()).finish()
    }
}

/// Before/after hooks of one middleware scope.
#[derive(Clone, Default)]
pub struct MiddlewareModule {
    pub before: Option<Handler>,
    pub after: Option<Handler>,
}

impl MiddlewareModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.before = Some(handler_fn(f));
        self
    }

    pub fn after<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        self.after = Some(handler_fn(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

impl fmt::Debug for MiddlewareModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareModule")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Modules keyed by their file path relative to the API directory.
#[derive(Debug, Default)]
pub struct Registry {
    routes: BTreeMap<String, RouteModule>,
    middleware: BTreeMap<String, MiddlewareModule>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route file, e.g. `"users/[id]"` or `"users/[id].rs"`.
    pub fn route(mut self, path: &str, module: RouteModule) -> Self {
        self.routes.insert(route_key(path), module);
        self
    }

    /// Register a middleware file, e.g. `"admin/(auth)"`.
    pub fn middleware(mut self, path: &str, module: MiddlewareModule) -> Self {
        self.middleware.insert(route_key(path), module);
        self
    }

    pub(crate) fn take_route(&mut self, key: &str) -> Option<RouteModule> {
        self.routes.remove(key)
    }

    pub(crate) fn take_middleware(&mut self, key: &str) -> Option<MiddlewareModule> {
        self.middleware.remove(key)
    }

    /// Keys registered but never claimed by a file on disk.
    pub(crate) fn leftovers(&self) -> impl Iterator<Item = &str> {
        self.routes
            .keys()
            .chain(self.middleware.keys())
            .map(String::as_str)
    }
}
