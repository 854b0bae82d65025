//! Request facade handed to handlers and middleware.
//!
//! # Responsibilities
//! - Expose method, path, headers and client address
//! - Expose route parameters captured by the matched pattern
//! - Carry a per-request scratch store shared by middleware and handler
//! - Parse the body lazily, at most once
//!
//! # Design Decisions
//! - The raw body stays unread until a handler asks for it
//! - A failed parse is remembered; asking again returns the same error
//! - The pending body sits behind a mutex so `&Request` can cross awaits

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::body::{BodyError, BodyIngestor, FormData, MultipartData, ParsedBody};
use crate::http::X_REQUEST_ID;

/// Typed key-value scratch space exclusive to one request.
#[derive(Default)]
pub struct Store {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Store {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)?.downcast_mut()
    }

    /// Remove and return the value under `key` if it is a `T`.
    /// A value of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.values.remove(key)?;
        boxed.downcast().ok().map(|b| *b)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

enum BodyState {
    Pending(Mutex<Body>),
    Parsed(ParsedBody),
    Failed(BodyError),
    /// Ingestion was started but never finished.
    Taken,
}

/// The request as seen by handlers and middleware.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote: Option<SocketAddr>,
    params: BTreeMap<String, String>,
    kv: Store,
    body: BodyState,
    ingestor: BodyIngestor,
}

impl Request {
    pub fn new(parts: Parts, body: Body, ingestor: BodyIngestor) -> Self {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            remote,
            params: BTreeMap::new(),
            kv: Store::default(),
            body: BodyState::Pending(Mutex::new(body)),
            ingestor,
        }
    }

    pub fn from_http(request: axum::http::Request<Body>, ingestor: BodyIngestor) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body, ingestor)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// URL path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    /// Peer address of the connection, when the transport provides one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.remote.map(|addr| addr.ip())
    }

    pub fn host(&self) -> Option<&str> {
        self.header(header::HOST.as_str())
    }

    pub fn origin(&self) -> Option<&str> {
        self.header(header::ORIGIN.as_str())
    }

    pub fn referer(&self) -> Option<&str> {
        self.header(header::REFERER.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// A cookie sent by the client.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Bind the named groups of `pattern` against this request's path.
    ///
    /// Groups that did not participate (an empty catch-all) bind to `""`.
    pub(crate) fn bind_params(&mut self, pattern: &Regex) {
        self.params.clear();
        let Some(caps) = pattern.captures(self.uri.path()) else {
            return;
        };
        for name in pattern.capture_names().flatten() {
            let value = caps.name(name).map_or("", |m| m.as_str());
            self.params.insert(name.to_string(), value.to_string());
        }
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> Vec<&str> {
        self.path().split('/').filter(|s| !s.is_empty()).collect()
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// Query parameters; a repeated key keeps its last value.
    pub fn queries(&self) -> BTreeMap<String, String> {
        self.query_pairs().into_iter().collect()
    }

    /// Every value of one query parameter, in order.
    pub fn query(&self, key: &str) -> Vec<String> {
        self.query_pairs()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    /// Scratch store shared between middleware and handler.
    pub fn kv(&self) -> &Store {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut Store {
        &mut self.kv
    }

    /// The decoded body. The first call reads and parses the stream.
    pub async fn body(&mut self) -> Result<&ParsedBody, BodyError> {
        if matches!(self.body, BodyState::Pending(_)) {
            if let BodyState::Pending(raw) = std::mem::replace(&mut self.body, BodyState::Taken) {
                let raw = raw.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
                self.body = match self.ingestor.ingest(&self.headers, raw).await {
                    Ok(parsed) => BodyState::Parsed(parsed),
                    Err(e) => BodyState::Failed(e),
                };
            }
        }

        match &self.body {
            BodyState::Parsed(parsed) => Ok(parsed),
            BodyState::Failed(e) => Err(e.clone()),
            BodyState::Pending(_) | BodyState::Taken => {
                Err(BodyError::Stream("body ingestion did not complete".to_string()))
            }
        }
    }

    /// Deserialize a JSON body into `T`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        match self.body().await? {
            ParsedBody::Json(value) => {
                serde_json::from_value(value.clone()).map_err(|e| BodyError::Malformed {
                    content_type: "json",
                    reason: e.to_string(),
                })
            }
            other => Err(wrong_kind("json", other)),
        }
    }

    pub async fn form(&mut self) -> Result<&FormData, BodyError> {
        match self.body().await? {
            ParsedBody::Form(data) => Ok(data),
            other => Err(wrong_kind("form", other)),
        }
    }

    pub async fn text(&mut self) -> Result<&str, BodyError> {
        match self.body().await? {
            ParsedBody::Text(text) => Ok(text),
            other => Err(wrong_kind("text", other)),
        }
    }

    pub async fn multipart(&mut self) -> Result<&MultipartData, BodyError> {
        match self.body().await? {
            ParsedBody::Multipart(data) => Ok(data),
            other => Err(wrong_kind("multipart", other)),
        }
    }
}

fn wrong_kind(expected: &'static str, found: &ParsedBody) -> BodyError {
    BodyError::WrongKind {
        expected,
        found: found.kind(),
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("remote", &self.remote)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(method: &str, uri: &str, content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        Request::from_http(builder.body(Body::from(body)).unwrap(), BodyIngestor::default())
    }

    #[test]
    fn test_params_from_pattern() {
        let re = Regex::new(r"^/users/(?<id>[^/]+)(?:/(?<rest>.*))?/?$").unwrap();
        let mut req = request("GET", "/users/42", None, "");
        req.bind_params(&re);
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("rest"), Some(""));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_queries_and_query() {
        let req = request("GET", "/search?q=a&q=b&page=2", None, "");
        assert_eq!(req.queries()["q"], "b");
        assert_eq!(req.queries()["page"], "2");
        assert_eq!(req.query("q"), vec!["a", "b"]);
        assert!(req.query("none").is_empty());
        assert_eq!(req.path(), "/search");
    }

    #[test]
    fn test_segments() {
        let req = request("GET", "/docs/a/b/", None, "");
        assert_eq!(req.segments(), vec!["docs", "a", "b"]);
    }

    #[test]
    fn test_store_is_typed() {
        let mut req = request("GET", "/", None, "");
        req.kv_mut().insert("user", String::from("ada"));
        req.kv_mut().insert("count", 3u32);
        assert_eq!(req.kv().get::<String>("user").map(String::as_str), Some("ada"));
        assert_eq!(req.kv().get::<u64>("count"), None);
        *req.kv_mut().get_mut::<u32>("count").unwrap() += 1;
        assert_eq!(req.kv_mut().remove::<u32>("count"), Some(4));
        assert!(!req.kv().contains("count"));
    }

    #[test]
    fn test_cookie_header() {
        let req = Request::from_http(
            axum::http::Request::builder()
                .uri("/")
                .header(header::COOKIE, "a=1; session=xyz")
                .body(Body::empty())
                .unwrap(),
            BodyIngestor::default(),
        );
        assert_eq!(req.cookie("session"), Some("xyz"));
        assert_eq!(req.cookie("b"), None);
    }

    #[tokio::test]
    async fn test_typed_json_body() {
        #[derive(Deserialize)]
        struct Payload {
            a: u32,
        }
        let mut req = request("POST", "/", Some("application/json"), r#"{"a":7}"#);
        let payload: Payload = req.json().await.unwrap();
        assert_eq!(payload.a, 7);
        // Parsed once, served again from memory.
        assert!(matches!(req.body().await.unwrap(), ParsedBody::Json(_)));
    }

    #[tokio::test]
    async fn test_failure_is_remembered() {
        let mut req = request("POST", "/", Some("application/json"), "{");
        let first = req.body().await.unwrap_err();
        let second = req.body().await.unwrap_err();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_wrong_kind() {
        let mut req = request("POST", "/", Some("text/plain"), "hi");
        let err = req.form().await.unwrap_err();
        assert_eq!(err, BodyError::WrongKind { expected: "form", found: "text" });
        assert_eq!(req.text().await.unwrap(), "hi");
    }
}
