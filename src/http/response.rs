//! Response facade handed to handlers and middleware.
//!
//! # Responsibilities
//! - Collect status, headers and cookies
//! - Provide terminal senders (text, html, json, files, redirects)
//! - Convert into an axum response once dispatch ends
//!
//! # Design Decisions
//! - Exactly one terminal send takes effect; later ones are ignored with a warning
//! - Headers and cookies may still change after a send until dispatch ends
//! - A response that is never sent goes out with an empty body

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;

const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const HTML_UTF8: &str = "text/html; charset=utf-8";
const JSON_UTF8: &str = "application/json; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Errors raised by response helpers.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes appended to a `Set-Cookie` header.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<SystemTime>,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    fn serialize(&self, out: &mut String) {
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(expires) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&httpdate::fmt_http_date(expires));
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }
    }
}

/// The response under construction for one request.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = code;
        self
    }

    pub fn code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<&mut Self, ResponseError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Append a `Set-Cookie` header.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<&mut Self, ResponseError> {
        let mut cookie = format!("{}={}", name, value);
        options.serialize(&mut cookie);
        let (header_name, value) = parse_header(header::SET_COOKIE.as_str(), &cookie)?;
        self.headers.append(header_name, value);
        Ok(self)
    }

    /// The full `Set-Cookie` line previously set for `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.split_once('=').is_some_and(|(key, _)| key == name))
    }

    /// Whether a terminal sender already ran.
    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    /// The body committed by the terminal sender, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    fn commit(&mut self, content_type: Option<&str>, body: Bytes) {
        if self.is_sent() {
            tracing::warn!(status = %self.status, "Response already sent, ignoring second send");
            return;
        }
        if let Some(content_type) = content_type {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                self.headers.insert(header::CONTENT_TYPE, value);
            }
        }
        self.body = Some(body);
    }

    /// Send raw bytes with whatever headers were set.
    pub fn send(&mut self, body: impl Into<Bytes>) {
        self.commit(None, body.into());
    }

    /// Send bytes, defaulting the content type to `application/octet-stream`.
    pub fn raw(&mut self, body: impl Into<Bytes>) {
        let content_type = (!self.headers.contains_key(header::CONTENT_TYPE))
            .then_some(OCTET_STREAM);
        self.commit(content_type, body.into());
    }

    pub fn text(&mut self, body: impl Into<String>) {
        self.commit(Some(TEXT_UTF8), Bytes::from(body.into()));
    }

    pub fn html(&mut self, body: impl Into<String>) {
        self.commit(Some(HTML_UTF8), Bytes::from(body.into()));
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        let body = serde_json::to_vec(value)?;
        self.commit(Some(JSON_UTF8), Bytes::from(body));
        Ok(())
    }

    /// Send a file with a content type guessed from its extension.
    pub async fn file(&mut self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        let path = path.as_ref();
        let data = read(path).await?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        self.commit(Some(mime.as_ref()), data);
        Ok(())
    }

    /// Send an HTML file.
    pub async fn view(&mut self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        let data = read(path.as_ref()).await?;
        self.commit(Some(HTML_UTF8), data);
        Ok(())
    }

    /// Send a file as an attachment, named `filename` or after the file itself.
    pub async fn download(
        &mut self,
        path: impl AsRef<Path>,
        filename: Option<&str>,
    ) -> Result<(), ResponseError> {
        let path = path.as_ref();
        let name = filename
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "download".to_string());
        let data = read(path).await?;
        let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
        self.set_header(header::CONTENT_DISPOSITION.as_str(), &disposition)?;
        self.raw(data);
        Ok(())
    }

    /// `302 Found` to `location`.
    pub fn redirect(&mut self, location: &str) -> Result<(), ResponseError> {
        self.set_header(header::LOCATION.as_str(), location)?;
        self.status(StatusCode::FOUND);
        self.text(format!("Redirecting to {}", location));
        Ok(())
    }

    /// Set `code` and send its canonical reason phrase.
    pub fn send_status(&mut self, code: StatusCode) {
        self.status(code);
        if code == StatusCode::NO_CONTENT {
            self.send(Bytes::new());
        } else {
            self.text(code.canonical_reason().unwrap_or_default());
        }
    }

    pub fn into_http(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

macro_rules! canned_senders {
    ($($name:ident => $status:ident),* $(,)?) => {
        impl Response {
            $(
                pub fn $name(&mut self) {
                    self.send_status(StatusCode::$status);
                }
            )*
        }
    };
}

canned_senders! {
    ok => OK,
    created => CREATED,
    accepted => ACCEPTED,
    no_content => NO_CONTENT,
    bad_request => BAD_REQUEST,
    unauthorized => UNAUTHORIZED,
    forbidden => FORBIDDEN,
    not_found => NOT_FOUND,
    method_not_allowed => METHOD_NOT_ALLOWED,
    conflict => CONFLICT,
    internal_server_error => INTERNAL_SERVER_ERROR,
    not_implemented => NOT_IMPLEMENTED,
    bad_gateway => BAD_GATEWAY,
    service_unavailable => SERVICE_UNAVAILABLE,
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ResponseError> {
    let invalid = |reason: String| ResponseError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

async fn read(path: &Path) -> Result<Bytes, ResponseError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| ResponseError::Read {
            path: path.to_path_buf(),
            source,
        })
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("sent", &self.is_sent())
            .finish()
    }
}
