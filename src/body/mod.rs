//! Request body ingestion.
//!
//! # Data Flow
//! ```text
//! Content-Type header
//!     → MediaKind (form | json | text | multipart, else 415)
//! Body stream
//!     → read_limited (sum chunk lengths, abort past the ceiling)
//!     → decoder for the MediaKind
//!     → ParsedBody
//! ```
//!
//! # Design Decisions
//! - Content type is checked before a single byte is read
//! - The ceiling aborts ingestion; nothing partial is ever decoded
//! - Parsing is lazy and happens at most once per request (see `http::Request`)
//! - Multipart files are written to the upload dir and never cleaned up here

pub mod form;
pub mod json;
pub mod multipart;
pub mod text;

use std::path::PathBuf;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use futures_util::StreamExt;
use serde::Serialize;
use thiserror::Error;

use crate::config::BodyConfig;

pub use form::{FormData, FormValue};
pub use multipart::{MultipartData, MultipartValue, UploadedFile};

/// Errors raised while reading or decoding a request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    /// The body grew past the configured ceiling.
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// No decoder handles the declared content type.
    #[error("invalid content-type in request: {0:?}")]
    UnsupportedMediaType(String),

    /// The declared charset cannot be decoded.
    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// The decoder rejected the payload.
    #[error("malformed {content_type} body: {reason}")]
    Malformed {
        content_type: &'static str,
        reason: String,
    },

    /// The client stream failed or disconnected.
    #[error("request body stream failed: {0}")]
    Stream(String),

    /// An uploaded file could not be written.
    #[error("failed to store upload: {0}")]
    Upload(String),

    /// A typed reader was used on a body of another kind.
    #[error("expected a {expected} body, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
}

impl BodyError {
    /// The single status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::UnsupportedMediaType(_) | BodyError::UnsupportedCharset(_) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            BodyError::Malformed { .. } | BodyError::Stream(_) | BodyError::WrongKind { .. } => {
                StatusCode::BAD_REQUEST
            }
            BodyError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A decoded request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedBody {
    Form(FormData),
    Json(serde_json::Value),
    Text(String),
    Multipart(MultipartData),
}

impl ParsedBody {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedBody::Form(_) => "form",
            ParsedBody::Json(_) => "json",
            ParsedBody::Text(_) => "text",
            ParsedBody::Multipart(_) => "multipart",
        }
    }
}

/// Decoder selected by the primary token of the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Form,
    Json,
    Text,
    Multipart,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Result<Self, BodyError> {
        let primary = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "application/x-www-form-urlencoded" => Ok(MediaKind::Form),
            "application/json" => Ok(MediaKind::Json),
            "text/plain" => Ok(MediaKind::Text),
            "multipart/form-data" => Ok(MediaKind::Multipart),
            _ => Err(BodyError::UnsupportedMediaType(content_type.to_string())),
        }
    }
}

/// Split `k=v; k2="v 2"` header parameters, honouring quoted values.
///
/// Keys are lowercased; tokens without `=` are skipped.
pub fn header_params(value: &str) -> Vec<(String, String)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);

    pieces
        .iter()
        .filter_map(|piece| {
            let (key, value) = piece.split_once('=')?;
            let value = value.trim();
            let value = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
                None => value.to_string(),
            };
            Some((key.trim().to_ascii_lowercase(), value))
        })
        .collect()
}

/// Look up one header parameter by (case-insensitive) name.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    header_params(value)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Accumulate a body stream, failing as soon as it exceeds `limit` bytes.
pub async fn read_limited(body: Body, limit: usize) -> Result<Bytes, BodyError> {
    let mut stream = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut received = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BodyError::Stream(e.to_string()))?;
        received += chunk.len();
        if received > limit {
            tracing::warn!(limit, received, "Request body exceeds limit, aborting");
            return Err(BodyError::PayloadTooLarge { limit });
        }
        chunks.push(chunk);
    }

    if chunks.len() == 1 {
        return Ok(chunks.remove(0));
    }
    let mut buf = Vec::with_capacity(received);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Ok(Bytes::from(buf))
}

/// Reads and decodes request bodies under a fixed size ceiling.
#[derive(Debug, Clone)]
pub struct BodyIngestor {
    limit: usize,
    upload_dir: PathBuf,
}

impl Default for BodyIngestor {
    fn default() -> Self {
        Self::from_config(&BodyConfig::default())
    }
}

impl BodyIngestor {
    pub fn new(limit: usize, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            limit,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn from_config(config: &BodyConfig) -> Self {
        Self::new(config.max_size, config.upload_dir())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Read `body` and decode it according to `headers`.
    pub async fn ingest(&self, headers: &HeaderMap, body: Body) -> Result<ParsedBody, BodyError> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let kind = MediaKind::from_content_type(content_type)?;

        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.limit) {
            tracing::warn!(limit = self.limit, declared = ?declared, "Declared content length exceeds limit");
            return Err(BodyError::PayloadTooLarge { limit: self.limit });
        }

        let bytes = read_limited(body, self.limit).await?;
        let charset = text::charset_label(content_type, headers);

        tracing::trace!(kind = ?kind, bytes = bytes.len(), "Decoding request body");

        match kind {
            MediaKind::Form => form::decode(&bytes, charset.as_deref()).map(ParsedBody::Form),
            MediaKind::Json => json::decode(&bytes, charset.as_deref()).map(ParsedBody::Json),
            MediaKind::Text => text::decode(&bytes, charset.as_deref()).map(ParsedBody::Text),
            MediaKind::Multipart => multipart::decode(&bytes, content_type, &self.upload_dir)
                .await
                .map(ParsedBody::Multipart),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_media_kind_ignores_parameters() {
        assert_eq!(
            MediaKind::from_content_type("application/json; charset=utf-8").unwrap(),
            MediaKind::Json
        );
        assert_eq!(
            MediaKind::from_content_type("Multipart/Form-Data; boundary=x").unwrap(),
            MediaKind::Multipart
        );
        assert_eq!(
            MediaKind::from_content_type("image/png").unwrap_err(),
            BodyError::UnsupportedMediaType("image/png".into())
        );
        assert!(MediaKind::from_content_type("").is_err());
    }

    #[test]
    fn test_header_params() {
        let params = header_params(r#"form-data; name="a;b"; filename=x.txt"#);
        assert_eq!(
            params,
            vec![("name".to_string(), "a;b".to_string()), ("filename".to_string(), "x.txt".to_string())]
        );
        assert_eq!(
            header_param("multipart/form-data; Boundary=\"abc\"", "boundary").as_deref(),
            Some("abc")
        );
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let ingestor = BodyIngestor::default();
        let parsed = ingestor
            .ingest(&headers("application/json"), Body::from(r#"{"a":1}"#))
            .await
            .unwrap();
        assert_eq!(parsed, ParsedBody::Json(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_over_limit_fails_before_decoding() {
        let ingestor = BodyIngestor::new(1024 * 1024, std::env::temp_dir());
        let body = vec![b'a'; 1024 * 1024 + 1];
        let err = ingestor
            .ingest(&headers("text/plain"), Body::from(body))
            .await
            .unwrap_err();
        assert_eq!(err, BodyError::PayloadTooLarge { limit: 1024 * 1024 });
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let ingestor = BodyIngestor::new(8, std::env::temp_dir());
        let parsed = ingestor
            .ingest(&headers("text/plain"), Body::from("12345678"))
            .await
            .unwrap();
        assert_eq!(parsed, ParsedBody::Text("12345678".into()));
    }

    #[tokio::test]
    async fn test_streamed_chunks_over_limit() {
        let chunks = vec![Ok::<_, std::convert::Infallible>(Bytes::from_static(b"12345")); 3];
        let body = Body::from_stream(futures_util::stream::iter(chunks));
        let err = read_limited(body, 12).await.unwrap_err();
        assert_eq!(err, BodyError::PayloadTooLarge { limit: 12 });
    }

    #[tokio::test]
    async fn test_streamed_chunks_concatenated() {
        let chunks = vec![Ok::<_, std::convert::Infallible>(Bytes::from_static(b"ab")); 3];
        let body = Body::from_stream(futures_util::stream::iter(chunks));
        assert_eq!(read_limited(body, 100).await.unwrap(), Bytes::from_static(b"ababab"));
    }

    #[tokio::test]
    async fn test_unsupported_type_names_header() {
        let err = BodyIngestor::default()
            .ingest(&headers("application/xml"), Body::from("<a/>"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("application/xml"));
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let err = BodyIngestor::default()
            .ingest(&HeaderMap::new(), Body::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BodyError::UnsupportedMediaType(_)));
    }
}
