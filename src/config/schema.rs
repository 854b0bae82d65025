//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route discovery settings.
    pub routes: RoutesConfig,

    /// Request body ingestion limits.
    pub body: BodyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Which handler serves GET when an HTML file and an API route share a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HtmlPrecedence {
    /// The HTML view replaces the module's own GET.
    #[default]
    Static,
    /// The module's own GET is kept; the view only fills a missing GET.
    Route,
}

/// Route discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutesConfig {
    /// Directory whose files become API routes.
    pub api_dir: Option<PathBuf>,

    /// Directory served as static content.
    pub static_dir: Option<PathBuf>,

    /// GET precedence for HTML files that collide with an API route.
    pub html_precedence: HtmlPrecedence,

    /// Treat two route files compiling to the same pattern as a startup failure.
    pub strict_collisions: bool,
}

/// Request body configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum accepted body size in bytes.
    pub max_size: usize,

    /// Where multipart uploads are written. Defaults to the process temp dir.
    pub upload_dir: Option<PathBuf>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024, // 1 MiB
            upload_dir: None,
        }
    }
}

impl BodyConfig {
    /// The effective upload directory.
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Install the global access logger middleware.
    pub access_log: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            access_log: true,
        }
    }
}
