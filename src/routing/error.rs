//! Startup error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that prevent the route table from being built.
///
/// All of them are fatal: the listener never starts with a partial table.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Neither an API nor a static directory was configured.
    #[error("you must specify an api and/or static directory")]
    MissingDirectories,

    /// Walking a route directory failed.
    #[error("failed to scan {dir}: {reason}")]
    Scan { dir: PathBuf, reason: String },

    /// A file path could not be turned into a route pattern.
    #[error("invalid route pattern for {file}: {reason}")]
    InvalidPattern { file: String, reason: String },

    /// The same parameter name appears twice in one route path.
    #[error("duplicate parameter [{param}] in {file}")]
    DuplicateParam { file: String, param: String },

    /// A discovered file has no registered module.
    #[error("no module registered for {0}")]
    ModuleNotRegistered(String),

    /// A middleware module is unusable.
    #[error("malformed middleware {file}: {reason}")]
    MalformedMiddleware { file: String, reason: String },

    /// Two route files compile to the same pattern.
    #[error("route pattern {pattern} defined by both {first} and {second}")]
    PatternCollision {
        pattern: String,
        first: String,
        second: String,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
