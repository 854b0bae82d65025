//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - At least one route source directory must be configured
//! - Validate value ranges (body limit > 0, bind address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A configured directory that is missing on disk only warns: the other
//!   directory may still populate the route table

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingDirectories,
    InvalidBindAddress(String),
    ZeroBodyLimit,
    ZeroTimeout,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingDirectories => {
                write!(f, "an api and/or static directory must be specified")
            }
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "invalid bind address: {}", addr)
            }
            ValidationError::ZeroBodyLimit => write!(f, "body.max_size must be greater than 0"),
            ValidationError::ZeroTimeout => {
                write!(f, "timeouts.request_secs must be greater than 0")
            }
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.api_dir.is_none() && config.routes.static_dir.is_none() {
        errors.push(ValidationError::MissingDirectories);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.body.max_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    for dir in [&config.routes.api_dir, &config.routes.static_dir]
        .into_iter()
        .flatten()
    {
        if !dir.is_dir() {
            tracing::warn!(directory = %dir.display(), "Configured directory not found");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_requires_a_directory() {
        let config = ServerConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingDirectories]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.body.max_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
    }

    #[test]
    fn test_missing_directory_is_not_fatal() {
        let mut config = ServerConfig::default();
        config.routes.api_dir = Some(PathBuf::from("/definitely/not/here"));
        assert!(validate_config(&config).is_ok());
    }
}
