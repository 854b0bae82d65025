//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::ServerConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file and apply environment overrides.
///
/// Not validated here: callers layer their own overrides first, then run
/// [`validate_config`](crate::config::validation::validate_config) once.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ServerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Apply `HOST` and `PORT` from the process environment.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    apply_overrides(
        config,
        std::env::var("HOST").ok(),
        std::env::var("PORT").ok(),
    );
}

fn apply_overrides(config: &mut ServerConfig, host: Option<String>, port: Option<String>) {
    if host.is_none() && port.is_none() {
        return;
    }

    let (current_host, current_port) = config
        .listener
        .bind_address
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.to_string()))
        .unwrap_or_else(|| (config.listener.bind_address.clone(), "8000".to_string()));

    let host = host.unwrap_or(current_host);
    let port = port.unwrap_or(current_port);
    config.listener.bind_address = format!("{}:{}", host, port);

    tracing::debug!(bind_address = %config.listener.bind_address, "Applied environment overrides");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_port_override_keeps_host() {
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, None, Some("9000".into()));
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn test_no_overrides_is_noop() {
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, None, None);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:8000\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.routes.api_dir.is_none());

        let errors = crate::config::validation::validate_config(&config).unwrap_err();
        let err = ConfigError::Validation(errors);
        assert!(err.to_string().contains("api and/or static"));
    }

    #[test]
    fn test_load_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[routes\napi_dir = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
