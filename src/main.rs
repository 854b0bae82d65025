//! fsroute: serve a file-system routed API and a static directory.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (request id, trace, timeout)
//!                         │
//!                         ▼
//!                     Dispatcher ──▶ RouteTable ──▶ global/scoped BEFORE
//!                         │                             │
//!                         │                             ▼
//!                         │                          handler ──▶ BodyIngestor
//!                         │                             │
//!                         ▼                             ▼
//!                     static files               scoped/global AFTER
//! ```
//!
//! Route handlers are compiled in: each file under `demos/api` is both the
//! route's location on disk and the module registered for it.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fsroute::config::validation::validate_config;
use fsroute::config::{apply_env_overrides, load_config, ConfigError, ServerConfig};
use fsroute::lifecycle::{prepare, signals, Shutdown};
use fsroute::observability::logging;
use fsroute::Registry;

#[path = "../demos/api/index.rs"]
mod index;
#[path = "../demos/api/echo.rs"]
mod echo;
#[path = "../demos/api/(timing).rs"]
mod timing;
#[path = "../demos/api/users/[id].rs"]
mod users_id;
#[path = "../demos/api/docs/[...slug].rs"]
mod docs_slug;
#[path = "../demos/api/admin/(auth).rs"]
mod admin_auth;
#[path = "../demos/api/admin/stats.rs"]
mod admin_stats;

#[derive(Parser, Debug)]
#[command(name = "fsroute", version, about = "File-system routed HTTP server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API route directory (overrides the config file).
    #[arg(long)]
    api: Option<PathBuf>,

    /// Static file directory (overrides the config file).
    #[arg(long = "static")]
    static_dir: Option<PathBuf>,

    /// Bind address, e.g. 127.0.0.1:8000 (overrides the config file and HOST/PORT).
    #[arg(short, long)]
    bind: Option<String>,
}

fn demo_registry() -> Registry {
    Registry::new()
        .route("index", index::module())
        .route("echo", echo::module())
        .route("users/[id]", users_id::module())
        .route("docs/[...slug]", docs_slug::module())
        .route("admin/stats", admin_stats::module())
        .middleware("(timing)", timing::module())
        .middleware("admin/(auth)", admin_auth::module())
}

fn resolve_config(cli: Cli) -> Result<ServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = ServerConfig::default();
            config.routes.api_dir = Some(PathBuf::from("demos/api"));
            config.routes.static_dir = Some(PathBuf::from("demos/public"));
            apply_env_overrides(&mut config);
            config
        }
    };

    if let Some(api) = cli.api {
        config.routes.api_dir = Some(api);
    }
    if let Some(static_dir) = cli.static_dir {
        config.routes.static_dir = Some(static_dir);
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli)?;

    logging::init(&config.observability.log_level);
    tracing::info!("fsroute v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let bind_address = config.listener.bind_address.clone();
    let server = prepare(config, demo_registry(), Vec::new())?;

    // Bind only once the route table is complete.
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::forward_to(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::io::Write;

    #[test]
    fn test_cli_api_dir_completes_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:8000\"").unwrap();

        let args: Vec<OsString> = vec![
            "fsroute".into(),
            "--config".into(),
            file.path().as_os_str().to_owned(),
            "--api".into(),
            dir.path().as_os_str().to_owned(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let config = resolve_config(cli).unwrap();
        assert_eq!(config.routes.api_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_file_config_without_directories_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:8000\"").unwrap();

        let args: Vec<OsString> = vec![
            "fsroute".into(),
            "--config".into(),
            file.path().as_os_str().to_owned(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(resolve_config(cli), Err(ConfigError::Validation(_))));
    }
}
