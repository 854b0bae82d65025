//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use fsroute::config::ServerConfig;
use fsroute::lifecycle::{prepare, Shutdown};
use fsroute::{MiddlewareModule, Registry};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A throwaway `api/` + `public/` directory pair.
pub struct Tree {
    dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("api")).unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        Self { dir }
    }

    pub fn api(&self) -> PathBuf {
        self.dir.path().join("api")
    }

    pub fn public(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    pub fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Create an (empty) route or middleware file under `api/`.
    pub fn route_file(&self, relative: &str) -> &Self {
        write(&self.api().join(relative), b"");
        self
    }

    pub fn static_file(&self, relative: &str, contents: &str) -> &Self {
        write(&self.public().join(relative), contents.as_bytes());
        self
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.routes.api_dir = Some(self.api());
        config.routes.static_dir = Some(self.public());
        config.body.upload_dir = Some(self.uploads());
        config
    }
}

fn write(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// A server running on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        self.handle.await.expect("server task panicked")
    }
}

pub async fn start(config: ServerConfig, registry: Registry) -> TestServer {
    start_with(config, registry, Vec::new()).await
}

pub async fn start_with(
    config: ServerConfig,
    registry: Registry,
    globals: Vec<MiddlewareModule>,
) -> TestServer {
    let server = prepare(config, registry, globals).expect("startup failed");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
