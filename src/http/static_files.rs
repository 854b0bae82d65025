//! Static file lookup for the dispatcher's fallback branch.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;

/// Where the dispatcher looks for files when no route answers a request.
#[async_trait]
pub trait StaticSource: Send + Sync {
    /// The file backing `url_path`, if one exists.
    async fn locate(&self, url_path: &str) -> Option<PathBuf>;

    async fn read(&self, path: &Path) -> std::io::Result<Bytes>;
}

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `url_path` under the root, refusing anything but plain names.
    fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut pushed = false;
        for segment in url_path.split('/').filter(|s| !s.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => path.push(name),
                _ => return None,
            }
            pushed = true;
        }
        pushed.then_some(path)
    }
}

#[async_trait]
impl StaticSource for DirectorySource {
    async fn locate(&self, url_path: &str) -> Option<PathBuf> {
        let path = self.resolve(url_path)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    async fn read(&self, path: &Path) -> std::io::Result<Bytes> {
        tokio::fs::read(path).await.map(Bytes::from)
    }
}

/// A source with no files, for servers without a static directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStatic;

#[async_trait]
impl StaticSource for NoStatic {
    async fn locate(&self, _url_path: &str) -> Option<PathBuf> {
        None
    }

    async fn read(&self, path: &Path) -> std::io::Result<Bytes> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no static source for {}", path.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn source() -> (tempfile::TempDir, DirectorySource) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
        let source = DirectorySource::new(dir.path());
        (dir, source)
    }

    #[tokio::test]
    async fn test_locates_files() {
        let (_dir, source) = source();
        let found = source.locate("/css/site.css").await.unwrap();
        assert_eq!(source.read(&found).await.unwrap(), Bytes::from_static(b"body{}"));
        assert!(source.locate("/robots.txt").await.is_some());
    }

    #[tokio::test]
    async fn test_directories_and_missing_files_are_not_found() {
        let (_dir, source) = source();
        assert!(source.locate("/css").await.is_none());
        assert!(source.locate("/").await.is_none());
        assert!(source.locate("/nope.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_dir, source) = source();
        assert!(source.locate("/../secret.txt").await.is_none());
        assert!(source.locate("/css/../../secret.txt").await.is_none());
        assert!(source.locate("/./robots.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_no_static() {
        assert!(NoStatic.locate("/anything").await.is_none());
        assert!(NoStatic.read(Path::new("/x")).await.is_err());
    }
}
