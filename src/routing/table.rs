//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Walk the API and static directories once at startup
//! - Compile each file into a pattern and attach its module and middleware
//! - Install view handlers for HTML files
//! - Answer "which entry matches this path" in specificity order
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Entries sorted by ascending specificity: capture group count, then
//!   catch-all groups, then pattern length; ties keep discovery order
//! - First match wins under that ordering
//! - Matching is case-insensitive

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};

use crate::config::{HtmlPrecedence, RoutesConfig};
use crate::routing::middleware::{MiddlewareResolver, ScopedMiddleware};
use crate::routing::pattern::{compile_key, relative_key, specificity};
use crate::routing::registry::{handler_fn, Handler, Method, Registry, RouteModule};
use crate::routing::scan::{is_html, is_middleware_key, list_files};
use crate::routing::StartupError;

/// One compiled route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pattern: String,
    regex: Regex,
    module: RouteModule,
    middleware: Vec<ScopedMiddleware>,
    source: PathBuf,
}

impl RouteEntry {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn module(&self) -> &RouteModule {
        &self.module
    }

    pub fn middleware(&self) -> &[ScopedMiddleware] {
        &self.middleware
    }

    /// The file that defined this entry (last one wins on collisions).
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn handler(&self, method: Method) -> Option<&Handler> {
        self.module.handler(method)
    }
}

/// The immutable, ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

fn build_regex(pattern: &str, key: &str) -> Result<Regex, StartupError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| StartupError::InvalidPattern {
            file: key.to_string(),
            reason: e.to_string(),
        })
}

fn view_handler(file: PathBuf) -> Handler {
    handler_fn(move |_req, res| {
        let file = file.clone();
        Box::pin(async move {
            res.view(&file).await?;
            Ok(())
        })
    })
}

impl RouteTable {
    /// Scan the configured directories and build the table.
    pub fn build(config: &RoutesConfig, mut registry: Registry) -> Result<Self, StartupError> {
        if config.api_dir.is_none() && config.static_dir.is_none() {
            return Err(StartupError::MissingDirectories);
        }

        let mut entries: Vec<RouteEntry> = Vec::new();
        let mut by_pattern: HashMap<String, usize> = HashMap::new();

        if let Some(api_dir) = &config.api_dir {
            let files = list_files(api_dir)?;
            let (middleware_keys, route_files): (Vec<_>, Vec<_>) = files
                .into_iter()
                .map(|f| (relative_key(&f, api_dir), f))
                .partition(|(key, _)| is_middleware_key(key));

            let middleware_keys: Vec<String> = middleware_keys.into_iter().map(|(k, _)| k).collect();
            let resolver = MiddlewareResolver::load(&middleware_keys, &mut registry)?;

            for (key, file) in route_files {
                let pattern = compile_key(&key)?;
                let regex = build_regex(&pattern, &key)?;
                let module = registry
                    .take_route(&key)
                    .ok_or_else(|| StartupError::ModuleNotRegistered(key.clone()))?;
                let middleware = resolver.resolve(&key);

                tracing::debug!(
                    pattern = %pattern,
                    file = %file.display(),
                    methods = ?module.methods().collect::<Vec<_>>(),
                    middleware = middleware.len(),
                    "Route compiled"
                );

                let entry = RouteEntry {
                    pattern: pattern.clone(),
                    regex,
                    module,
                    middleware,
                    source: file,
                };

                match by_pattern.get(&pattern) {
                    Some(&index) => {
                        let previous = &entries[index];
                        if config.strict_collisions {
                            return Err(StartupError::PatternCollision {
                                pattern,
                                first: previous.source.display().to_string(),
                                second: entry.source.display().to_string(),
                            });
                        }
                        tracing::warn!(
                            pattern = %pattern,
                            replaced = %previous.source.display(),
                            by = %entry.source.display(),
                            "Route pattern collision, last discovered file wins"
                        );
                        entries[index] = entry;
                    }
                    None => {
                        by_pattern.insert(pattern, entries.len());
                        entries.push(entry);
                    }
                }
            }
        }

        if let Some(static_dir) = &config.static_dir {
            for file in list_files(static_dir)?.into_iter().filter(|f| is_html(f)) {
                let key = relative_key(&file, static_dir);
                let pattern = compile_key(&key)?;
                let view = view_handler(file.clone());

                match by_pattern.get(&pattern) {
                    Some(&index) => {
                        let entry = &mut entries[index];
                        let keep_route_get = config.html_precedence == HtmlPrecedence::Route
                            && entry.module.supports(Method::Get);
                        if keep_route_get {
                            tracing::debug!(pattern = %pattern, view = %file.display(), "Route GET kept over view");
                        } else {
                            if entry.module.supports(Method::Get) {
                                tracing::warn!(
                                    pattern = %pattern,
                                    view = %file.display(),
                                    "View replaces route GET handler"
                                );
                            }
                            entry.module.set(Method::Get, view);
                        }
                    }
                    None => {
                        let mut module = RouteModule::new();
                        module.set(Method::Get, view);
                        tracing::debug!(pattern = %pattern, view = %file.display(), "View compiled");
                        by_pattern.insert(pattern.clone(), entries.len());
                        entries.push(RouteEntry {
                            regex: build_regex(&pattern, &key)?,
                            pattern,
                            module,
                            middleware: Vec::new(),
                            source: file,
                        });
                    }
                }
            }
        }

        for unused in registry.leftovers() {
            tracing::warn!(module = %unused, "Registered module has no file on disk");
        }

        entries.sort_by_key(|e| specificity(&e.pattern));

        tracing::info!(routes = entries.len(), "Route table built");
        Ok(Self { entries })
    }

    /// First entry whose pattern matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.regex.is_match(path))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn noop() -> RouteModule {
        RouteModule::new().get(|_req, _res| Box::pin(async move { Ok(()) }))
    }

    fn tree(files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    fn api_config(dir: &Path) -> RoutesConfig {
        RoutesConfig {
            api_dir: Some(dir.to_path_buf()),
            ..RoutesConfig::default()
        }
    }

    #[test]
    fn test_requires_a_directory() {
        let err = RouteTable::build(&RoutesConfig::default(), Registry::new()).unwrap_err();
        assert!(matches!(err, StartupError::MissingDirectories));
    }

    #[test]
    fn test_literal_beats_dynamic() {
        let dir = tree(&["users/[id].rs", "users/new.rs", "index.rs"]);
        let registry = Registry::new()
            .route("users/[id]", noop())
            .route("users/new", noop())
            .route("index", noop());
        let table = RouteTable::build(&api_config(dir.path()), registry).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.match_path("/users/new").unwrap().pattern(), "^/users/new/?$");
        assert_eq!(
            table.match_path("/users/42").unwrap().pattern(),
            "^/users/(?<id>[^/]+)/?$"
        );
        assert_eq!(table.match_path("/").unwrap().pattern(), "^/?$");
        assert!(table.match_path("/nothing/here").is_none());
    }

    #[test]
    fn test_sorted_by_specificity() {
        let dir = tree(&["[...all].rs", "a.rs", "b/[id].rs", "b/a-rather-long-literal.rs"]);
        let registry = Registry::new()
            .route("[...all]", noop())
            .route("a", noop())
            .route("b/[id]", noop())
            .route("b/a-rather-long-literal", noop());
        let table = RouteTable::build(&api_config(dir.path()), registry).unwrap();
        let keys: Vec<_> = table.entries().iter().map(|e| specificity(e.pattern())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(table.match_path("/a").unwrap().pattern(), "^/a/?$");
        assert_eq!(table.match_path("/b/5").unwrap().pattern(), "^/b/(?<id>[^/]+)/?$");
        let literal = table.match_path("/b/a-rather-long-literal").unwrap();
        assert!(literal.source().ends_with("b/a-rather-long-literal.rs"));
        assert!(table.match_path("/x/y").unwrap().pattern().contains("all"));
    }

    #[test]
    fn test_literal_prefixed_catch_all_wins_over_dynamic_pair() {
        let dir = tree(&["docs/[...slug].rs", "[a]/[b].rs"]);
        let registry = Registry::new()
            .route("docs/[...slug]", noop())
            .route("[a]/[b]", noop());
        let table = RouteTable::build(&api_config(dir.path()), registry).unwrap();
        let hit = table.match_path("/docs/intro").unwrap();
        assert!(hit.source().ends_with("docs/[...slug].rs"));
        let other = table.match_path("/guides/intro").unwrap();
        assert!(other.source().ends_with("[a]/[b].rs"));
    }

    #[test]
    fn test_unregistered_route_is_fatal() {
        let dir = tree(&["index.rs", "orphan.rs"]);
        let registry = Registry::new().route("index", noop());
        let err = RouteTable::build(&api_config(dir.path()), registry).unwrap_err();
        assert!(matches!(err, StartupError::ModuleNotRegistered(k) if k == "orphan"));
    }

    #[test]
    fn test_middleware_attached() {
        let dir = tree(&["(logger).rs", "admin/(auth).rs", "admin/panel.rs", "index.rs"]);
        let hook = || {
            crate::routing::registry::MiddlewareModule::new()
                .after(|_req, _res| Box::pin(async move { Ok(()) }))
        };
        let registry = Registry::new()
            .route("index", noop())
            .route("admin/panel", noop())
            .middleware("(logger)", hook())
            .middleware("admin/(auth)", hook());
        let table = RouteTable::build(&api_config(dir.path()), registry).unwrap();

        let panel = table.match_path("/admin/panel").unwrap();
        let scopes: Vec<_> = panel.middleware().iter().map(|m| m.scope.as_str()).collect();
        assert_eq!(scopes, vec!["logger", "auth"]);

        let index = table.match_path("/").unwrap();
        assert_eq!(index.middleware().len(), 1);
    }

    #[test]
    fn test_collision_last_wins() {
        let dir = tree(&["users.rs", "users/index.rs"]);
        let registry = Registry::new()
            .route("users", noop())
            .route("users/index", noop().post(|_req, _res| Box::pin(async move { Ok(()) })));
        let table = RouteTable::build(&api_config(dir.path()), registry).unwrap();
        assert_eq!(table.len(), 1);
        let entry = table.match_path("/users").unwrap();
        assert!(entry.module().supports(Method::Post));
        assert!(entry.source().ends_with("users/index.rs"));
    }

    #[test]
    fn test_strict_collision_is_fatal() {
        let dir = tree(&["users.rs", "users/index.rs"]);
        let registry = Registry::new()
            .route("users", noop())
            .route("users/index", noop());
        let mut config = api_config(dir.path());
        config.strict_collisions = true;
        let err = RouteTable::build(&config, registry).unwrap_err();
        assert!(matches!(err, StartupError::PatternCollision { .. }));
    }

    #[test]
    fn test_html_views() {
        let api = tree(&["about.rs"]);
        let public = tree(&["about.html", "contact.html", "style.css"]);
        let registry = Registry::new().route(
            "about",
            RouteModule::new().post(|_req, _res| Box::pin(async move { Ok(()) })),
        );
        let config = RoutesConfig {
            api_dir: Some(api.path().to_path_buf()),
            static_dir: Some(public.path().to_path_buf()),
            ..RoutesConfig::default()
        };
        let table = RouteTable::build(&config, registry).unwrap();

        assert_eq!(table.len(), 2);
        let about = table.match_path("/about").unwrap();
        assert!(about.module().supports(Method::Get));
        assert!(about.module().supports(Method::Post));

        let contact = table.match_path("/contact").unwrap();
        assert_eq!(contact.module().methods().collect::<Vec<_>>(), vec![Method::Get]);
        assert!(table.match_path("/style").is_none());
    }

    #[test]
    fn test_html_precedence_route_keeps_get() {
        let api = tree(&["about.rs"]);
        let public = tree(&["about.html"]);
        let route_get = noop();
        let original = route_get.handler(Method::Get).cloned().unwrap();
        let registry = Registry::new().route("about", route_get);
        let config = RoutesConfig {
            api_dir: Some(api.path().to_path_buf()),
            static_dir: Some(public.path().to_path_buf()),
            html_precedence: HtmlPrecedence::Route,
            ..RoutesConfig::default()
        };
        let table = RouteTable::build(&config, registry).unwrap();
        let about = table.match_path("/about").unwrap();
        assert!(std::sync::Arc::ptr_eq(about.handler(Method::Get).unwrap(), &original));
    }

    #[test]
    fn test_missing_api_dir_with_static() {
        let public = tree(&["index.html"]);
        let config = RoutesConfig {
            api_dir: Some(PathBuf::from("/no/such/api")),
            static_dir: Some(public.path().to_path_buf()),
            ..RoutesConfig::default()
        };
        let table = RouteTable::build(&config, Registry::new()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.match_path("/").is_some());
    }
}
