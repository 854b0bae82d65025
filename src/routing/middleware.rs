//! Directory-scoped middleware resolution.
//!
//! # Responsibilities
//! - Turn `(scope)` files into scopes anchored at their directory
//! - Flatten, per route, the ordered list of scopes that apply to it
//!
//! # Design Decisions
//! - A scope applies to routes in its directory and every descendant
//! - Order: shallower scopes first, then discovery order within a depth
//! - The same scope name deeper in the tree replaces the shallower one,
//!   keeping the shallower one's position
//! - Resolution happens once at table build; requests never merge scopes

use std::collections::HashSet;

use crate::routing::pattern::is_scope_segment;
use crate::routing::registry::{MiddlewareModule, Registry};
use crate::routing::StartupError;

/// A middleware scope discovered on disk.
#[derive(Debug, Clone)]
struct Scope {
    name: String,
    dir: String,
    depth: usize,
    module: MiddlewareModule,
}

impl Scope {
    fn applies_to(&self, route_dir: &str) -> bool {
        self.dir.is_empty()
            || route_dir == self.dir
            || route_dir
                .strip_prefix(self.dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// A scope's hooks as attached to one route.
#[derive(Debug, Clone)]
pub struct ScopedMiddleware {
    pub scope: String,
    pub module: MiddlewareModule,
}

/// Resolves which scopes apply to which route.
#[derive(Debug, Default)]
pub struct MiddlewareResolver {
    scopes: Vec<Scope>,
}

/// Split a middleware key into (scope directory, scope name).
fn scope_location(key: &str) -> Option<(String, String)> {
    let segments: Vec<&str> = key.split('/').collect();
    let at = segments.iter().position(|s| is_scope_segment(s))?;
    let name = segments[at][1..segments[at].len() - 1].to_string();
    Some((segments[..at].join("/"), name))
}

fn route_dir(key: &str) -> &str {
    key.rfind('/').map_or("", |i| &key[..i])
}

impl MiddlewareResolver {
    /// Load every middleware key from the registry, in discovery order.
    pub fn load(keys: &[String], registry: &mut Registry) -> Result<Self, StartupError> {
        let mut scopes = Vec::new();
        let mut seen = HashSet::new();

        for key in keys {
            let (dir, name) = scope_location(key).ok_or_else(|| StartupError::MalformedMiddleware {
                file: key.clone(),
                reason: "no (scope) segment".to_string(),
            })?;

            let module = registry
                .take_middleware(key)
                .ok_or_else(|| StartupError::ModuleNotRegistered(key.clone()))?;

            if module.is_empty() {
                return Err(StartupError::MalformedMiddleware {
                    file: key.clone(),
                    reason: "defines neither BEFORE nor AFTER".to_string(),
                });
            }

            if !seen.insert((dir.clone(), name.clone())) {
                return Err(StartupError::MalformedMiddleware {
                    file: key.clone(),
                    reason: format!("scope ({}) is already defined in this directory", name),
                });
            }

            let depth = if dir.is_empty() { 0 } else { dir.split('/').count() };
            tracing::debug!(scope = %name, directory = %dir, "Middleware scope loaded");
            scopes.push(Scope { name, dir, depth, module });
        }

        scopes.sort_by_key(|s| s.depth);
        Ok(Self { scopes })
    }

    /// The flattened middleware chain for a route key.
    pub fn resolve(&self, route_key: &str) -> Vec<ScopedMiddleware> {
        let dir = route_dir(route_key);
        let mut chain: Vec<ScopedMiddleware> = Vec::new();

        for scope in self.scopes.iter().filter(|s| s.applies_to(dir)) {
            let resolved = ScopedMiddleware {
                scope: scope.name.clone(),
                module: scope.module.clone(),
            };
            match chain.iter_mut().find(|m| m.scope == scope.name) {
                Some(existing) => *existing = resolved,
                None => chain.push(resolved),
            }
        }

        chain
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
