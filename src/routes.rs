//! Route table consumed by the document assembler.
//!
//! Routes are registered explicitly: each entry carries its HTTP method,
//! path pattern, middleware names and a handler association, either the
//! source file and function name of the handler or a ready-made
//! [`Annotation`]. A table can be built in code or loaded from a YAML/JSON
//! manifest:
//!
//! ```yaml
//! routes:
//!   - method: GET
//!     path: /users/:id
//!     handler: { file: src/handlers.rs, function: get_user }
//!     middlewares: [jwt_auth]
//! ```

use crate::annotations::Annotation;
use crate::error::{Error, Result, RouteDiscoveryError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Path prefixes of this tool's own endpoints.
pub const DEFAULT_INTERNAL_PREFIXES: &[&str] = &["/swagger", "/openapi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            "TRACE" => Some(HttpMethod::Trace),
            _ => None,
        }
    }

    /// Whether the method carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a route's handler is documented.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerMeta {
    /// Declaring file and function name; annotations are read from source.
    Source { file: PathBuf, function: String },
    /// Annotation supplied at registration time.
    Annotated(Annotation),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub method: HttpMethod,
    pub pattern: String,
    pub handler: HandlerMeta,
    pub middlewares: Vec<String>,
}

impl RouteEntry {
    pub fn new(method: HttpMethod, pattern: &str) -> Self {
        Self {
            method,
            pattern: pattern.to_string(),
            handler: HandlerMeta::Unknown,
            middlewares: Vec::new(),
        }
    }

    pub fn with_source(mut self, file: impl Into<PathBuf>, function: &str) -> Self {
        self.handler = HandlerMeta::Source {
            file: file.into(),
            function: function.to_string(),
        };
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.handler = HandlerMeta::Annotated(annotation);
        self
    }

    pub fn with_middleware(mut self, name: &str) -> Self {
        self.middlewares.push(name.to_string());
        self
    }
}

/// Supplier of `(method, pattern, handler, middlewares)` tuples.
pub trait RouteSource: Send + Sync {
    /// All registered routes. On failure the error carries the routes
    /// collected so far.
    fn routes(&self) -> std::result::Result<Vec<RouteEntry>, RouteDiscoveryError>;
}

/// In-memory route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteManifest {
    #[serde(default)]
    routes: Vec<ManifestRoute>,
}

#[derive(Debug, Deserialize)]
struct ManifestRoute {
    method: String,
    path: String,
    #[serde(default)]
    handler: Option<ManifestHandler>,
    #[serde(default)]
    annotation: Option<Annotation>,
    #[serde(default)]
    middlewares: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestHandler {
    file: PathBuf,
    function: String,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: RouteEntry) -> &mut Self {
        self.entries.push(entry);
        self
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

    /// Loads a manifest file; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading route manifest: {}", path.display());
        let content = fs::read_to_string(path)?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let table = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        info!("Loaded {} routes from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: RouteManifest = serde_yaml::from_str(content)?;
        Self::from_manifest(manifest)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: RouteManifest = serde_json::from_str(content)?;
        Self::from_manifest(manifest)
    }

    fn from_manifest(manifest: RouteManifest) -> Result<Self> {
        let mut table = RouteTable::new();
        for route in manifest.routes {
            let method = HttpMethod::parse(&route.method).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Unknown HTTP method '{}' for {}",
                    route.method, route.path
                ))
            })?;

            let handler = match (route.handler, route.annotation) {
                (_, Some(annotation)) => HandlerMeta::Annotated(annotation),
                (Some(handler), None) => HandlerMeta::Source {
                    file: handler.file,
                    function: handler.function,
                },
                (None, None) => HandlerMeta::Unknown,
            };

            table.add(RouteEntry {
                method,
                pattern: route.path,
                handler,
                middlewares: route.middlewares,
            });
        }
        Ok(table)
    }
}

impl RouteSource for RouteTable {
    fn routes(&self) -> std::result::Result<Vec<RouteEntry>, RouteDiscoveryError> {
        Ok(self.entries.clone())
    }
}

/// Collects routes for documentation: internal routes are dropped and path
/// patterns normalized to `{name}` placeholders. A failing source is
/// logged and its partial result used.
pub fn discover_routes(source: &dyn RouteSource, internal_prefixes: &[String]) -> Vec<RouteEntry> {
    let routes = match source.routes() {
        Ok(routes) => routes,
        Err(e) => {
            warn!(
                "{}; continuing with {} routes",
                e,
                e.partial_routes.len()
            );
            e.partial_routes
        }
    };

    routes
        .into_iter()
        .filter(|route| {
            let internal = internal_prefixes
                .iter()
                .any(|prefix| route.pattern.contains(prefix.as_str()));
            if internal {
                debug!("Skipping internal route {} {}", route.method, route.pattern);
            }
            !internal
        })
        .map(|mut route| {
            route.pattern = normalize_path(&route.pattern);
            route
        })
        .collect()
}

/// `/users/:id/*rest` -> `/users/{id}/{rest}`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| {
            if let Some(name) = part.strip_prefix(':').or_else(|| part.strip_prefix('*')) {
                if !name.is_empty() {
                    return format!("{{{}}}", name);
                }
            }
            part.to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Placeholder names of a `{name}` pattern, in order.
pub fn path_parameters(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter_map(|part| part.strip_prefix('{')?.strip_suffix('}'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl RouteSource for FailingSource {
        fn routes(&self) -> std::result::Result<Vec<RouteEntry>, RouteDiscoveryError> {
            Err(RouteDiscoveryError {
                operation: "walk".to_string(),
                message: "mounted service unreachable".to_string(),
                partial_routes: vec![RouteEntry::new(HttpMethod::Get, "/health")],
            })
        }
    }

    fn default_prefixes() -> Vec<String> {
        DEFAULT_INTERNAL_PREFIXES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/users/:id"), "/users/{id}");
        assert_eq!(normalize_path("/users/{id}/posts"), "/users/{id}/posts");
        assert_eq!(normalize_path("/files/*path"), "/files/{path}");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_path_parameters() {
        assert_eq!(
            path_parameters("/orgs/{org}/users/{id}"),
            vec!["org".to_string(), "id".to_string()]
        );
        assert!(path_parameters("/health").is_empty());
    }

    #[test]
    fn test_discover_filters_internal_routes() {
        let mut table = RouteTable::new();
        table
            .add(RouteEntry::new(HttpMethod::Get, "/users/:id"))
            .add(RouteEntry::new(HttpMethod::Get, "/swagger/index.html"))
            .add(RouteEntry::new(HttpMethod::Get, "/openapi.json"));

        let routes = discover_routes(&table, &default_prefixes());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pattern, "/users/{id}");
    }

    #[test]
    fn test_discover_keeps_partial_routes_on_failure() {
        let routes = discover_routes(&FailingSource, &default_prefixes());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pattern, "/health");
    }

    #[test]
    fn test_manifest_yaml() {
        let table = RouteTable::from_yaml(
            r#"
routes:
  - method: get
    path: /users/:id
    handler:
      file: src/handlers.rs
      function: get_user
    middlewares: [jwt_auth]
  - method: POST
    path: /users
    annotation:
      summary: Create user
      tags: [users]
  - method: DELETE
    path: /users/:id
"#,
        )
        .unwrap();

        let entries = table.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].method, HttpMethod::Get);
        assert_eq!(
            entries[0].handler,
            HandlerMeta::Source {
                file: PathBuf::from("src/handlers.rs"),
                function: "get_user".to_string()
            }
        );
        assert_eq!(entries[0].middlewares, vec!["jwt_auth".to_string()]);
        match &entries[1].handler {
            HandlerMeta::Annotated(annotation) => {
                assert_eq!(annotation.summary, "Create user");
                assert_eq!(annotation.tags, vec!["users".to_string()]);
            }
            other => panic!("expected annotation, got {:?}", other),
        }
        assert_eq!(entries[2].handler, HandlerMeta::Unknown);
    }

    #[test]
    fn test_manifest_json_and_bad_method() {
        let table = RouteTable::from_json(
            r#"{"routes": [{"method": "PATCH", "path": "/items/{id}"}]}"#,
        )
        .unwrap();
        assert_eq!(table.entries()[0].method, HttpMethod::Patch);

        let err = RouteTable::from_json(r#"{"routes": [{"method": "FETCH", "path": "/x"}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
