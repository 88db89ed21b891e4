use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Scope name of a crate root file (`lib.rs`, `main.rs`).
pub const ROOT_SCOPE: &str = "crate";

/// Parser turning Rust source files into `syn` syntax trees.
///
/// Each parsed file is tagged with the module scope its items are declared
/// in, derived from the file path (see [`module_scope`]).
///
/// # Example
///
/// ```no_run
/// use openapi_from_routes::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/models.rs")).unwrap();
/// assert_eq!(parsed.scope, "models");
/// ```
pub struct AstParser;

/// A successfully parsed Rust file.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module scope of the file's top-level items
    pub scope: String,
    /// The parsed syntax tree
    pub syntax_tree: syn::File,
}

/// Module name a file's top-level items live in.
///
/// `models/user.rs` -> `user`, `models/mod.rs` -> `models`,
/// `lib.rs` and `main.rs` -> `crate`.
pub fn module_scope(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    match stem.as_str() {
        "lib" | "main" | "" => ROOT_SCOPE.to_string(),
        "mod" => path
            .parent()
            .and_then(|parent| parent.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| ROOT_SCOPE.to_string()),
        _ => stem,
    }
}

impl AstParser {
    /// Parses a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid Rust syntax.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        Self::parse_source(path, &content)
    }

    /// Parses already-loaded source text as if it were read from `path`.
    pub fn parse_source(path: &Path, content: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            scope: module_scope(path),
            syntax_tree,
        })
    }

    /// Parses several files, continuing past failures.
    ///
    /// Failures are logged and returned in place so the caller can decide
    /// whether a partial result is acceptable.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).map_err(|e| {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
