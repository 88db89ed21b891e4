//! Doc-comment annotations on handler functions.
//!
//! ```text
//! /// @Summary Create a user
//! /// @Description Registers a new account.
//! /// @Tags users,admin
//! /// @Accept json
//! /// @Produce json
//! /// @Security BearerAuth
//! /// @Param payload body models.CreateUser true "New user"
//! /// @Param dry_run query bool false "Validate only"
//! /// @Success 201 {object} models.User "Created"
//! /// @Failure 409 {object} ProblemDetails "Already exists"
//! async fn create_user() {}
//! ```
//!
//! Lines that do not start with `@` are ignored. Malformed annotation lines
//! are logged and skipped.

use crate::attributes::doc_lines;
use anyhow::{Context, Result};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syn::visit::Visit;

/// Structured annotation block of one handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub accept: Vec<String>,
    pub produce: Vec<String>,
    pub security: Vec<String>,
    pub params: Vec<ParamAnnotation>,
    pub success: Option<ResponseAnnotation>,
    pub failures: Vec<ResponseAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAnnotation {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnnotation {
    pub status: u16,
    /// Type name; `{array}` responses are stored as `Vec<T>`.
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Body => "body",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "header" => Some(ParamLocation::Header),
            "body" => Some(ParamLocation::Body),
            _ => None,
        }
    }
}

/// Produces the annotation record of a handler, if it has one.
pub trait AnnotationSource: Send + Sync {
    fn annotation_for(&self, file: &Path, function: &str) -> Option<Annotation>;
}

/// Reads annotations from `///` comments, caching the result per file.
#[derive(Default)]
pub struct DocCommentParser {
    cache: RwLock<HashMap<PathBuf, Arc<HashMap<String, Annotation>>>>,
}

impl DocCommentParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotation of `function` declared in `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn parse_annotations(&self, file: &Path, function: &str) -> Result<Option<Annotation>> {
        let annotations = self.file_annotations(file)?;
        Ok(annotations.get(function).cloned())
    }

    fn file_annotations(&self, file: &Path) -> Result<Arc<HashMap<String, Annotation>>> {
        if let Some(cached) = self.cache.read().get(file) {
            return Ok(Arc::clone(cached));
        }

        let source = fs::read_to_string(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        let syntax_tree = syn::parse_file(&source)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", file.display()))?;

        let mut collector = AnnotationCollector::default();
        collector.visit_file(&syntax_tree);
        debug!(
            "Found {} annotated functions in {}",
            collector.annotations.len(),
            file.display()
        );

        let annotations = Arc::new(collector.annotations);
        self.cache
            .write()
            .insert(file.to_path_buf(), Arc::clone(&annotations));
        Ok(annotations)
    }
}

impl AnnotationSource for DocCommentParser {
    fn annotation_for(&self, file: &Path, function: &str) -> Option<Annotation> {
        match self.parse_annotations(file, function) {
            Ok(annotation) => annotation,
            Err(e) => {
                warn!("Annotation parse error for {}: {:#}", function, e);
                None
            }
        }
    }
}

#[derive(Default)]
struct AnnotationCollector {
    annotations: HashMap<String, Annotation>,
}

impl AnnotationCollector {
    fn record(&mut self, name: String, attrs: &[syn::Attribute]) {
        if let Some(annotation) = parse_annotation_lines(&doc_lines(attrs)) {
            self.annotations.entry(name).or_insert(annotation);
        }
    }
}

impl<'ast> Visit<'ast> for AnnotationCollector {
    fn visit_item_fn(&mut self, item: &'ast syn::ItemFn) {
        self.record(item.sig.ident.to_string(), &item.attrs);
    }

    fn visit_impl_item_fn(&mut self, item: &'ast syn::ImplItemFn) {
        self.record(item.sig.ident.to_string(), &item.attrs);
    }
}

/// Parses the doc-comment lines of one function. `None` when no line is
/// an annotation.
pub fn parse_annotation_lines(lines: &[String]) -> Option<Annotation> {
    let mut annotation = Annotation::default();
    let mut found = false;

    for line in lines {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('@') else {
            continue;
        };
        found = true;

        let (keyword, value) = match rest.split_once(char::is_whitespace) {
            Some((keyword, value)) => (keyword, value.trim()),
            None => (rest, ""),
        };

        match keyword {
            "Summary" => annotation.summary = value.to_string(),
            "Description" => annotation.description = value.to_string(),
            "Tags" => annotation.tags.extend(split_list(value)),
            "Accept" => annotation.accept.extend(split_list(value)),
            "Produce" => annotation.produce.extend(split_list(value)),
            "Security" => annotation.security.extend(split_list(value)),
            "Param" => match parse_param_line(value) {
                Some(param) => annotation.params.push(param),
                None => warn!("Malformed @Param annotation: {}", line),
            },
            "Success" => match parse_response_line(value) {
                Some(response) => annotation.success = Some(response),
                None => warn!("Malformed @Success annotation: {}", line),
            },
            "Failure" => match parse_response_line(value) {
                Some(response) => annotation.failures.push(response),
                None => warn!("Malformed @Failure annotation: {}", line),
            },
            other => debug!("Ignoring unknown annotation @{}", other),
        }
    }

    found.then_some(annotation)
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Text of the first double-quoted section, or the whole remainder.
fn quoted(rest: &str) -> String {
    let rest = rest.trim();
    match rest.strip_prefix('"') {
        Some(inner) => match inner.find('"') {
            Some(end) => inner[..end].to_string(),
            None => inner.to_string(),
        },
        None => rest.to_string(),
    }
}

/// Splits off the next whitespace-delimited column. Runs of spaces between
/// columns count as one separator.
fn next_column(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((&input[..end], &input[end..]))
}

/// `name in type required "description"`
pub fn parse_param_line(value: &str) -> Option<ParamAnnotation> {
    let (name, rest) = next_column(value)?;
    let (location, rest) = next_column(rest)?;
    let location = ParamLocation::parse(location)?;
    let (type_name, rest) = next_column(rest)?;

    let (required, rest) = match next_column(rest) {
        Some((flag, tail)) if !flag.starts_with('"') => (flag == "true", tail),
        _ => (false, rest),
    };

    Some(ParamAnnotation {
        name: name.to_string(),
        location,
        type_name: type_name.to_string(),
        required,
        description: quoted(rest),
    })
}

/// `code {object|array} Type "description"`
pub fn parse_response_line(value: &str) -> Option<ResponseAnnotation> {
    let (status, rest) = next_column(value)?;
    let status: u16 = status.parse().ok()?;

    let mut data_type = String::new();
    let mut description = quoted(rest);
    if let Some((kind, tail)) = next_column(rest) {
        if kind.starts_with('{') {
            let (type_name, tail) = next_column(tail).unwrap_or(("", tail));
            data_type = if kind == "{array}" && !type_name.is_empty() {
                format!("Vec<{}>", type_name)
            } else {
                type_name.to_string()
            };
            description = quoted(tail);
        }
    }

    Some(ResponseAnnotation {
        status,
        data_type,
        description,
    })
}
