//! Serialization of OpenAPI documents to YAML or JSON, and file export.

use crate::error::Result;
use crate::openapi_builder::OpenApiDocument;
use log::debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serializes an OpenAPI document to YAML format.
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    Ok(serde_yaml::to_string(doc)?)
}

/// Serializes an OpenAPI document to pretty-printed JSON.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Writes string content to a file, replacing it atomically.
///
/// Parent directories are created when missing. The content is written to
/// a temporary file next to `path` and renamed over it, so on error the
/// previous file (if any) is left untouched.
///
/// # Errors
///
/// Any filesystem error is returned as [`crate::error::Error::IoError`].
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
