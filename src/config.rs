//! Generator configuration.
//!
//! Values come from an optional YAML or JSON file; every field has a default
//! so an empty file (or no file) yields a usable configuration.

use crate::routes::DEFAULT_INTERNAL_PREFIXES;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub terms_of_service: Option<String>,
    /// Base URL published in `servers`.
    pub server: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    /// Drop members marked `#[serde(skip)]` from record schemas.
    pub exclude_skipped_members: bool,
    /// Routes whose pattern contains one of these are left undocumented.
    pub internal_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            description: Some("API documentation generated from route introspection".to_string()),
            version: "1.0.0".to_string(),
            terms_of_service: None,
            server: None,
            contact: None,
            license: None,
            exclude_skipped_members: false,
            internal_prefixes: DEFAULT_INTERNAL_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

impl GeneratorConfig {
    /// Reads a config file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?
        } else if content.trim().is_empty() {
            GeneratorConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?
        };
        Ok(config)
    }
}
