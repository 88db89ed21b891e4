//! Framework-agnostic HTTP entry points.
//!
//! Each function returns a [`SpecResponse`] that a web framework adapter
//! turns into its own response type. Failures never leak internal detail.

use crate::cache::OpenApiService;
use log::error;
use serde::Serialize;
use std::path::Path;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// File name written by [`generate_file`] when no path is given.
pub const DEFAULT_SPEC_FILE: &str = "openapi.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
}

impl SpecResponse {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_JSON,
            body,
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_TEXT,
            body: body.to_string(),
        }
    }
}

/// `GET` the current document as JSON.
pub fn serve_spec(service: &OpenApiService) -> SpecResponse {
    let document = service.document(false);
    match serde_json::to_string(document.as_ref()) {
        Ok(body) => SpecResponse::json(200, body),
        Err(e) => {
            error!("Failed to encode OpenAPI spec: {}", e);
            SpecResponse::text(500, "Failed to encode OpenAPI spec")
        }
    }
}

/// Drops the cached document.
pub fn invalidate_cache(service: &OpenApiService) -> SpecResponse {
    service.invalidate();
    SpecResponse::json(200, r#"{"message":"cache invalidated"}"#.to_string())
}

/// Regenerates the document and writes it to `path`
/// (default [`DEFAULT_SPEC_FILE`]).
pub fn generate_file(service: &OpenApiService, path: Option<&Path>) -> SpecResponse {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SPEC_FILE));
    match service.write_spec_file(path, true) {
        Ok(()) => {
            let body = serde_json::to_string(&Message {
                message: "openapi.json created",
            })
            .unwrap_or_default();
            SpecResponse::json(201, body)
        }
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            SpecResponse::text(500, "Failed to write file")
        }
    }
}
