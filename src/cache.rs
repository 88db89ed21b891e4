//! Long-lived generation service.
//!
//! [`OpenApiService`] is constructed once and shared by reference (or
//! `Arc`) with every caller. It owns the declaration index, built lazily
//! on first use, and the last generated document. Regeneration runs
//! outside the cache lock; only the swap of the finished document is
//! done under the write lock.

use crate::annotations::{AnnotationSource, DocCommentParser};
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::openapi_builder::{assemble_document, OpenApiDocument, PathItem};
use crate::routes::{discover_routes, RouteSource};
use crate::serializer::{serialize_json, write_to_file};
use crate::type_index::DeclarationIndex;
use log::{debug, error, info};
use std::collections::BTreeMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Default)]
struct SpecCache {
    document: Option<Arc<OpenApiDocument>>,
    valid: bool,
    /// Bumped by every invalidation. A document built across a bump is
    /// served to its caller but not marked valid.
    generation: u64,
}

pub struct OpenApiService {
    project_root: PathBuf,
    config: GeneratorConfig,
    routes: Box<dyn RouteSource>,
    annotations: Box<dyn AnnotationSource>,
    webhooks: BTreeMap<String, PathItem>,
    index: OnceLock<Arc<DeclarationIndex>>,
    cache: RwLock<SpecCache>,
}

impl OpenApiService {
    /// Service reading declarations and annotations from the Rust sources
    /// below `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        routes: impl RouteSource + 'static,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            config,
            routes: Box::new(routes),
            annotations: Box::new(DocCommentParser::new()),
            webhooks: BTreeMap::new(),
            index: OnceLock::new(),
            cache: RwLock::new(SpecCache::default()),
        }
    }

    pub fn with_annotation_source(mut self, annotations: impl AnnotationSource + 'static) -> Self {
        self.annotations = Box::new(annotations);
        self
    }

    /// Documents an outgoing webhook in every generated document.
    pub fn with_webhook(mut self, name: impl Into<String>, item: PathItem) -> Self {
        self.webhooks.insert(name.into(), item);
        self
    }

    /// Uses a prebuilt index instead of scanning the project.
    pub fn with_index(mut self, index: DeclarationIndex) -> Self {
        self.index = OnceLock::from(Arc::new(index));
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The declaration index, built on first call. A project that cannot
    /// be scanned yields an empty index.
    pub fn index(&self) -> Arc<DeclarationIndex> {
        let index = self.index.get_or_init(|| {
            match DeclarationIndex::build(&self.project_root) {
                Ok(index) => Arc::new(index),
                Err(e) => {
                    error!(
                        "Failed to index {}: {:#}; type lookups will fall back",
                        self.project_root.display(),
                        e
                    );
                    Arc::new(DeclarationIndex::empty())
                }
            }
        });
        Arc::clone(index)
    }

    /// The cached document, regenerated when the cache is invalid or
    /// `force_refresh` is set.
    pub fn document(&self, force_refresh: bool) -> Arc<OpenApiDocument> {
        let started = {
            let cache = self.cache.read();
            if !force_refresh && cache.valid {
                if let Some(document) = &cache.document {
                    debug!("Serving cached OpenAPI document");
                    return Arc::clone(document);
                }
            }
            cache.generation
        };

        let document = Arc::new(self.generate());

        let mut cache = self.cache.write();
        cache.document = Some(Arc::clone(&document));
        cache.valid = cache.generation == started;
        if !cache.valid {
            debug!("Cache invalidated during generation; next request regenerates");
        }
        document
    }

    /// Marks the cached document stale; the next [`document`](Self::document)
    /// call regenerates it. A generation already in progress does not
    /// revalidate the cache.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write();
        cache.valid = false;
        cache.generation += 1;
        info!("OpenAPI document cache invalidated");
    }

    pub fn is_cached(&self) -> bool {
        let cache = self.cache.read();
        cache.valid && cache.document.is_some()
    }

    /// Writes the document as pretty-printed JSON to `path`.
    ///
    /// # Errors
    ///
    /// Filesystem errors are returned unchanged; no partial file is left.
    pub fn write_spec_file(&self, path: &Path, force_refresh: bool) -> Result<()> {
        let document = self.document(force_refresh);
        let content = serialize_json(&document)?;
        write_to_file(&content, path)?;
        info!("Wrote OpenAPI document to {}", path.display());
        Ok(())
    }

    fn generate(&self) -> OpenApiDocument {
        info!("Generating OpenAPI document");
        let routes = discover_routes(self.routes.as_ref(), &self.config.internal_prefixes);
        debug!("Documenting {} routes", routes.len());

        let index = self.index();
        let mut document = assemble_document(
            &routes,
            self.annotations.as_ref(),
            index.as_ref(),
            Some(&self.project_root),
            &self.config,
        );
        for (name, item) in &self.webhooks {
            document.add_webhook(name, item.clone());
        }
        document
    }
}
