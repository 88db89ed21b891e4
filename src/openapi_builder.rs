use crate::annotations::{Annotation, AnnotationSource, ParamLocation};
use crate::config::{Contact, GeneratorConfig, License};
use crate::routes::{path_parameters, HandlerMeta, HttpMethod, RouteEntry};
use crate::schema::{Example, Schema, SchemaType};
use crate::schema_generator::{parameter_schema, ResolverOptions, SchemaGenerator};
use crate::type_index::TypeDescriptorProvider;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const OPENAPI_VERSION: &str = "3.1.0";
pub const JSON_SCHEMA_DIALECT: &str = "https://spec.openapis.org/oas/3.1/dialect/base";
pub const PROBLEM_DETAILS: &str = "ProblemDetails";
pub const BEARER_AUTH: &str = "BearerAuth";

const JSON: &str = "application/json";
const PROBLEM_JSON: &str = "application/problem+json";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    servers: Vec<Server>,
    /// URL path -> PathItem
    paths: BTreeMap<String, PathItem>,
    tags: BTreeSet<String>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

/// Security requirement: scheme name -> scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// OpenAPI Operation object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// path, query or header
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, Example>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Link>,
}

/// Response header, e.g. `X-Rate-Limit-Remaining`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, Example>,
}

/// Design-time relation from a response to another operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "operationRef", skip_serializing_if = "Option::is_none")]
    pub operation_ref: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameter name -> runtime expression or constant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MediaType {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            examples: BTreeMap::new(),
        }
    }

    pub fn add_example(&mut self, name: impl Into<String>, example: Example) -> &mut Self {
        self.examples.insert(name.into(), example);
        self
    }
}

impl Response {
    pub fn add_header(&mut self, name: impl Into<String>, header: Header) -> &mut Self {
        self.headers.insert(name.into(), header);
        self
    }

    pub fn add_link(&mut self, name: impl Into<String>, link: Link) -> &mut Self {
        self.links.insert(name.into(), link);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub scheme: String,
    #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Named schemas keyed by qualified type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<BTreeMap<String, Schema>>,
    #[serde(rename = "securitySchemes", skip_serializing_if = "Option::is_none")]
    pub security_schemes: Option<BTreeMap<String, SecurityScheme>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    #[serde(rename = "jsonSchemaDialect", skip_serializing_if = "Option::is_none")]
    pub json_schema_dialect: Option<String>,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    /// Requests the API sends to its consumers, keyed by event name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub webhooks: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl OpenApiDocument {
    /// Adds or replaces the webhook registered under `name`.
    pub fn add_webhook(&mut self, name: impl Into<String>, item: PathItem) -> &mut Self {
        let name = name.into();
        debug!("Adding webhook: {}", name);
        self.webhooks.insert(name, item);
        self
    }
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }

    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Trace => &mut self.trace,
        }
    }

    /// All present operations.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
            &self.trace,
        ]
        .into_iter()
        .filter_map(|op| op.as_ref())
    }
}

impl OpenApiBuilder {
    /// Builder with the default configuration's info.
    pub fn new() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        debug!("Initializing OpenApiBuilder");
        let servers = config
            .server
            .iter()
            .map(|url| Server {
                url: url.clone(),
                description: Some("API Server".to_string()),
            })
            .collect();

        Self {
            info: Info {
                title: config.title.clone(),
                version: config.version.clone(),
                description: config.description.clone(),
                terms_of_service: config.terms_of_service.clone(),
                contact: config.contact.clone(),
                license: config.license.clone(),
            },
            servers,
            paths: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Adds one route. The pattern must already use `{name}` placeholders.
    pub fn add_route(
        &mut self,
        route: &RouteEntry,
        annotation: Option<&Annotation>,
        schema_gen: &mut SchemaGenerator,
    ) {
        debug!("Adding route: {} {}", route.method, route.pattern);

        let mut parameters: Vec<Parameter> = path_parameters(&route.pattern)
            .into_iter()
            .map(|name| Parameter {
                name,
                location: "path".to_string(),
                required: true,
                schema: Schema::of(SchemaType::String),
                description: None,
            })
            .collect();

        let mut tags = Vec::new();
        let mut summary = None;
        let mut description = None;

        if let Some(annotation) = annotation {
            summary = non_empty(&annotation.summary);
            description = non_empty(&annotation.description);
            tags = annotation.tags.clone();

            for param in &annotation.params {
                if param.location == ParamLocation::Body {
                    continue;
                }
                let schema = parameter_schema(&param.type_name);
                let param_description = non_empty(&param.description);

                let existing = parameters
                    .iter_mut()
                    .find(|p| p.name == param.name && p.location == param.location.as_str());
                match existing {
                    Some(existing) => {
                        existing.schema = schema;
                        existing.description = param_description;
                    }
                    None => parameters.push(Parameter {
                        name: param.name.clone(),
                        location: param.location.as_str().to_string(),
                        required: param.required || param.location == ParamLocation::Path,
                        schema,
                        description: param_description,
                    }),
                }
            }
        }

        if tags.is_empty() {
            tags.push(default_tag(&route.pattern));
        }
        self.tags.extend(tags.iter().cloned());

        let request_body = if route.method.has_body() {
            Some(Self::request_body(annotation, schema_gen))
        } else {
            None
        };

        let operation = Operation {
            tags,
            summary,
            description,
            operation_id: Some(operation_id(route.method, &route.pattern)),
            parameters: if parameters.is_empty() {
                None
            } else {
                Some(parameters)
            },
            request_body,
            responses: Self::responses(annotation, schema_gen),
            security: security_requirements(annotation, &route.middlewares),
        };

        let path_item = self.paths.entry(route.pattern.clone()).or_default();
        *path_item.slot(route.method) = Some(operation);
    }

    fn request_body(annotation: Option<&Annotation>, schema_gen: &mut SchemaGenerator) -> RequestBody {
        let body_param = annotation.and_then(|a| {
            a.params
                .iter()
                .find(|p| p.location == ParamLocation::Body)
        });

        let (schema, description) = match body_param {
            Some(param) => (
                schema_gen.resolve_any(&param.type_name),
                non_empty(&param.description).unwrap_or_else(|| "Request body".to_string()),
            ),
            None => (Schema::object(), "Request body".to_string()),
        };

        let content_type = annotation
            .and_then(|a| a.accept.first())
            .map(|short| mime_type(short))
            .unwrap_or_else(|| JSON.to_string());

        RequestBody {
            description: Some(description),
            required: true,
            content: single_content(content_type, schema),
        }
    }

    fn responses(
        annotation: Option<&Annotation>,
        schema_gen: &mut SchemaGenerator,
    ) -> BTreeMap<String, Response> {
        let mut responses = BTreeMap::new();

        match annotation.and_then(|a| a.success.as_ref().map(|s| (a, s))) {
            Some((annotation, success)) => {
                let schema = if success.data_type.trim().is_empty() {
                    Schema::object()
                } else {
                    schema_gen.resolve_any(&success.data_type)
                };
                let content_type = annotation
                    .produce
                    .first()
                    .map(|short| mime_type(short))
                    .unwrap_or_else(|| JSON.to_string());
                responses.insert(
                    success.status.to_string(),
                    Response {
                        description: non_empty(&success.description)
                            .unwrap_or_else(|| "Successful response".to_string()),
                        content: Some(single_content(content_type, schema)),
                        ..Default::default()
                    },
                );
            }
            None => {
                responses.insert(
                    "200".to_string(),
                    Response {
                        description: "Successful response".to_string(),
                        content: Some(single_content(JSON.to_string(), Schema::object())),
                        ..Default::default()
                    },
                );
            }
        }

        if let Some(annotation) = annotation {
            for failure in &annotation.failures {
                responses.insert(
                    failure.status.to_string(),
                    problem_response(
                        non_empty(&failure.description)
                            .unwrap_or_else(|| status_reason(failure.status).to_string()),
                    ),
                );
            }
        }

        for status in [400u16, 401, 500] {
            responses
                .entry(status.to_string())
                .or_insert_with(|| problem_response(status_reason(status).to_string()));
        }

        responses
    }

    /// Build the final OpenAPI document
    pub fn build(self, schema_gen: SchemaGenerator) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let mut schemas = schema_gen.into_schemas();
        schemas.insert(PROBLEM_DETAILS.to_string(), problem_details_schema());

        let mut security_schemes = BTreeMap::new();
        security_schemes.insert(
            BEARER_AUTH.to_string(),
            SecurityScheme {
                scheme_type: "http".to_string(),
                scheme: "bearer".to_string(),
                bearer_format: Some("JWT".to_string()),
                description: Some("JWT token authentication".to_string()),
            },
        );

        let tags = self
            .tags
            .into_iter()
            .map(|name| Tag {
                description: Some(format!("{} related operations", capitalize(&name))),
                name,
            })
            .collect();

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            json_schema_dialect: Some(JSON_SCHEMA_DIALECT.to_string()),
            info: self.info,
            servers: self.servers,
            paths: self.paths,
            webhooks: BTreeMap::new(),
            components: Some(Components {
                schemas: Some(schemas),
                security_schemes: Some(security_schemes),
            }),
            tags,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Annotation of a route: the registered one, or the one parsed from the
/// handler's source. Relative handler files are taken from `project_root`.
pub fn route_annotation(
    route: &RouteEntry,
    source: &dyn AnnotationSource,
    project_root: Option<&Path>,
) -> Option<Annotation> {
    match &route.handler {
        HandlerMeta::Annotated(annotation) => Some(annotation.clone()),
        HandlerMeta::Source { file, function } => {
            let file = match project_root {
                Some(root) if file.is_relative() => root.join(file),
                _ => file.clone(),
            };
            source.annotation_for(&file, function)
        }
        HandlerMeta::Unknown => None,
    }
}

/// Runs one full generation over already-discovered routes.
pub fn assemble_document(
    routes: &[RouteEntry],
    annotations: &dyn AnnotationSource,
    provider: &dyn TypeDescriptorProvider,
    project_root: Option<&Path>,
    config: &GeneratorConfig,
) -> OpenApiDocument {
    let options = ResolverOptions {
        exclude_skipped_members: config.exclude_skipped_members,
    };
    let mut schema_gen = SchemaGenerator::with_options(provider, options);
    let mut builder = OpenApiBuilder::from_config(config);

    for route in routes {
        let annotation = route_annotation(route, annotations, project_root);
        builder.add_route(route, annotation.as_ref(), &mut schema_gen);
    }

    let document = builder.build(schema_gen);
    info!(
        "Assembled document: {} paths, {} schemas",
        document.paths.len(),
        document
            .components
            .as_ref()
            .and_then(|c| c.schemas.as_ref())
            .map_or(0, |s| s.len())
    );
    document
}

/// `GET /users/{id}/posts` -> `getUsersPosts`. Each literal segment is
/// capitalized as a whole, so `/user-profiles` gives `User-profiles`.
pub fn operation_id(method: HttpMethod, pattern: &str) -> String {
    let mut id = method.as_str().to_lowercase();
    for part in pattern.split('/') {
        if !part.is_empty() && !part.contains('{') {
            id.push_str(&capitalize(part));
        }
    }
    id
}

/// First literal path segment other than `api` and `v1`.
pub fn default_tag(pattern: &str) -> String {
    pattern
        .split('/')
        .find(|part| !part.is_empty() && !part.starts_with('{') && *part != "api" && *part != "v1")
        .unwrap_or("default")
        .to_string()
}

/// Full media type for an `@Accept`/`@Produce` shorthand.
pub fn mime_type(short: &str) -> String {
    match short.trim() {
        "json" => JSON.to_string(),
        "xml" => "application/xml".to_string(),
        "plain" => "text/plain".to_string(),
        "html" => "text/html".to_string(),
        "mpfd" => "multipart/form-data".to_string(),
        "x-www-form-urlencoded" => "application/x-www-form-urlencoded".to_string(),
        "octet-stream" => "application/octet-stream".to_string(),
        full if full.contains('/') => full.to_string(),
        other => format!("application/{}", other),
    }
}

fn security_requirements(
    annotation: Option<&Annotation>,
    middlewares: &[String],
) -> Option<Vec<SecurityRequirement>> {
    if let Some(annotation) = annotation {
        if !annotation.security.is_empty() {
            return Some(
                annotation
                    .security
                    .iter()
                    .map(|name| BTreeMap::from([(name.clone(), Vec::new())]))
                    .collect(),
            );
        }
    }

    let authenticated = middlewares
        .iter()
        .any(|m| m.contains("jwt") || m.contains("JWT") || m.contains("auth"));
    if authenticated {
        Some(vec![BTreeMap::from([(BEARER_AUTH.to_string(), Vec::new())])])
    } else {
        None
    }
}

fn single_content(content_type: String, schema: Schema) -> BTreeMap<String, MediaType> {
    BTreeMap::from([(content_type, MediaType::new(schema))])
}

fn problem_response(description: String) -> Response {
    Response {
        description,
        content: Some(single_content(
            PROBLEM_JSON.to_string(),
            Schema::reference(PROBLEM_DETAILS),
        )),
        ..Default::default()
    }
}

/// RFC 7807 problem details.
fn problem_details_schema() -> Schema {
    let mut schema = Schema::object();
    for field in ["type", "title", "detail", "instance"] {
        schema
            .properties
            .insert(field.to_string(), Schema::of(SchemaType::String));
    }
    schema
        .properties
        .insert("status".to_string(), Schema::of(SchemaType::Integer));
    schema.required = vec!["type".to_string(), "title".to_string(), "status".to_string()];
    schema
}

fn status_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error response",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{ParamAnnotation, ResponseAnnotation};
    use crate::schema::COMPONENTS_PREFIX;
    use crate::type_index::{DeclarationIndex, DeclarationIndexBuilder};
    use pretty_assertions::assert_eq;

    fn index_from_code(code: &str) -> DeclarationIndex {
        let mut builder = DeclarationIndexBuilder::new();
        builder.add_source(Path::new("src/models.rs"), code).unwrap();
        builder.build()
    }

    fn problem_ref() -> Schema {
        Schema::reference(PROBLEM_DETAILS)
    }

    #[test]
    fn test_new_builder() {
        let builder = OpenApiBuilder::new();

        assert_eq!(builder.info.title, "Generated API");
        assert_eq!(builder.info.version, "1.0.0");
        assert!(builder.servers.is_empty());
        assert!(builder.paths.is_empty());
    }

    #[test]
    fn test_from_config_servers_and_info() {
        let config = GeneratorConfig {
            title: "Shop".to_string(),
            version: "3.0.0".to_string(),
            server: Some("https://shop.example.com".to_string()),
            ..Default::default()
        };
        let builder = OpenApiBuilder::from_config(&config);

        assert_eq!(builder.info.title, "Shop");
        assert_eq!(builder.servers.len(), 1);
        assert_eq!(builder.servers[0].url, "https://shop.example.com");
        assert_eq!(builder.servers[0].description.as_deref(), Some("API Server"));
    }

    #[test]
    fn test_unannotated_get_with_path_parameter() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();

        builder.add_route(&RouteEntry::new(HttpMethod::Get, "/items/{id}"), None, &mut schema_gen);

        let operation = builder.paths["/items/{id}"].get.as_ref().unwrap();
        let parameters = operation.parameters.as_ref().unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters[0].name, "id");
        assert_eq!(parameters[0].location, "path");
        assert!(parameters[0].required);
        assert_eq!(parameters[0].schema, Schema::of(SchemaType::String));

        assert!(operation.request_body.is_none());
        let keys: Vec<&str> = operation.responses.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["200", "400", "401", "500"]);

        let ok = &operation.responses["200"];
        assert_eq!(ok.description, "Successful response");
        assert_eq!(ok.content.as_ref().unwrap()[JSON].schema, Schema::object());

        assert_eq!(operation.responses["401"].description, "Unauthorized");
        assert_eq!(
            operation.responses["500"].content.as_ref().unwrap()[PROBLEM_JSON].schema,
            problem_ref()
        );
        assert_eq!(operation.operation_id.as_deref(), Some("getItems"));
        assert!(operation.summary.is_none());
        assert!(operation.description.is_none());
        assert_eq!(operation.tags, vec!["items".to_string()]);
        assert!(operation.security.is_none());
    }

    #[test]
    fn test_annotated_post_route() {
        let index = index_from_code(
            r#"
            pub struct CreateUser { pub name: String, pub email: Option<String> }
            pub struct User { pub id: u64, pub name: String }
            "#,
        );
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();

        let annotation = Annotation {
            summary: "Create user".to_string(),
            tags: vec!["accounts".to_string()],
            security: vec!["ApiKey".to_string()],
            params: vec![
                ParamAnnotation {
                    name: "body".to_string(),
                    location: ParamLocation::Body,
                    type_name: "CreateUser".to_string(),
                    required: true,
                    description: "New user".to_string(),
                },
                ParamAnnotation {
                    name: "dry_run".to_string(),
                    location: ParamLocation::Query,
                    type_name: "boolean".to_string(),
                    required: false,
                    description: String::new(),
                },
            ],
            success: Some(ResponseAnnotation {
                status: 201,
                data_type: "User".to_string(),
                description: "Created".to_string(),
            }),
            failures: vec![ResponseAnnotation {
                status: 409,
                data_type: "ProblemDetails".to_string(),
                description: String::new(),
            }],
            ..Default::default()
        };

        builder.add_route(
            &RouteEntry::new(HttpMethod::Post, "/api/v1/users"),
            Some(&annotation),
            &mut schema_gen,
        );

        let operation = builder.paths["/api/v1/users"].post.as_ref().unwrap();
        assert_eq!(operation.summary.as_deref(), Some("Create user"));
        assert_eq!(operation.tags, vec!["accounts".to_string()]);
        assert_eq!(operation.operation_id.as_deref(), Some("postApiV1Users"));

        let parameters = operation.parameters.as_ref().unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters[0].location, "query");
        assert_eq!(parameters[0].schema, Schema::of(SchemaType::Boolean));

        let body = operation.request_body.as_ref().unwrap();
        assert_eq!(body.description.as_deref(), Some("New user"));
        assert_eq!(
            body.content[JSON].schema.reference.as_deref(),
            Some(format!("{}models.CreateUser", COMPONENTS_PREFIX).as_str())
        );

        let created = &operation.responses["201"];
        assert_eq!(created.description, "Created");
        assert_eq!(operation.responses["409"].description, "Conflict");
        assert!(operation.responses.contains_key("400"));
        assert!(!operation.responses.contains_key("200"));

        let security = operation.security.as_ref().unwrap();
        assert!(security[0].contains_key("ApiKey"));

        let document = builder.build(schema_gen);
        let schemas = document.components.unwrap().schemas.unwrap();
        assert!(schemas.contains_key("models.CreateUser"));
        assert!(schemas.contains_key("models.User"));
        assert!(schemas.contains_key(PROBLEM_DETAILS));
    }

    #[test]
    fn test_body_methods_get_default_body() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();

        for method in [HttpMethod::Put, HttpMethod::Patch, HttpMethod::Delete] {
            builder.add_route(&RouteEntry::new(method, "/resource"), None, &mut schema_gen);
        }

        let item = &builder.paths["/resource"];
        let put_body = item.put.as_ref().unwrap().request_body.as_ref().unwrap();
        assert_eq!(put_body.content[JSON].schema, Schema::object());
        assert!(item.patch.as_ref().unwrap().request_body.is_some());
        assert!(item.delete.as_ref().unwrap().request_body.is_none());
    }

    #[test]
    fn test_jwt_middleware_adds_bearer_auth() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();

        let route = RouteEntry::new(HttpMethod::Get, "/me").with_middleware("require_auth");
        builder.add_route(&route, None, &mut schema_gen);

        let operation = builder.paths["/me"].get.as_ref().unwrap();
        let security = operation.security.as_ref().unwrap();
        assert_eq!(security.len(), 1);
        assert!(security[0].contains_key(BEARER_AUTH));
    }

    #[test]
    fn test_accept_and_produce_content_types() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();

        let annotation = Annotation {
            accept: vec!["xml".to_string()],
            produce: vec!["plain".to_string()],
            success: Some(ResponseAnnotation {
                status: 200,
                data_type: "String".to_string(),
                description: String::new(),
            }),
            ..Default::default()
        };
        builder.add_route(
            &RouteEntry::new(HttpMethod::Post, "/echo"),
            Some(&annotation),
            &mut schema_gen,
        );

        let operation = builder.paths["/echo"].post.as_ref().unwrap();
        assert!(operation
            .request_body
            .as_ref()
            .unwrap()
            .content
            .contains_key("application/xml"));
        let ok = operation.responses["200"].content.as_ref().unwrap();
        assert_eq!(ok["text/plain"].schema, Schema::of(SchemaType::String));
    }

    #[test]
    fn test_build_document_structure() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();
        builder.add_route(&RouteEntry::new(HttpMethod::Get, "/users"), None, &mut schema_gen);
        builder.add_route(&RouteEntry::new(HttpMethod::Get, "/orders/{id}"), None, &mut schema_gen);

        let document = builder.build(schema_gen);

        assert_eq!(document.openapi, "3.1.0");
        assert_eq!(document.json_schema_dialect.as_deref(), Some(JSON_SCHEMA_DIALECT));
        let tag_names: Vec<&str> = document.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["orders", "users"]);
        assert_eq!(
            document.tags[1].description.as_deref(),
            Some("Users related operations")
        );

        let components = document.components.unwrap();
        let problem = &components.schemas.unwrap()[PROBLEM_DETAILS];
        assert_eq!(problem.required, vec!["type", "title", "status"]);
        let bearer = &components.security_schemes.unwrap()[BEARER_AUTH];
        assert_eq!(bearer.scheme, "bearer");
        assert_eq!(bearer.bearer_format.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_operation_id_and_default_tag() {
        assert_eq!(operation_id(HttpMethod::Get, "/users/{id}/posts"), "getUsersPosts");
        assert_eq!(operation_id(HttpMethod::Delete, "/user-profiles/{id}"), "deleteUser-profiles");
        assert_eq!(operation_id(HttpMethod::Put, "/files/{name}.json"), "putFiles");
        assert_eq!(default_tag("/api/v1/orders/{id}"), "orders");
        assert_eq!(default_tag("/{id}"), "default");
        assert_eq!(default_tag("/"), "default");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("json"), "application/json");
        assert_eq!(mime_type("mpfd"), "multipart/form-data");
        assert_eq!(mime_type("image/png"), "image/png");
        assert_eq!(mime_type("yaml"), "application/yaml");
    }

    #[test]
    fn test_route_annotation_prefers_registered() {
        struct NoSource;
        impl AnnotationSource for NoSource {
            fn annotation_for(&self, _file: &Path, _function: &str) -> Option<Annotation> {
                panic!("source should not be consulted")
            }
        }

        let annotation = Annotation {
            summary: "Ping".to_string(),
            ..Default::default()
        };
        let route = RouteEntry::new(HttpMethod::Get, "/ping").with_annotation(annotation.clone());
        assert_eq!(route_annotation(&route, &NoSource, None), Some(annotation));
        assert_eq!(
            route_annotation(&RouteEntry::new(HttpMethod::Get, "/x"), &NoSource, None),
            None
        );
    }

    #[test]
    fn test_webhooks_headers_and_links_serialization() {
        let index = DeclarationIndex::empty();
        let mut schema_gen = SchemaGenerator::new(&index);
        let mut builder = OpenApiBuilder::new();
        builder.add_route(&RouteEntry::new(HttpMethod::Get, "/items"), None, &mut schema_gen);
        let mut document = builder.build(schema_gen);

        let plain = serde_json::to_value(&document).unwrap();
        assert!(plain.get("webhooks").is_none());
        assert!(plain["paths"]["/items"]["get"]["responses"]["200"].get("headers").is_none());

        let mut accepted = Response {
            description: "Event accepted".to_string(),
            ..Default::default()
        };
        accepted
            .add_header(
                "X-Delivery-Id",
                Header {
                    description: Some("Delivery id".to_string()),
                    required: true,
                    schema: Some(Schema::formatted(SchemaType::String, "uuid")),
                    ..Default::default()
                },
            )
            .add_link(
                "GetItems",
                Link {
                    operation_id: Some("getItems".to_string()),
                    ..Default::default()
                },
            );
        let mut operation = Operation {
            summary: Some("Item changed".to_string()),
            ..Default::default()
        };
        operation.responses.insert("202".to_string(), accepted);
        document.add_webhook(
            "itemChanged",
            PathItem {
                post: Some(operation),
                ..Default::default()
            },
        );

        let value = serde_json::to_value(&document).unwrap();
        let response = &value["webhooks"]["itemChanged"]["post"]["responses"]["202"];
        assert_eq!(
            response["headers"]["X-Delivery-Id"],
            serde_json::json!({
                "description": "Delivery id",
                "required": true,
                "schema": {"type": "string", "format": "uuid"}
            })
        );
        assert_eq!(response["links"]["GetItems"]["operationId"], "getItems");
        assert!(response.get("content").is_none());
    }
}
