//! OpenAPI 3.1 compliance report for generated documents.

use crate::openapi_builder::{OpenApiDocument, Operation, PathItem, PROBLEM_DETAILS};
use crate::schema::{AdditionalProperties, Schema, SchemaType};
use std::collections::BTreeMap;

/// Problems that make `doc` an invalid or incomplete OpenAPI 3.1 document.
/// Empty when the document is compliant.
pub fn validate_openapi31(doc: &OpenApiDocument) -> Vec<String> {
    let mut issues = Vec::new();

    if !doc.openapi.starts_with("3.1") {
        issues.push(format!("openapi version is {}, expected 3.1.x", doc.openapi));
    }
    if doc.json_schema_dialect.is_none() {
        issues.push("jsonSchemaDialect is not set".to_string());
    }
    if doc.info.title.trim().is_empty() {
        issues.push("info.title is empty".to_string());
    }

    let components = component_schemas(doc);
    for (location, schema) in all_schemas(doc) {
        walk(schema, &location, &mut |path, schema| {
            if schema.schema_type == Some(SchemaType::Array) && schema.items.is_none() {
                issues.push(format!("{}: array schema without items", path));
            }
            if let Some(target) = schema.reference_target() {
                if !components.contains_key(target) {
                    issues.push(format!("{}: unresolved reference {}", path, target));
                }
            } else if let Some(reference) = &schema.reference {
                issues.push(format!("{}: reference {} is outside components", path, reference));
            }
        });
    }

    for (path, item) in &doc.paths {
        for operation in item.operations() {
            if operation.responses.is_empty() {
                issues.push(format!("{}: operation without responses", path));
            }
        }
    }

    for (name, item) in &doc.webhooks {
        if item.operations().next().is_none() {
            issues.push(format!("webhooks.{}: webhook without operations", name));
        }
        for operation in item.operations() {
            if operation.responses.is_empty() {
                issues.push(format!("webhooks.{}: operation without responses", name));
            }
        }
    }

    issues
}

/// Which OpenAPI 3.1 features the document makes use of.
pub fn feature_usage(doc: &OpenApiDocument) -> BTreeMap<String, bool> {
    let mut nullable_one_of = false;
    let mut references = false;
    let mut one_of = false;
    let mut any_of = false;
    let mut all_of = false;
    let mut examples = false;
    for (location, schema) in all_schemas(doc) {
        walk(schema, &location, &mut |_, schema| {
            references |= schema.is_reference();
            nullable_one_of |= schema.is_nullable_pattern();
            one_of |= !schema.one_of.is_empty();
            any_of |= !schema.any_of.is_empty();
            all_of |= !schema.all_of.is_empty();
            examples |= !schema.examples.is_empty() || schema.example.is_some();
        });
    }

    let operations: Vec<&Operation> = all_path_items(doc).flat_map(|(_, item)| item.operations()).collect();
    let responses = || operations.iter().flat_map(|op| op.responses.values());
    examples |= responses()
        .flat_map(|r| r.content.iter().flatten())
        .any(|(_, media)| !media.examples.is_empty());
    let security_schemes = doc
        .components
        .as_ref()
        .and_then(|c| c.security_schemes.as_ref())
        .is_some_and(|s| !s.is_empty());

    BTreeMap::from([
        ("jsonSchemaDialect".to_string(), doc.json_schema_dialect.is_some()),
        ("nullableOneOf".to_string(), nullable_one_of),
        ("schemaReferences".to_string(), references),
        ("problemDetails".to_string(), component_schemas(doc).contains_key(PROBLEM_DETAILS)),
        ("securitySchemes".to_string(), security_schemes),
        (
            "operationSecurity".to_string(),
            operations.iter().any(|op| op.security.is_some()),
        ),
        (
            "requestBodies".to_string(),
            operations.iter().any(|op| op.request_body.is_some()),
        ),
        ("servers".to_string(), !doc.servers.is_empty()),
        ("tags".to_string(), !doc.tags.is_empty()),
        ("webhooks".to_string(), !doc.webhooks.is_empty()),
        ("oneOfComposition".to_string(), one_of),
        ("anyOfComposition".to_string(), any_of),
        ("allOfComposition".to_string(), all_of),
        ("examples".to_string(), examples),
        ("responseHeaders".to_string(), responses().any(|r| !r.headers.is_empty())),
        ("responseLinks".to_string(), responses().any(|r| !r.links.is_empty())),
    ])
}

/// Counts of documented items and of component schemas per feature.
pub fn feature_counts(doc: &OpenApiDocument) -> BTreeMap<String, usize> {
    let schemas = component_schemas(doc);
    let count = |predicate: fn(&Schema) -> bool| schemas.values().filter(|s| predicate(s)).count();

    BTreeMap::from([
        ("paths".to_string(), doc.paths.len()),
        ("webhooks".to_string(), doc.webhooks.len()),
        ("schemas".to_string(), schemas.len()),
        ("schemasWithOneOf".to_string(), count(|s| !s.one_of.is_empty())),
        ("schemasWithAnyOf".to_string(), count(|s| !s.any_of.is_empty())),
        ("schemasWithAllOf".to_string(), count(|s| !s.all_of.is_empty())),
        ("schemasWithNullablePattern".to_string(), count(Schema::is_nullable_pattern)),
        ("schemasWithFormat".to_string(), count(|s| s.format.is_some())),
        ("schemasWithPattern".to_string(), count(|s| s.pattern.is_some())),
        ("schemasWithEnum".to_string(), count(|s| !s.enum_values.is_empty())),
    ])
}

/// Paths followed by webhooks, with a readable prefix for each.
fn all_path_items(doc: &OpenApiDocument) -> impl Iterator<Item = (String, &PathItem)> {
    doc.paths
        .iter()
        .map(|(path, item)| (path.clone(), item))
        .chain(
            doc.webhooks
                .iter()
                .map(|(name, item)| (format!("webhooks.{}", name), item)),
        )
}

fn component_schemas(doc: &OpenApiDocument) -> BTreeMap<&str, &Schema> {
    doc.components
        .as_ref()
        .and_then(|c| c.schemas.as_ref())
        .map(|schemas| schemas.iter().map(|(k, v)| (k.as_str(), v)).collect())
        .unwrap_or_default()
}

/// Every top-level schema of the document with a readable location.
fn all_schemas(doc: &OpenApiDocument) -> Vec<(String, &Schema)> {
    let mut schemas: Vec<(String, &Schema)> = component_schemas(doc)
        .into_iter()
        .map(|(name, schema)| (format!("components.schemas.{}", name), schema))
        .collect();

    for (path, item) in all_path_items(doc) {
        for operation in item.operations() {
            let id = operation.operation_id.clone().unwrap_or_else(|| path.clone());
            for parameter in operation.parameters.iter().flatten() {
                schemas.push((format!("{}.parameters.{}", id, parameter.name), &parameter.schema));
            }
            if let Some(body) = &operation.request_body {
                for (content_type, media) in &body.content {
                    schemas.push((format!("{}.requestBody.{}", id, content_type), &media.schema));
                }
            }
            for (status, response) in &operation.responses {
                for (content_type, media) in response.content.iter().flatten() {
                    schemas.push((
                        format!("{}.responses.{}.{}", id, status, content_type),
                        &media.schema,
                    ));
                }
                for (name, header) in &response.headers {
                    if let Some(schema) = &header.schema {
                        schemas.push((format!("{}.responses.{}.headers.{}", id, status, name), schema));
                    }
                }
            }
        }
    }
    schemas
}

fn walk<'s>(schema: &'s Schema, path: &str, visit: &mut dyn FnMut(&str, &'s Schema)) {
    visit(path, schema);
    for (name, property) in &schema.properties {
        walk(property, &format!("{}.{}", path, name), visit);
    }
    if let Some(items) = &schema.items {
        walk(items, &format!("{}[]", path), visit);
    }
    if let Some(additional) = &schema.additional_properties {
        if let AdditionalProperties::Schema(values) = additional.as_ref() {
            walk(values, &format!("{}{{}}", path), visit);
        }
    }
    for (keyword, alternatives) in [
        ("oneOf", &schema.one_of),
        ("anyOf", &schema.any_of),
        ("allOf", &schema.all_of),
    ] {
        for (i, alternative) in alternatives.iter().enumerate() {
            walk(alternative, &format!("{}.{}[{}]", path, keyword, i), visit);
        }
    }
}
