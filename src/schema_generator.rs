//! Type-to-schema resolution.
//!
//! [`SchemaGenerator`] turns type names into JSON Schemas for one generation
//! run. Resolution is layered: known-external overrides, then the
//! primitive/composite classifier, then string-enum detection, then
//! declared structs and enums, and finally an empty `object` fallback.
//!
//! Named types are registered in the run's schema table under their
//! qualified name and referenced with `$ref`. A name is registered before
//! its members are resolved, which is what makes self-referential types
//! terminate.

use crate::attributes::{apply_hints, SerdeHints};
use crate::classifier::{classify_expr, primitive_kind, Classification, TypeExpr};
use crate::enums::{detect_enum, variant_wire_name};
use crate::schema::{Schema, SchemaType};
use crate::type_index::{
    Declaration, Definition, Member, TypeDescriptorProvider, VariantPayload, QUALIFIER,
};
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Behavior switches for struct resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Drop members marked `#[serde(skip)]` instead of documenting them
    /// under their declared name.
    pub exclude_skipped_members: bool,
}

/// Resolution engine and schema table for one generation run.
pub struct SchemaGenerator<'a> {
    provider: &'a dyn TypeDescriptorProvider,
    options: ResolverOptions,
    /// `None` marks a schema whose builder is still running.
    schemas: BTreeMap<String, Option<Schema>>,
    /// Aliases currently being expanded inline.
    expanding_aliases: HashSet<String>,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(provider: &'a dyn TypeDescriptorProvider) -> Self {
        Self::with_options(provider, ResolverOptions::default())
    }

    pub fn with_options(provider: &'a dyn TypeDescriptorProvider, options: ResolverOptions) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            provider,
            options,
            schemas: BTreeMap::new(),
            expanding_aliases: HashSet::new(),
        }
    }

    /// Resolves any type name to a schema. Never fails: types that cannot
    /// be located resolve to `{"type": "object"}`.
    pub fn resolve_any(&mut self, type_name: &str) -> Schema {
        let type_name = type_name.trim();
        debug!("Resolving type: {}", type_name);

        if let Some(schema) = self.provider.known_external(type_name) {
            return schema;
        }
        self.resolve_expr(&TypeExpr::parse(type_name), None)
    }

    /// Resolves a parsed type expression. `scope` is the declaring scope of
    /// the expression, used to prefer same-scope declarations.
    pub fn resolve_expr(&mut self, expr: &TypeExpr, scope: Option<&str>) -> Schema {
        if !matches!(expr, TypeExpr::Named(_)) {
            if let Some(schema) = self.provider.known_external(&expr.to_string()) {
                return schema;
            }
        }

        if let TypeExpr::Optional(inner) = expr {
            return self.resolve_expr(inner, scope);
        }

        match classify_expr(expr) {
            Classification::Primitive(kind) => kind.schema(),
            Classification::Array(element) => Schema::array(self.resolve_expr(&element, scope)),
            Classification::Map(value) => Schema::map(self.resolve_expr(&value, scope)),
            Classification::Any => Schema::any(),
            Classification::NotBasic(name) => self.resolve_named(&name, scope),
        }
    }

    fn resolve_named(&mut self, name: &str, scope: Option<&str>) -> Schema {
        if let Some(schema) = self.provider.known_external(name) {
            return schema;
        }

        let qualified = self.provider.qualify_in(name, scope);
        let declaration = self.locate(&qualified);
        let key = declaration
            .as_ref()
            .map(|d| d.qualified_name())
            .unwrap_or(qualified);

        if self.schemas.contains_key(&key) {
            return Schema::reference(&key);
        }

        if let Some(schema) = detect_enum(self.provider, &key) {
            return self.get_or_create(&key, |_| schema);
        }

        let Some(declaration) = declaration else {
            return self.fallback(name);
        };

        match &declaration.definition {
            Definition::Record(_) => {
                self.get_or_create(&key, |generator| generator.resolve_struct(&declaration))
            }
            Definition::Enum(_) => {
                self.get_or_create(&key, |generator| generator.resolve_enum(&declaration))
            }
            Definition::Alias(target) => {
                if !self.expanding_aliases.insert(key.clone()) {
                    debug!("Recursive alias {}, using object", key);
                    return Schema::object();
                }
                let schema = self.resolve_expr(target, Some(&declaration.scope));
                self.expanding_aliases.remove(&key);
                schema
            }
            Definition::Opaque => {
                debug!("{} has no structural fields, using object", key);
                Schema::object()
            }
        }
    }

    /// Declaration behind a qualified name. A qualified path that does not
    /// match its declaring module (re-exports) falls back to its last segment.
    fn locate(&self, qualified: &str) -> Option<Arc<Declaration>> {
        if let Some(declaration) = self.provider.describe(qualified) {
            return Some(declaration);
        }
        let (_, simple) = qualified.rsplit_once(QUALIFIER)?;
        let requalified = self.provider.qualify(simple);
        self.provider.describe(&requalified)
    }

    fn fallback(&mut self, name: &str) -> Schema {
        let simple = name.rsplit(QUALIFIER).next().unwrap_or(name);
        if let Some(schema) = self.provider.known_external_by_simple_name(simple) {
            return schema;
        }
        debug!("Type {} not found, using object placeholder", name);
        Schema::object()
    }

    /// Registers `qualified` in the schema table and returns a reference to it.
    ///
    /// `builder` runs only on the first request. The name is reserved before
    /// it runs, so recursive requests for the same name get the reference
    /// without re-entering the builder.
    pub fn get_or_create<F>(&mut self, qualified: &str, builder: F) -> Schema
    where
        F: FnOnce(&mut Self) -> Schema,
    {
        if self.schemas.contains_key(qualified) {
            return Schema::reference(qualified);
        }

        debug!("Building schema for {}", qualified);
        self.schemas.insert(qualified.to_string(), None);
        let schema = builder(self);
        self.schemas.insert(qualified.to_string(), Some(schema));

        Schema::reference(qualified)
    }

    /// Object schema for a struct declaration.
    pub fn resolve_struct(&mut self, declaration: &Declaration) -> Schema {
        let members = match &declaration.definition {
            Definition::Record(members) => members.as_slice(),
            _ => &[],
        };
        let container = declaration.container.serde_hints();

        let mut schema = self.resolve_members(members, &container, &declaration.scope);
        schema.description = declaration.docs.clone();
        schema
    }

    fn resolve_members(&mut self, members: &[Member], container: &SerdeHints, scope: &str) -> Schema {
        let mut schema = Schema::object();

        for member in members {
            if member.embedded {
                debug!("Skipping flattened member {}", member.name);
                continue;
            }
            if !member.visible {
                continue;
            }

            let hints = member.metadata.serde_hints();
            if hints.skip {
                if self.options.exclude_skipped_members {
                    debug!("Excluding skipped member {}", member.name);
                    continue;
                }
                debug!(
                    "Member {} is marked skip; documenting it under its declared name",
                    member.name
                );
            }

            let wire_name = if hints.skip {
                member.name.clone()
            } else if let Some(rename) = hints.rename.clone() {
                rename
            } else if let Some(rule) = container.rename_all {
                rule.apply_to_field(&member.name)
            } else {
                member.name.clone()
            };

            let mut property = self.resolve_expr(&member.ty, Some(scope));
            apply_hints(&mut property, &member.metadata);
            if property.description.is_none() && !property.is_reference() {
                property.description = member.docs.clone();
            }

            if !member.ty.is_optional() && !hints.omit_if_empty {
                schema.required.push(wire_name.clone());
            }
            schema.properties.insert(wire_name, property);
        }

        schema
    }

    /// Rust enum: a string enum when every variant is a unit variant,
    /// otherwise `oneOf` over the externally tagged variant shapes.
    pub fn resolve_enum(&mut self, declaration: &Declaration) -> Schema {
        let Definition::Enum(variants) = &declaration.definition else {
            return Schema::object();
        };
        let container = declaration.container.serde_hints();

        let unit_names: Vec<String> = variants
            .iter()
            .filter(|v| v.payload == VariantPayload::Unit && !v.metadata.serde_hints().skip)
            .map(|v| variant_wire_name(v, &container))
            .collect();

        let all_unit = variants.iter().all(|v| v.payload == VariantPayload::Unit);
        let mut schema = if all_unit {
            Schema::string_enum(unit_names)
        } else {
            let mut alternatives = Vec::new();
            if !unit_names.is_empty() {
                alternatives.push(Schema::string_enum(unit_names));
            }
            for variant in variants {
                let payload = match &variant.payload {
                    VariantPayload::Unit => continue,
                    VariantPayload::Newtype(ty) => self.resolve_expr(ty, Some(&declaration.scope)),
                    VariantPayload::Tuple(_) => Schema::array(Schema::any()),
                    VariantPayload::Struct(members) => self.resolve_members(
                        members,
                        &SerdeHints::default(),
                        &declaration.scope,
                    ),
                };
                let wire_name = variant_wire_name(variant, &container);
                let mut tagged = Schema::object();
                tagged.required.push(wire_name.clone());
                tagged.properties.insert(wire_name, payload);
                alternatives.push(tagged);
            }
            Schema {
                one_of: alternatives,
                ..Default::default()
            }
        };

        schema.description = declaration.docs.clone();
        schema
    }

    /// Whether `qualified` has been registered in this run.
    pub fn contains(&self, qualified: &str) -> bool {
        self.schemas.contains_key(qualified)
    }

    /// Completed named schemas, keyed by qualified name.
    pub fn schemas(&self) -> BTreeMap<String, Schema> {
        self.schemas
            .iter()
            .filter_map(|(name, schema)| schema.clone().map(|s| (name.clone(), s)))
            .collect()
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
            .into_iter()
            .filter_map(|(name, schema)| schema.map(|s| (name, s)))
            .collect()
    }
}

/// Schema for a primitive parameter type name; anything else is a string.
pub fn parameter_schema(type_name: &str) -> Schema {
    let normalized = match type_name.trim() {
        "int" | "integer" | "long" => "i64",
        "float" | "double" | "number" => "f64",
        "boolean" => "bool",
        other => other,
    };
    match primitive_kind(normalized) {
        Some(kind) => kind.schema(),
        None => Schema::of(SchemaType::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_index::{DeclarationIndex, DeclarationIndexBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    fn index_from_sources(files: &[(&str, &str)]) -> DeclarationIndex {
        let mut builder = DeclarationIndexBuilder::new();
        for (path, source) in files {
            builder.add_source(Path::new(path), source).unwrap();
        }
        builder.build()
    }

    fn to_json(schema: &Schema) -> serde_json::Value {
        serde_json::to_value(schema).unwrap()
    }

    #[test]
    fn test_primitives_have_no_extra_fields() {
        let index = DeclarationIndex::empty();
        let mut generator = SchemaGenerator::new(&index);

        for (name, expected) in [
            ("i32", "integer"),
            ("u8", "integer"),
            ("usize", "integer"),
            ("f32", "number"),
            ("bool", "boolean"),
            ("String", "string"),
            ("&str", "string"),
        ] {
            assert_eq!(to_json(&generator.resolve_any(name)), json!({"type": expected}));
        }
        assert!(generator.schemas().is_empty());
    }

    #[test]
    fn test_nested_composites() {
        let index = DeclarationIndex::empty();
        let mut generator = SchemaGenerator::new(&index);

        let nested = generator.resolve_any("Vec<Option<Vec<String>>>");
        let flat = generator.resolve_any("Vec<String>");
        assert_eq!(nested, Schema::array(flat));

        let map = generator.resolve_any("HashMap<String, Vec<i64>>");
        assert_eq!(
            to_json(&map),
            json!({
                "type": "object",
                "additionalProperties": {"type": "array", "items": {"type": "integer"}}
            })
        );

        assert_eq!(
            to_json(&generator.resolve_any("Box<dyn std::error::Error>")),
            json!({"type": "object", "additionalProperties": true})
        );
    }

    #[test]
    fn test_known_external_overrides() {
        let index = DeclarationIndex::empty();
        let mut generator = SchemaGenerator::new(&index);

        assert_eq!(
            to_json(&generator.resolve_any("chrono::DateTime<chrono::Utc>")),
            json!({"type": "string", "format": "date-time"})
        );
        assert_eq!(
            to_json(&generator.resolve_any("Option<uuid::Uuid>")),
            json!({"oneOf": [{"type": "string", "format": "uuid"}, {"type": "null"}]})
        );
        // Imported with `use uuid::Uuid`
        assert_eq!(
            to_json(&generator.resolve_any("Uuid")),
            json!({"type": "string", "format": "uuid"})
        );

        index.add_external_known_type("money.Cents", Schema::of(SchemaType::Integer));
        assert_eq!(
            to_json(&generator.resolve_any("money.Cents")),
            json!({"type": "integer"})
        );
    }

    #[test]
    fn test_struct_fields_names_and_required() {
        let index = index_from_sources(&[(
            "src/models.rs",
            r#"
            pub struct Account {
                pub ID: i64,
                #[serde(rename = "full_name")]
                pub Name: String,
                #[serde(skip_serializing_if = "Option::is_none")]
                pub Email: Option<String>,
                internal: u32,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);

        let reference = generator.resolve_any("Account");
        assert_eq!(reference, Schema::reference("models.Account"));

        let schemas = generator.into_schemas();
        assert_eq!(
            to_json(&schemas["models.Account"]),
            json!({
                "type": "object",
                "properties": {
                    "ID": {"type": "integer"},
                    "full_name": {"type": "string"},
                    "Email": {"type": "string"}
                },
                "required": ["ID", "full_name"]
            })
        );
    }

    #[test]
    fn test_rename_all_and_default_marker() {
        let index = index_from_sources(&[(
            "src/models.rs",
            r#"
            #[serde(rename_all = "camelCase")]
            pub struct Settings {
                pub page_size: u32,
                #[serde(default)]
                pub dark_mode: bool,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("models.Settings");

        let schema = &generator.schemas()["models.Settings"];
        assert!(schema.properties.contains_key("pageSize"));
        assert!(schema.properties.contains_key("darkMode"));
        assert_eq!(schema.required, vec!["pageSize".to_string()]);
    }

    #[test]
    fn test_self_reference_terminates() {
        let index = index_from_sources(&[(
            "src/tree.rs",
            r#"
            pub struct Node {
                pub value: i32,
                pub parent: Option<Box<Node>>,
                pub children: Vec<Node>,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);

        let reference = generator.resolve_any("Node");
        let schemas = generator.into_schemas();

        assert_eq!(schemas.len(), 1);
        let node = &schemas["tree.Node"];
        assert_eq!(node.properties["parent"], reference);
        assert_eq!(node.properties["children"], Schema::array(reference.clone()));
        assert_eq!(node.required, vec!["value".to_string(), "children".to_string()]);
    }

    #[test]
    fn test_self_keyword_members_reference_declaring_type() {
        let index = index_from_sources(&[(
            "src/tree.rs",
            r#"
            pub struct Node {
                pub parent: Option<Box<Self>>,
                pub children: Vec<Self>,
            }

            pub enum Expr {
                Literal(i64),
                Neg(Box<Self>),
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);

        let node = generator.resolve_any("Node");
        generator.resolve_any("Expr");
        let schemas = generator.into_schemas();

        assert_eq!(node, Schema::reference("tree.Node"));
        let properties = &schemas["tree.Node"].properties;
        assert_eq!(properties["parent"], node);
        assert_eq!(properties["children"], Schema::array(node.clone()));
        assert!(to_json(&schemas["tree.Expr"])
            .to_string()
            .contains("#/components/schemas/tree.Expr"));
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let index = index_from_sources(&[(
            "src/org.rs",
            r#"
            pub struct Team { pub lead: Person }
            pub struct Person { pub team: Option<Team> }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Team");

        let schemas = generator.schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(
            schemas["org.Person"].properties["team"],
            Schema::reference("org.Team")
        );
    }

    #[test]
    fn test_repeated_requests_share_one_entry() {
        let index = index_from_sources(&[("src/models.rs", "pub struct Tag { pub label: String }")]);
        let mut generator = SchemaGenerator::new(&index);

        let first = generator.resolve_any("Tag");
        for name in ["Tag", "models.Tag", "models::Tag", "crate::models::Tag"] {
            assert_eq!(generator.resolve_any(name), first);
        }
        assert_eq!(generator.schemas().len(), 1);
    }

    #[test]
    fn test_same_scope_declaration_preferred() {
        let index = index_from_sources(&[
            ("src/billing.rs", "pub struct Item { pub cents: u64 }\npub struct Invoice { pub items: Vec<Item> }"),
            ("src/alpha.rs", "pub struct Item { pub name: String }"),
        ]);
        let mut generator = SchemaGenerator::new(&index);

        generator.resolve_any("Invoice");
        let schemas = generator.schemas();
        assert_eq!(
            schemas["billing.Invoice"].properties["items"],
            Schema::array(Schema::reference("billing.Item"))
        );
        assert!(!schemas.contains_key("alpha.Item"));
    }

    #[test]
    fn test_string_alias_enum_and_plain_alias() {
        let index = index_from_sources(&[(
            "src/orders.rs",
            r#"
            pub type Status = &'static str;
            pub const OPEN: Status = "open";
            pub const CLOSED: Status = "closed";
            pub type Note = String;
            pub struct Order { pub status: Status, pub note: Note }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Order");

        let schemas = generator.schemas();
        let order = &schemas["orders.Order"];
        assert_eq!(order.properties["status"], Schema::reference("orders.Status"));
        assert_eq!(order.properties["note"], Schema::of(SchemaType::String));
        assert_eq!(
            schemas["orders.Status"].enum_values,
            vec![json!("open"), json!("closed")]
        );
        assert!(!schemas.contains_key("orders.Note"));
    }

    #[test]
    fn test_rust_enums() {
        let index = index_from_sources(&[(
            "src/events.rs",
            r#"
            #[serde(rename_all = "snake_case")]
            pub enum Kind { Created, StatusChanged }

            pub enum Event {
                Ping,
                Message(String),
                Moved { x: i32, y: i32 },
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Kind");
        generator.resolve_any("Event");

        let schemas = generator.schemas();
        assert_eq!(
            to_json(&schemas["events.Kind"]),
            json!({"type": "string", "enum": ["created", "status_changed"]})
        );
        assert_eq!(
            to_json(&schemas["events.Event"]),
            json!({"oneOf": [
                {"type": "string", "enum": ["Ping"]},
                {
                    "type": "object",
                    "properties": {"Message": {"type": "string"}},
                    "required": ["Message"]
                },
                {
                    "type": "object",
                    "properties": {
                        "Moved": {
                            "type": "object",
                            "properties": {"x": {"type": "integer"}, "y": {"type": "integer"}},
                            "required": ["x", "y"]
                        }
                    },
                    "required": ["Moved"]
                }
            ]})
        );
    }

    #[test]
    fn test_unknown_and_opaque_types_fall_back_to_object() {
        let index = index_from_sources(&[("src/misc.rs", "pub struct Marker;")]);
        let mut generator = SchemaGenerator::new(&index);

        assert_eq!(generator.resolve_any("Missing"), Schema::object());
        assert_eq!(generator.resolve_any("Marker"), Schema::object());
        assert!(generator.schemas().is_empty());
    }

    #[test]
    fn test_recursive_newtype_alias_terminates() {
        let index = index_from_sources(&[("src/misc.rs", "pub struct Forest(pub Vec<Forest>);")]);
        let mut generator = SchemaGenerator::new(&index);

        assert_eq!(generator.resolve_any("Forest"), Schema::array(Schema::object()));
    }

    #[test]
    fn test_skip_marker_not_excluded_by_default() {
        let source = r#"
            pub struct Secret {
                pub id: u32,
                #[serde(skip)]
                pub token: String,
            }
        "#;
        let index = index_from_sources(&[("src/auth.rs", source)]);

        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Secret");
        assert!(generator.schemas()["auth.Secret"].properties.contains_key("token"));

        let mut generator = SchemaGenerator::with_options(
            &index,
            ResolverOptions {
                exclude_skipped_members: true,
            },
        );
        generator.resolve_any("Secret");
        assert!(!generator.schemas()["auth.Secret"].properties.contains_key("token"));
    }

    #[test]
    fn test_flattened_members_are_skipped() {
        let index = index_from_sources(&[(
            "src/models.rs",
            r#"
            pub struct Audit { pub created_by: String }
            pub struct Doc {
                pub title: String,
                #[serde(flatten)]
                pub audit: Audit,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Doc");

        let schemas = generator.schemas();
        assert_eq!(schemas["models.Doc"].properties.len(), 1);
        assert!(!schemas.contains_key("models.Audit"));
    }

    #[test]
    fn test_member_hints_applied() {
        let index = index_from_sources(&[(
            "src/models.rs",
            r#"
            pub struct Signup {
                /// Contact address
                #[openapi(format = "idn-email", example = "a@b.c")]
                #[validate(email)]
                pub email: String,
                #[openapi(minimum = 18, maximum = 130)]
                pub age: u8,
            }
            "#,
        )]);
        let mut generator = SchemaGenerator::new(&index);
        generator.resolve_any("Signup");

        let schemas = generator.schemas();
        let signup = &schemas["models.Signup"];
        assert_eq!(
            to_json(&signup.properties["email"]),
            json!({
                "type": "string",
                "format": "email",
                "description": "Contact address",
                "example": "a@b.c"
            })
        );
        assert_eq!(signup.properties["age"].minimum, Some(18.0));
        assert_eq!(signup.properties["age"].maximum, Some(130.0));
    }

    #[test]
    fn test_parameter_schema() {
        assert_eq!(parameter_schema("int"), Schema::of(SchemaType::Integer));
        assert_eq!(parameter_schema("u32"), Schema::of(SchemaType::Integer));
        assert_eq!(parameter_schema("bool"), Schema::of(SchemaType::Boolean));
        assert_eq!(parameter_schema("Uuid"), Schema::of(SchemaType::String));
    }
}
