//! Declaration index: every type declared in the scanned sources, by scope.
//!
//! The index is built once from a source tree (or assembled by hand through
//! [`DeclarationIndexBuilder`]) and is read-only afterwards, apart from the
//! registry of known-external schema overrides, which accepts additions from
//! concurrent callers.
//!
//! Qualified names have the form `scope.Name`. When a bare name is declared
//! in several scopes, scopes are searched in lexicographic order and the
//! first match wins.

use crate::attributes::{doc_comment, MemberMetadata};
use crate::classifier::TypeExpr;
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::{find_project_root, FileScanner};
use crate::schema::{Schema, SchemaType};
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syn::visit::{self, Visit};

/// Separator between scope and type name.
pub const QUALIFIER: char = '.';

/// One declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub scope: String,
    pub file: Option<PathBuf>,
    pub docs: Option<String>,
    /// Container-level attributes (`rename_all` lives here).
    pub container: MemberMetadata,
    pub definition: Definition,
}

/// Structural shape of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// `type X = T;` or `struct X(T);`
    Alias(TypeExpr),
    /// Struct with named fields.
    Record(Vec<Member>),
    /// Rust `enum`.
    Enum(Vec<Variant>),
    /// Unit structs, multi-field tuple structs, unions.
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    /// Declared with some form of `pub`.
    pub visible: bool,
    /// `#[serde(flatten)]`: fields are merged into the parent on the wire.
    pub embedded: bool,
    pub ty: TypeExpr,
    pub docs: Option<String>,
    pub metadata: MemberMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub metadata: MemberMetadata,
    pub payload: VariantPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantPayload {
    Unit,
    Newtype(TypeExpr),
    Tuple(Vec<TypeExpr>),
    Struct(Vec<Member>),
}

/// A `const` item, either free-standing or associated with an `impl` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    /// Simple name of the declared type (`Self` is replaced by the impl target).
    pub type_name: String,
    /// Value when the initializer is a string literal, `X("..")` or `Self("..")`.
    pub string_literal: Option<String>,
}

impl Declaration {
    pub fn qualified_name(&self) -> String {
        format!("{}{}{}", self.scope, QUALIFIER, self.name)
    }

    pub fn record(scope: &str, name: &str, members: Vec<Member>) -> Self {
        Self::new(scope, name, Definition::Record(members))
    }

    pub fn alias(scope: &str, name: &str, target: TypeExpr) -> Self {
        Self::new(scope, name, Definition::Alias(target))
    }

    pub fn new(scope: &str, name: &str, definition: Definition) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            file: None,
            docs: None,
            container: MemberMetadata::default(),
            definition,
        }
    }
}

impl Definition {
    /// Rewrites `Self` in member and variant types to the declaring type.
    fn with_self_type(self, target: &str) -> Definition {
        let members = |members: Vec<Member>| -> Vec<Member> {
            members
                .into_iter()
                .map(|member| Member {
                    ty: member.ty.with_self_type(target),
                    ..member
                })
                .collect()
        };
        match self {
            Definition::Alias(expr) => Definition::Alias(expr.with_self_type(target)),
            Definition::Record(fields) => Definition::Record(members(fields)),
            Definition::Enum(variants) => Definition::Enum(
                variants
                    .into_iter()
                    .map(|variant| Variant {
                        payload: match variant.payload {
                            VariantPayload::Unit => VariantPayload::Unit,
                            VariantPayload::Newtype(expr) => {
                                VariantPayload::Newtype(expr.with_self_type(target))
                            }
                            VariantPayload::Tuple(exprs) => VariantPayload::Tuple(
                                exprs.into_iter().map(|e| e.with_self_type(target)).collect(),
                            ),
                            VariantPayload::Struct(fields) => VariantPayload::Struct(members(fields)),
                        },
                        ..variant
                    })
                    .collect(),
            ),
            Definition::Opaque => Definition::Opaque,
        }
    }
}

impl Member {
    /// Public member with no metadata.
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            embedded: false,
            ty: TypeExpr::parse(ty),
            docs: None,
            metadata: MemberMetadata::default(),
        }
    }

    pub fn with_serde(mut self, serde: &str) -> Self {
        self.embedded = self.embedded || crate::attributes::SerdeHints::parse(Some(serde)).flatten;
        self.metadata.serde = Some(serde.to_string());
        self
    }

    fn from_field(field: &syn::Field) -> Option<Self> {
        let name = field.ident.as_ref()?.to_string();
        let metadata = MemberMetadata::from_attrs(&field.attrs);
        Some(Self {
            name,
            visible: !matches!(field.vis, syn::Visibility::Inherited),
            embedded: metadata.serde_hints().flatten,
            ty: TypeExpr::from_syn(&field.ty),
            docs: doc_comment(&field.attrs),
            metadata,
        })
    }
}

/// Source of structural type descriptions for the resolution engine.
///
/// [`DeclarationIndex`] is the source-scanning implementation; a
/// hand-maintained registry can be assembled with [`DeclarationIndexBuilder`].
pub trait TypeDescriptorProvider: Send + Sync {
    /// Qualifies `name`, preferring a declaration in `scope` when given.
    fn qualify_in(&self, name: &str, scope: Option<&str>) -> String;

    fn qualify(&self, name: &str) -> String {
        self.qualify_in(name, None)
    }

    /// Structural description of a qualified name.
    fn describe(&self, qualified: &str) -> Option<Arc<Declaration>>;

    /// Constants declared in a scope, in declaration order.
    fn constants_in(&self, scope: &str) -> &[Constant];

    /// Known-external override registered under exactly `name`.
    fn known_external(&self, name: &str) -> Option<Schema>;

    /// Known-external override whose last path segment is `name`.
    fn known_external_by_simple_name(&self, _name: &str) -> Option<Schema> {
        None
    }
}

/// Process-wide index of declared types.
pub struct DeclarationIndex {
    project_root: Option<PathBuf>,
    scopes: BTreeMap<String, BTreeMap<String, Arc<Declaration>>>,
    /// Derived from `scopes`.
    qualified: HashMap<String, Arc<Declaration>>,
    constants: BTreeMap<String, Vec<Constant>>,
    external: RwLock<HashMap<String, Schema>>,
    files_indexed: usize,
    files_skipped: usize,
}

/// Incremental construction of a [`DeclarationIndex`].
pub struct DeclarationIndexBuilder {
    project_root: Option<PathBuf>,
    scopes: BTreeMap<String, BTreeMap<String, Arc<Declaration>>>,
    constants: BTreeMap<String, Vec<Constant>>,
    known_externals: bool,
    files_indexed: usize,
    files_skipped: usize,
}

impl Default for DeclarationIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationIndexBuilder {
    pub fn new() -> Self {
        Self {
            project_root: None,
            scopes: BTreeMap::new(),
            constants: BTreeMap::new(),
            known_externals: true,
            files_indexed: 0,
            files_skipped: 0,
        }
    }

    pub fn project_root(mut self, root: PathBuf) -> Self {
        self.project_root = Some(root);
        self
    }

    /// Starts the override registry empty instead of with the default table.
    pub fn without_known_externals(mut self) -> Self {
        self.known_externals = false;
        self
    }

    /// Registers a declaration. A second declaration of the same name in
    /// the same scope is ignored.
    pub fn declare(&mut self, declaration: Declaration) -> &mut Self {
        let types = self.scopes.entry(declaration.scope.clone()).or_default();
        if types.contains_key(&declaration.name) {
            debug!(
                "Duplicate declaration {} ignored",
                declaration.qualified_name()
            );
        } else {
            types.insert(declaration.name.clone(), Arc::new(declaration));
        }
        self
    }

    pub fn add_constant(&mut self, scope: &str, constant: Constant) -> &mut Self {
        self.constants
            .entry(scope.to_string())
            .or_default()
            .push(constant);
        self
    }

    /// Collects every type and constant declared in a parsed file,
    /// including those in inline `mod` blocks.
    pub fn add_parsed_file(&mut self, parsed: &ParsedFile) -> &mut Self {
        let mut collector = DeclarationCollector {
            builder: &mut *self,
            scopes: vec![parsed.scope.clone()],
            file: &parsed.path,
        };
        collector.visit_file(&parsed.syntax_tree);
        self.files_indexed += 1;
        self
    }

    /// Parses and collects source text attributed to `path`.
    pub fn add_source(&mut self, path: &Path, source: &str) -> Result<&mut Self> {
        let parsed = AstParser::parse_source(path, source)?;
        Ok(self.add_parsed_file(&parsed))
    }

    pub fn build(self) -> DeclarationIndex {
        let qualified = self
            .scopes
            .values()
            .flat_map(|types| types.values())
            .map(|declaration| (declaration.qualified_name(), Arc::clone(declaration)))
            .collect();

        let external = if self.known_externals {
            known_external_types()
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect()
        } else {
            HashMap::new()
        };

        DeclarationIndex {
            project_root: self.project_root,
            scopes: self.scopes,
            qualified,
            constants: self.constants,
            external: RwLock::new(external),
            files_indexed: self.files_indexed,
            files_skipped: self.files_skipped,
        }
    }
}

impl DeclarationIndex {
    /// Scans and indexes every Rust file below `root`.
    ///
    /// Files that fail to read or parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when `root` cannot be scanned at all.
    pub fn build(root: &Path) -> Result<Self> {
        info!("Building declaration index from {}", root.display());
        let scan_result = FileScanner::new(root.to_path_buf()).scan()?;

        let project_root = find_project_root(root).unwrap_or_else(|| root.to_path_buf());
        let mut builder = DeclarationIndexBuilder::new().project_root(project_root);

        for result in AstParser::parse_files(&scan_result.rust_files) {
            match result {
                Ok(parsed) => {
                    builder.add_parsed_file(&parsed);
                }
                Err(_) => builder.files_skipped += 1,
            }
        }

        let index = builder.build();
        if index.files_skipped > 0 {
            warn!(
                "{} files could not be parsed and were left out of the index",
                index.files_skipped
            );
        }
        info!(
            "Indexed {} types in {} scopes from {} files ({} skipped)",
            index.declaration_count(),
            index.scopes.len(),
            index.files_indexed,
            index.files_skipped
        );
        Ok(index)
    }

    /// Index with no declarations and the default override table.
    pub fn empty() -> Self {
        DeclarationIndexBuilder::new().build()
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn declaration_count(&self) -> usize {
        self.qualified.len()
    }

    pub fn files_skipped(&self) -> usize {
        self.files_skipped
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    pub fn lookup_qualified(&self, qualified: &str) -> Option<Arc<Declaration>> {
        self.qualified.get(qualified).cloned()
    }

    /// First declaration named `name`, scopes in lexicographic order.
    pub fn lookup_unqualified(&self, name: &str) -> Option<Arc<Declaration>> {
        self.scopes
            .values()
            .find_map(|types| types.get(name))
            .cloned()
    }

    /// Qualifies a bare name. Names already containing the separator are
    /// returned unchanged, as are names declared nowhere.
    pub fn qualify(&self, name: &str) -> String {
        self.qualify_in(name, None)
    }

    pub fn qualify_in(&self, name: &str, scope: Option<&str>) -> String {
        if name.contains(QUALIFIER) {
            return name.to_string();
        }

        if let Some(scope) = scope {
            if self
                .scopes
                .get(scope)
                .is_some_and(|types| types.contains_key(name))
            {
                return format!("{}{}{}", scope, QUALIFIER, name);
            }
        }

        match self.lookup_unqualified(name) {
            Some(declaration) => declaration.qualified_name(),
            None => name.to_string(),
        }
    }

    pub fn constants_in(&self, scope: &str) -> &[Constant] {
        self.constants.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registers or replaces a known-external override.
    pub fn add_external_known_type(&self, name: impl Into<String>, schema: Schema) {
        let name = name.into();
        debug!("Registering known external type {}", name);
        self.external.write().insert(name, schema);
    }

    pub fn known_external(&self, name: &str) -> Option<Schema> {
        self.external.read().get(name).cloned()
    }

    /// Override whose last segment equals `name`, the lexicographically
    /// smallest key winning. Lets `Uuid` match `uuid.Uuid` when imported by `use`.
    pub fn known_external_by_simple_name(&self, name: &str) -> Option<Schema> {
        let external = self.external.read();
        external
            .iter()
            .filter(|(key, _)| {
                key.rsplit_once(QUALIFIER)
                    .is_some_and(|(_, simple)| simple == name)
            })
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, schema)| schema.clone())
    }
}

impl TypeDescriptorProvider for DeclarationIndex {
    fn qualify_in(&self, name: &str, scope: Option<&str>) -> String {
        DeclarationIndex::qualify_in(self, name, scope)
    }

    fn describe(&self, qualified: &str) -> Option<Arc<Declaration>> {
        self.lookup_qualified(qualified)
    }

    fn constants_in(&self, scope: &str) -> &[Constant] {
        DeclarationIndex::constants_in(self, scope)
    }

    fn known_external(&self, name: &str) -> Option<Schema> {
        DeclarationIndex::known_external(self, name)
    }

    fn known_external_by_simple_name(&self, name: &str) -> Option<Schema> {
        DeclarationIndex::known_external_by_simple_name(self, name)
    }
}

/// Default override table for types whose source is not scanned.
pub fn known_external_types() -> Vec<(&'static str, Schema)> {
    let date_time = || Schema::formatted(SchemaType::String, "date-time");
    vec![
        ("chrono.DateTime", date_time()),
        ("chrono.NaiveDateTime", date_time()),
        ("time.OffsetDateTime", date_time()),
        ("time.PrimitiveDateTime", date_time()),
        ("time.SystemTime", date_time()),
        ("chrono.NaiveDate", Schema::formatted(SchemaType::String, "date")),
        ("time.Date", Schema::formatted(SchemaType::String, "date")),
        ("chrono.NaiveTime", Schema::formatted(SchemaType::String, "time")),
        ("time.Duration", Schema::formatted(SchemaType::String, "duration")),
        ("uuid.Uuid", Schema::formatted(SchemaType::String, "uuid")),
        ("rust_decimal.Decimal", Schema::of(SchemaType::String)),
        ("bigdecimal.BigDecimal", Schema::of(SchemaType::String)),
        ("url.Url", Schema::formatted(SchemaType::String, "uri")),
        ("net.IpAddr", Schema::formatted(SchemaType::String, "ipv4")),
        ("net.Ipv4Addr", Schema::formatted(SchemaType::String, "ipv4")),
        ("net.Ipv6Addr", Schema::formatted(SchemaType::String, "ipv6")),
        ("serde_json.Value", Schema::any()),
        ("serde_json.Map", Schema::any()),
        ("bytes.Bytes", Schema::formatted(SchemaType::String, "binary")),
        ("Option<chrono.DateTime>", Schema::nullable(date_time())),
        (
            "Option<uuid.Uuid>",
            Schema::nullable(Schema::formatted(SchemaType::String, "uuid")),
        ),
        (
            "Option<url.Url>",
            Schema::nullable(Schema::formatted(SchemaType::String, "uri")),
        ),
        (
            "Option<rust_decimal.Decimal>",
            Schema::nullable(Schema::of(SchemaType::String)),
        ),
    ]
}

/// Walks one file, tracking the current module scope.
struct DeclarationCollector<'a> {
    builder: &'a mut DeclarationIndexBuilder,
    scopes: Vec<String>,
    file: &'a Path,
}

impl DeclarationCollector<'_> {
    fn scope(&self) -> &str {
        self.scopes.last().map(String::as_str).unwrap_or_default()
    }

    fn declare(&mut self, name: String, attrs: &[syn::Attribute], definition: Definition) {
        let declaration = Declaration {
            definition: definition.with_self_type(&name),
            name,
            scope: self.scope().to_string(),
            file: Some(self.file.to_path_buf()),
            docs: doc_comment(attrs),
            container: MemberMetadata::from_attrs(attrs),
        };
        self.builder.declare(declaration);
    }

    fn add_constant(&mut self, name: String, ty: &syn::Type, expr: &syn::Expr, self_type: Option<&str>) {
        let Some(mut type_name) = simple_type_name(ty) else {
            return;
        };
        if type_name == "Self" {
            match self_type {
                Some(target) => type_name = target.to_string(),
                None => return,
            }
        }
        let scope = self.scope().to_string();
        self.builder.add_constant(
            &scope,
            Constant {
                name,
                string_literal: string_literal(expr, &type_name),
                type_name,
            },
        );
    }
}

impl<'ast> Visit<'ast> for DeclarationCollector<'_> {
    fn visit_item_mod(&mut self, item: &'ast syn::ItemMod) {
        if item.content.is_some() {
            self.scopes.push(item.ident.to_string());
            visit::visit_item_mod(self, item);
            self.scopes.pop();
        }
    }

    // Items inside function bodies are not reachable by path.
    fn visit_item_fn(&mut self, _item: &'ast syn::ItemFn) {}

    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        let definition = match &item.fields {
            syn::Fields::Named(fields) => {
                Definition::Record(fields.named.iter().filter_map(Member::from_field).collect())
            }
            syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                Definition::Alias(TypeExpr::from_syn(&fields.unnamed[0].ty))
            }
            _ => Definition::Opaque,
        };
        self.declare(item.ident.to_string(), &item.attrs, definition);
    }

    fn visit_item_enum(&mut self, item: &'ast syn::ItemEnum) {
        let variants = item
            .variants
            .iter()
            .map(|variant| Variant {
                name: variant.ident.to_string(),
                metadata: MemberMetadata::from_attrs(&variant.attrs),
                payload: match &variant.fields {
                    syn::Fields::Unit => VariantPayload::Unit,
                    syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                        VariantPayload::Newtype(TypeExpr::from_syn(&fields.unnamed[0].ty))
                    }
                    syn::Fields::Unnamed(fields) => VariantPayload::Tuple(
                        fields.unnamed.iter().map(|f| TypeExpr::from_syn(&f.ty)).collect(),
                    ),
                    syn::Fields::Named(fields) => VariantPayload::Struct(
                        fields
                            .named
                            .iter()
                            .filter_map(Member::from_field)
                            .map(|member| Member {
                                visible: true,
                                ..member
                            })
                            .collect(),
                    ),
                },
            })
            .collect();
        self.declare(item.ident.to_string(), &item.attrs, Definition::Enum(variants));
    }

    fn visit_item_type(&mut self, item: &'ast syn::ItemType) {
        self.declare(
            item.ident.to_string(),
            &item.attrs,
            Definition::Alias(TypeExpr::from_syn(&item.ty)),
        );
    }

    fn visit_item_union(&mut self, item: &'ast syn::ItemUnion) {
        self.declare(item.ident.to_string(), &item.attrs, Definition::Opaque);
    }

    fn visit_item_const(&mut self, item: &'ast syn::ItemConst) {
        self.add_constant(item.ident.to_string(), &item.ty, &item.expr, None);
    }

    fn visit_item_impl(&mut self, item: &'ast syn::ItemImpl) {
        if item.trait_.is_some() {
            return;
        }
        let self_type = simple_type_name(&item.self_ty);
        for impl_item in &item.items {
            if let syn::ImplItem::Const(constant) = impl_item {
                self.add_constant(
                    constant.ident.to_string(),
                    &constant.ty,
                    &constant.expr,
                    self_type.as_deref(),
                );
            }
        }
    }
}

/// Last path segment of a type, looking through references.
fn simple_type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        syn::Type::Reference(reference) => simple_type_name(&reference.elem),
        syn::Type::Paren(paren) => simple_type_name(&paren.elem),
        _ => None,
    }
}

/// `"lit"`, `Type("lit")` or `Self("lit")`.
fn string_literal(expr: &syn::Expr, type_name: &str) -> Option<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(text),
            ..
        }) => Some(text.value()),
        syn::Expr::Call(call) if call.args.len() == 1 => {
            let syn::Expr::Path(func) = call.func.as_ref() else {
                return None;
            };
            let callee = func.path.segments.last()?.ident.to_string();
            if callee == type_name || callee == "Self" {
                string_literal(&call.args[0], type_name)
            } else {
                None
            }
        }
        syn::Expr::Paren(paren) => string_literal(&paren.expr, type_name),
        syn::Expr::Group(group) => string_literal(&group.expr, type_name),
        _ => None,
    }
}
