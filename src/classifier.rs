//! Primitive and composite type classification.
//!
//! Declared Rust types are reduced to a small [`TypeExpr`] tree: optional
//! wrappers, sequences, string-keyed maps, opaque values and named
//! references. Smart pointers and borrows are transparent. Classification
//! never consults the declaration index.

use crate::schema::{Schema, SchemaType};
use std::fmt;

/// Path prefixes dropped when canonicalizing a type path.
const RELATIVE_SEGMENTS: &[&str] = &["crate", "self", "super"];

/// Crate roots under which a primitive name keeps its primitive meaning.
const STD_ROOTS: &[&str] = &["std", "core", "alloc"];

/// Normalized shape of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A primitive or a reference to some declared type, `scope.Name` or `Name`.
    Named(String),
    /// `Option<T>`. Transparent for the schema, makes a member optional.
    Optional(Box<TypeExpr>),
    /// `Vec<T>`, sets, slices and arrays.
    Array(Box<TypeExpr>),
    /// String-keyed map; holds the value type only.
    Map(Box<TypeExpr>),
    /// No structural information (`dyn Trait`, `impl Trait`, tuples, `()`).
    Any,
}

/// JSON Schema kind of a primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Integer,
    Number,
    Boolean,
    String,
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Primitive(PrimitiveKind),
    /// Sequence with the given element type.
    Array(TypeExpr),
    /// Map with the given value type.
    Map(TypeExpr),
    Any,
    /// Needs enum/struct resolution; carries the canonical type name.
    NotBasic(String),
}

impl PrimitiveKind {
    pub fn schema_type(self) -> SchemaType {
        match self {
            PrimitiveKind::Integer => SchemaType::Integer,
            PrimitiveKind::Number => SchemaType::Number,
            PrimitiveKind::Boolean => SchemaType::Boolean,
            PrimitiveKind::String => SchemaType::String,
        }
    }

    pub fn schema(self) -> Schema {
        Schema::of(self.schema_type())
    }
}

/// Looks a bare type name up in the fixed primitive table.
pub fn primitive_kind(name: &str) -> Option<PrimitiveKind> {
    match name {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => Some(PrimitiveKind::Integer),
        "f32" | "f64" => Some(PrimitiveKind::Number),
        "bool" => Some(PrimitiveKind::Boolean),
        "String" | "str" | "char" => Some(PrimitiveKind::String),
        _ => None,
    }
}

/// Classifies a type name written in Rust syntax (`Vec<Option<String>>`,
/// `models.User`, `HashMap<String, i64>`). Total: unknown input is `NotBasic`.
pub fn classify(type_name: &str) -> Classification {
    classify_expr(&TypeExpr::parse(type_name))
}

pub fn classify_expr(expr: &TypeExpr) -> Classification {
    match expr {
        TypeExpr::Optional(inner) => classify_expr(inner),
        TypeExpr::Array(element) => Classification::Array((**element).clone()),
        TypeExpr::Map(value) => Classification::Map((**value).clone()),
        TypeExpr::Any => Classification::Any,
        TypeExpr::Named(name) => match primitive_kind(name) {
            Some(kind) => Classification::Primitive(kind),
            None => Classification::NotBasic(name.clone()),
        },
    }
}

impl TypeExpr {
    /// Parses a type name. Both `.` and `::` are accepted as path separators;
    /// text that is not a valid Rust type becomes a `Named` carrying it verbatim.
    pub fn parse(input: &str) -> TypeExpr {
        let trimmed = input.trim();
        match syn::parse_str::<syn::Type>(&trimmed.replace('.', "::")) {
            Ok(ty) => TypeExpr::from_syn(&ty),
            Err(_) => TypeExpr::Named(trimmed.to_string()),
        }
    }

    /// Replaces every `Self` reference with `target`.
    pub fn with_self_type(self, target: &str) -> TypeExpr {
        match self {
            TypeExpr::Named(name) if name == "Self" => TypeExpr::Named(target.to_string()),
            TypeExpr::Optional(inner) => TypeExpr::Optional(Box::new(inner.with_self_type(target))),
            TypeExpr::Array(element) => TypeExpr::Array(Box::new(element.with_self_type(target))),
            TypeExpr::Map(value) => TypeExpr::Map(Box::new(value.with_self_type(target))),
            other => other,
        }
    }

    pub fn from_syn(ty: &syn::Type) -> TypeExpr {
        match ty {
            syn::Type::Path(type_path) if type_path.qself.is_none() => {
                Self::from_path(&type_path.path)
            }
            syn::Type::Reference(reference) => Self::from_syn(&reference.elem),
            syn::Type::Ptr(pointer) => Self::from_syn(&pointer.elem),
            syn::Type::Paren(paren) => Self::from_syn(&paren.elem),
            syn::Type::Group(group) => Self::from_syn(&group.elem),
            syn::Type::Slice(slice) => TypeExpr::Array(Box::new(Self::from_syn(&slice.elem))),
            syn::Type::Array(array) => TypeExpr::Array(Box::new(Self::from_syn(&array.elem))),
            _ => TypeExpr::Any,
        }
    }

    fn from_path(path: &syn::Path) -> TypeExpr {
        let Some(last) = path.segments.last() else {
            return TypeExpr::Any;
        };
        let ident = last.ident.to_string();
        let args = type_arguments(&last.arguments);

        match ident.as_str() {
            "Option" => match args.first() {
                Some(inner) => TypeExpr::Optional(Box::new(Self::from_syn(inner))),
                None => TypeExpr::Any,
            },
            "Box" | "Rc" | "Arc" | "Cow" | "RefCell" | "Cell" | "Mutex" | "RwLock" => {
                match args.first() {
                    Some(inner) => Self::from_syn(inner),
                    None => TypeExpr::Any,
                }
            }
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" => {
                match args.first() {
                    Some(inner) => TypeExpr::Array(Box::new(Self::from_syn(inner))),
                    None => TypeExpr::Array(Box::new(TypeExpr::Any)),
                }
            }
            "HashMap" | "BTreeMap" | "IndexMap" => match args.get(1) {
                Some(value) => TypeExpr::Map(Box::new(Self::from_syn(value))),
                None => TypeExpr::Map(Box::new(TypeExpr::Any)),
            },
            _ => TypeExpr::Named(canonical_path(path)),
        }
    }

    /// Whether the outermost wrapper is `Option`.
    pub fn is_optional(&self) -> bool {
        matches!(self, TypeExpr::Optional(_))
    }

    /// Strips `Option` wrappers.
    pub fn unwrap_optional(&self) -> &TypeExpr {
        match self {
            TypeExpr::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Name of the referenced type when this is a plain `Named`.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            TypeExpr::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.as_named().and_then(primitive_kind), Some(PrimitiveKind::String))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{}", name),
            TypeExpr::Optional(inner) => write!(f, "Option<{}>", inner),
            TypeExpr::Array(element) => write!(f, "Vec<{}>", element),
            TypeExpr::Map(value) => write!(f, "HashMap<String, {}>", value),
            TypeExpr::Any => write!(f, "_"),
        }
    }
}

/// Type arguments of a path segment, lifetimes and const arguments skipped.
fn type_arguments(arguments: &syn::PathArguments) -> Vec<&syn::Type> {
    match arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// `crate::models::User` -> `models.User`, `std::string::String` -> `String`.
fn canonical_path(path: &syn::Path) -> String {
    let segments: Vec<String> = path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .filter(|segment| !RELATIVE_SEGMENTS.contains(&segment.as_str()))
        .collect();

    let Some(last) = segments.last() else {
        return String::new();
    };

    if primitive_kind(last).is_some()
        && (segments.len() == 1 || STD_ROOTS.contains(&segments[0].as_str()))
    {
        return last.clone();
    }

    let start = segments.len().saturating_sub(2);
    segments[start..].join(".")
}
