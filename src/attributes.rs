//! Member and container metadata.
//!
//! Field attributes are kept as raw token text per channel (`serde`,
//! `openapi`, `validate`, `garde`) and interpreted lazily. Hints are applied
//! in a fixed order, `openapi` first, then `validate`, then `garde`; a later
//! channel overwrites the format set by an earlier one.

use crate::schema::Schema;
use log::debug;
use serde_json::Value;

/// Raw attribute text of one member, grouped by channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberMetadata {
    pub serde: Option<String>,
    pub openapi: Option<String>,
    pub validate: Option<String>,
    pub garde: Option<String>,
}

/// Serialization directives read from a `#[serde(..)]` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeHints {
    pub rename: Option<String>,
    pub rename_all: Option<RenameRule>,
    /// `skip` or `skip_serializing`.
    pub skip: bool,
    /// `skip_serializing_if` or `default`: the value may be absent.
    pub omit_if_empty: bool,
    pub flatten: bool,
}

/// Case conventions accepted by `rename_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl MemberMetadata {
    /// Collects the metadata channels from a list of attributes. Repeated
    /// attributes of one channel are joined with `, `.
    pub fn from_attrs(attrs: &[syn::Attribute]) -> Self {
        let mut metadata = MemberMetadata::default();

        for attr in attrs {
            let slot = if attr.path().is_ident("serde") {
                &mut metadata.serde
            } else if attr.path().is_ident("openapi") {
                &mut metadata.openapi
            } else if attr.path().is_ident("validate") {
                &mut metadata.validate
            } else if attr.path().is_ident("garde") {
                &mut metadata.garde
            } else {
                continue;
            };

            if let Ok(list) = attr.meta.require_list() {
                let tokens = list.tokens.to_string();
                match slot {
                    Some(existing) => {
                        existing.push_str(", ");
                        existing.push_str(&tokens);
                    }
                    None => *slot = Some(tokens),
                }
            }
        }

        metadata
    }

    pub fn is_empty(&self) -> bool {
        self.serde.is_none()
            && self.openapi.is_none()
            && self.validate.is_none()
            && self.garde.is_none()
    }

    pub fn serde_hints(&self) -> SerdeHints {
        SerdeHints::parse(self.serde.as_deref())
    }
}

impl SerdeHints {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut hints = SerdeHints::default();
        let Some(raw) = raw else {
            return hints;
        };

        for item in split_items(raw) {
            let (key, value) = key_value(&item);
            match (key.as_str(), value) {
                ("rename", Some(value)) => hints.rename = Some(value),
                ("rename_all", Some(value)) => {
                    hints.rename_all = RenameRule::parse(&value);
                    if hints.rename_all.is_none() {
                        debug!("Unknown rename_all rule: {}", value);
                    }
                }
                ("skip" | "skip_serializing", _) => hints.skip = true,
                ("skip_serializing_if" | "default", _) => hints.omit_if_empty = true,
                ("flatten", _) => hints.flatten = true,
                _ => {}
            }
        }

        hints
    }
}

impl RenameRule {
    pub fn parse(rule: &str) -> Option<Self> {
        match rule {
            "lowercase" => Some(RenameRule::Lower),
            "UPPERCASE" => Some(RenameRule::Upper),
            "PascalCase" => Some(RenameRule::Pascal),
            "camelCase" => Some(RenameRule::Camel),
            "snake_case" => Some(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnake),
            "kebab-case" => Some(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Some(RenameRule::ScreamingKebab),
            _ => None,
        }
    }

    /// Renames a snake_case field name.
    pub fn apply_to_field(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => capitalize_words(field, true),
            RenameRule::Camel => capitalize_words(field, false),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.replace('_', "-").to_ascii_uppercase(),
        }
    }

    /// Renames a PascalCase variant name.
    pub fn apply_to_variant(self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => {
                let mut chars = variant.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
            RenameRule::Snake => split_pascal(variant).join("_"),
            RenameRule::ScreamingSnake => split_pascal(variant).join("_").to_ascii_uppercase(),
            RenameRule::Kebab => split_pascal(variant).join("-"),
            RenameRule::ScreamingKebab => split_pascal(variant).join("-").to_ascii_uppercase(),
        }
    }
}

fn capitalize_words(field: &str, capitalize_first: bool) -> String {
    let mut result = String::with_capacity(field.len());
    let mut upper_next = capitalize_first;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            result.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

/// `HttpStatusCode` -> `["http", "status", "code"]`.
fn split_pascal(name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for ch in name.chars() {
        if ch.is_ascii_uppercase() || words.is_empty() {
            words.push(ch.to_ascii_lowercase().to_string());
        } else if let Some(word) = words.last_mut() {
            word.push(ch);
        }
    }
    words
}

/// Splits attribute tokens on top-level commas, ignoring commas inside
/// string literals and parentheses.
pub fn split_items(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if in_string {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                let item = current.trim();
                if !item.is_empty() {
                    items.push(item.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let item = current.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
    items
}

/// `key = "value"` -> (`key`, `Some(value)`); `flag` -> (`flag`, `None`).
/// String literal quotes are removed from the value.
pub fn key_value(item: &str) -> (String, Option<String>) {
    match item.split_once('=') {
        Some((key, value)) => (key.trim().to_string(), Some(unquote(value.trim()))),
        None => (item.trim().to_string(), None),
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].replace("\\\"", "\"")
    } else {
        value.to_string()
    }
}

/// Quoted values stay strings; bare values are read as JSON literals when
/// they parse as one.
fn literal_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        return Value::String(unquote(trimmed));
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Applies every metadata channel to a member schema.
pub fn apply_hints(schema: &mut Schema, metadata: &MemberMetadata) {
    if let Some(openapi) = metadata.openapi.as_deref() {
        apply_openapi_hints(schema, openapi);
    }
    if let Some(validate) = metadata.validate.as_deref() {
        apply_validation_formats(schema, validate);
    }
    if let Some(garde) = metadata.garde.as_deref() {
        apply_binding_formats(schema, garde);
    }
}

/// `#[openapi(format = "email", minimum = 1, enum = "a|b", read_only = true)]`
pub fn apply_openapi_hints(schema: &mut Schema, raw: &str) {
    for item in split_items(raw) {
        let Some((key, raw_value)) = item.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(raw_value.trim());

        match key {
            "format" => schema.format = Some(value),
            "pattern" => schema.pattern = Some(value),
            "title" => schema.title = Some(value),
            "example" => schema.example = Some(literal_value(raw_value)),
            "default" => schema.default = Some(literal_value(raw_value)),
            "deprecated" => schema.deprecated = flag(&value).or(schema.deprecated),
            "readOnly" | "read_only" => schema.read_only = flag(&value).or(schema.read_only),
            "writeOnly" | "write_only" => schema.write_only = flag(&value).or(schema.write_only),
            "uniqueItems" | "unique_items" => {
                schema.unique_items = flag(&value).or(schema.unique_items)
            }
            "minimum" => schema.minimum = value.parse().ok().or(schema.minimum),
            "maximum" => schema.maximum = value.parse().ok().or(schema.maximum),
            "minLength" | "min_length" => schema.min_length = value.parse().ok().or(schema.min_length),
            "maxLength" | "max_length" => schema.max_length = value.parse().ok().or(schema.max_length),
            "minItems" | "min_items" => schema.min_items = value.parse().ok().or(schema.min_items),
            "maxItems" | "max_items" => schema.max_items = value.parse().ok().or(schema.max_items),
            "enum" => {
                schema.enum_values = value
                    .split('|')
                    .map(|v| Value::String(v.trim().to_string()))
                    .collect();
            }
            other => debug!("Ignoring unknown openapi hint: {}", other),
        }
    }
}

fn flag(value: &str) -> Option<bool> {
    (value == "true").then_some(true)
}

/// Payload-validation channel: only well-known formats are derived.
pub fn apply_validation_formats(schema: &mut Schema, raw: &str) {
    if raw.contains("email") {
        schema.format = Some("email".to_string());
    }
    if raw.contains("uuid") {
        schema.format = Some("uuid".to_string());
    }
    if raw.contains("uri") || raw.contains("url") {
        schema.format = Some("uri".to_string());
    }
}

/// Request-binding channel, applied last.
pub fn apply_binding_formats(schema: &mut Schema, raw: &str) {
    if raw.contains("email") {
        schema.format = Some("email".to_string());
    }
    if raw.contains("uuid") {
        schema.format = Some("uuid".to_string());
    }
}

/// Concatenated `///` doc comment text, one line per attribute.
pub fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines = doc_lines(attrs);
    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Raw `///` lines with the single leading space removed.
pub fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(name_value) => match &name_value.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(text),
                    ..
                }) => Some(text.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(line.as_str()).trim_end().to_string())
        .collect()
}
