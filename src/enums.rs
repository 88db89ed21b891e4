//! String enumeration detection.
//!
//! Two shapes are recognized. A string alias (`type Status = &'static str;`
//! or `struct Status(&'static str);`) becomes an enum when constants of
//! exactly that type with string literal values are declared in the same
//! scope. A Rust `enum` is an enum by construction; its wire names follow
//! serde's `rename` and `rename_all`.

use crate::attributes::SerdeHints;
use crate::schema::Schema;
use crate::type_index::{Definition, TypeDescriptorProvider, Variant};
use log::debug;

/// Enum schema for a string alias with sibling constants, `None` otherwise.
///
/// Unknown names and aliases without any discoverable value are not enums.
pub fn detect_enum(provider: &dyn TypeDescriptorProvider, qualified: &str) -> Option<Schema> {
    let declaration = provider.describe(qualified)?;

    let Definition::Alias(target) = &declaration.definition else {
        return None;
    };
    if !target.is_string() {
        return None;
    }

    let values: Vec<String> = provider
        .constants_in(&declaration.scope)
        .iter()
        .filter(|constant| constant.type_name == declaration.name)
        .filter_map(|constant| constant.string_literal.clone())
        .collect();

    if values.is_empty() {
        debug!("{} is a string alias with no constants", qualified);
        return None;
    }

    debug!("{} detected as enum with {} values", qualified, values.len());
    Some(Schema::string_enum(values).with_description(format!("Enum type {}", qualified)))
}

/// Serialized name of an enum variant.
pub fn variant_wire_name(variant: &Variant, container: &SerdeHints) -> String {
    let hints = variant.metadata.serde_hints();
    if let Some(rename) = hints.rename {
        return rename;
    }
    match container.rename_all {
        Some(rule) => rule.apply_to_variant(&variant.name),
        None => variant.name.clone(),
    }
}
