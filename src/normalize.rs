//! Value normalization
//!
//! Canonicalizes a raw answer before validation and storage. Runs ahead
//! of validation in the answer path, so validators and previews always
//! see the canonical form. Idempotent: normalizing an already normalized
//! value is a no-op.

use crate::schema::{FieldDefinition, FieldType};

/// Normalize a raw answer for a field. Empty input is returned unchanged.
pub fn normalize_value(field: &FieldDefinition, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let trimmed = value.trim();
    match field.field_type {
        FieldType::Date => trimmed.replace('/', "-"),
        FieldType::PersonName => title_case(trimmed),
        FieldType::ShortText | FieldType::LongText | FieldType::ObjectList => trimmed.to_string(),
    }
}

/// First letter of each space-delimited word upper, rest lower. Interior
/// space runs are preserved as-is.
fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
