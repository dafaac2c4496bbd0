//! Field validation
//!
//! Validates one raw answer against one field definition. Pure function
//! of its inputs: no clock, no IO, no logging, so a re-ask of the same
//! value always produces the same outcome.
//!
//! Checks run in a fixed order and accumulate. The only short-circuit is
//! the empty check: a missing required value reports exactly one error,
//! and a missing optional value is trivially valid with no further rules
//! applied.

use chrono::NaiveDate;
use regex::Regex;

use crate::schema::{CustomRule, FieldDefinition, FieldType};

/// Calendar formats an already pattern-matched date value may use.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y"];

/// Outcome of validating one answer against one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Validate a raw answer against a field definition.
pub fn validate_field(field: &FieldDefinition, value: &str) -> ValidationOutcome {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        if field.required {
            return ValidationOutcome::fail(vec![format!(
                "{} is required and cannot be empty",
                field.label
            )]);
        }
        return ValidationOutcome::ok();
    }

    let mut errors = Vec::new();

    match field.field_type {
        FieldType::ShortText | FieldType::LongText | FieldType::PersonName => {
            check_length(field, trimmed, &mut errors);
        }
        // Dates are checked by pattern and calendar parse below; list
        // groups accept any non-empty value at this layer.
        FieldType::Date | FieldType::ObjectList => {}
    }

    let mut pattern_matched = true;
    if let Some(pattern) = &field.validation.pattern {
        // Compile is verified at schema load; an uncompilable pattern
        // cannot reach here through the loader.
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(trimmed) {
                pattern_matched = false;
                errors.push(match &field.hint {
                    Some(hint) => format!("{} must match the format {}", field.label, hint),
                    None => format!("{} is not in the expected format", field.label),
                });
            }
        }
    }

    if field.field_type == FieldType::Date && pattern_matched {
        let parses = DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(trimmed, fmt).is_ok());
        if !parses {
            errors.push(format!("{} is not a real calendar date", field.label));
        }
    }

    for rule in &field.validation.custom_rules {
        check_custom_rule(field, rule, trimmed, &mut errors);
    }

    if errors.is_empty() {
        ValidationOutcome::ok()
    } else {
        ValidationOutcome::fail(errors)
    }
}

fn check_length(field: &FieldDefinition, trimmed: &str, errors: &mut Vec<String>) {
    let len = trimmed.chars().count();

    if let Some(min) = field.min_length {
        if len < min {
            errors.push(format!(
                "{} must be at least {} characters",
                field.label, min
            ));
        }
    }

    if let Some(max) = field.effective_max_length() {
        if len > max {
            errors.push(format!("{} must be at most {} characters", field.label, max));
        }
    }
}

fn check_custom_rule(
    field: &FieldDefinition,
    rule: &CustomRule,
    trimmed: &str,
    errors: &mut Vec<String>,
) {
    match rule {
        CustomRule::NoSpecialCharsStart => {
            let starts_clean = trimmed
                .chars()
                .next()
                .map(char::is_alphanumeric)
                .unwrap_or(false);
            if !starts_clean {
                errors.push(format!(
                    "{} must start with a letter or number",
                    field.label
                ));
            }
        }
        CustomRule::MinWordCount(n) => {
            let words = trimmed.split_whitespace().count();
            if words < *n {
                errors.push(format!("{} needs at least {} words", field.label, n));
            }
        }
    }
}
