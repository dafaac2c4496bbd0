//! Document Schema Types
//!
//! A document schema is the product-level contract between a business
//! document (Project Charter, Statement of Work, ...) and the intake
//! engine. It defines the ordered fields to capture, per-field validation
//! policy, and which conversation commands are enabled.
//!
//! # Canonical Hashing
//!
//! `content_hash()` hashes the **raw YAML file bytes** (not serde
//! re-serialization). This guarantees determinism regardless of serde_yaml
//! version or map ordering quirks.
//!
//! # Field Order
//!
//! The order of `fields` in the schema IS the presentation order. The
//! engine walks fields by index; there is no separate ordering key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod loader;

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// The shape of an expected field value. Drives validation and
/// normalization dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    ShortText,
    LongText,
    Date,
    PersonName,
    ObjectList,
}

// ---------------------------------------------------------------------------
// CustomRule
// ---------------------------------------------------------------------------

/// A named validation rule beyond the basic type checks.
///
/// Rules travel in schema files as wire names (`no_special_chars_start`,
/// `min_word_count_10`). The numeric suffix of `min_word_count_<N>` is the
/// word threshold; any N >= 1 is accepted. Unknown names are rejected when
/// the schema is parsed, never silently ignored at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomRule {
    /// First character of the value must be alphanumeric.
    NoSpecialCharsStart,
    /// Value must contain at least this many whitespace-delimited words.
    MinWordCount(usize),
}

impl CustomRule {
    /// Parse a wire name into a typed rule. Returns `None` for unknown
    /// names and for `min_word_count_0`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "no_special_chars_start" => Some(Self::NoSpecialCharsStart),
            _ => name
                .strip_prefix("min_word_count_")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .map(Self::MinWordCount),
        }
    }

    /// The wire name this rule serializes to.
    pub fn wire_name(&self) -> String {
        match self {
            Self::NoSpecialCharsStart => "no_special_chars_start".to_string(),
            Self::MinWordCount(n) => format!("min_word_count_{}", n),
        }
    }
}

impl Serialize for CustomRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire_name())
    }
}

impl<'de> Deserialize<'de> for CustomRule {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        CustomRule::parse(&name).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown custom rule '{}'", name))
        })
    }
}

// ---------------------------------------------------------------------------
// FieldDefinition
// ---------------------------------------------------------------------------

/// Validation policy attached to a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Regex the whole value must match. Verified to compile when the
    /// schema is loaded.
    pub pattern: Option<String>,

    /// Extra named rules, evaluated after the type checks.
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

/// A single field the conversation captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Stable key this answer is stored under (e.g. "project_name").
    pub id: String,

    /// Human-readable label shown in prompts and previews.
    pub label: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Required fields need an explicit skip confirmation and are flagged
    /// as gaps in the end review.
    #[serde(default)]
    pub required: bool,

    /// Minimum length of the trimmed value (text types).
    pub min_length: Option<usize>,

    /// Maximum length of the trimmed value. Person names fall back to 100
    /// when unset.
    pub max_length: Option<usize>,

    #[serde(default)]
    pub validation: FieldValidation,

    /// Child fields. Only `object_list` fields carry children, and
    /// children must not nest further lists.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    /// Optional guidance appended to the field prompt.
    pub hint: Option<String>,
}

impl FieldDefinition {
    /// Effective maximum length for validation purposes.
    pub fn effective_max_length(&self) -> Option<usize> {
        match self.field_type {
            FieldType::PersonName => Some(self.max_length.unwrap_or(100)),
            _ => self.max_length,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentSchema (top-level)
// ---------------------------------------------------------------------------

/// Presentation metadata for the conversation greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Document title (e.g. "Project Charter").
    pub title: String,

    /// Rough completion estimate quoted in the greeting.
    pub estimated_time_minutes: u32,
}

/// Whether a conversation command is available for this document, and the
/// description the help screen shows for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub description: String,
}

fn default_true() -> bool {
    true
}

/// A document schema loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSchema {
    /// Key the schema is registered under (e.g. "project_charter").
    pub document_type: String,

    pub version: String,

    pub metadata: SchemaMetadata,

    /// Command table keyed by command word. BTreeMap keeps help output
    /// deterministic.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,

    /// Ordered fields to capture.
    pub fields: Vec<FieldDefinition>,
}

impl DocumentSchema {
    /// Number of top-level fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field at the given position, if any.
    pub fn field_at(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    /// Position of a top-level field by id.
    pub fn position_of(&self, field_id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == field_id)
    }

    /// Top-level field ids in presentation order.
    pub fn field_ids(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.id.as_str()).collect()
    }

    /// Enabled commands as (word, description), in key order.
    pub fn enabled_commands(&self) -> Vec<(&str, &str)> {
        self.commands
            .iter()
            .filter(|(_, spec)| spec.enabled)
            .map(|(word, spec)| (word.as_str(), spec.description.as_str()))
            .collect()
    }

    /// Deterministic hash of the raw YAML file bytes.
    ///
    /// We hash the **original file bytes**, NOT a serde re-serialization.
    /// This guarantees: same file bytes => same hash, always, regardless
    /// of serde_yaml version or map key ordering.
    pub fn content_hash(raw_yaml_bytes: &[u8]) -> String {
        let hash = Sha256::digest(raw_yaml_bytes);
        format!("{:x}", hash)
    }

    /// Structural integrity check, run once at load time.
    ///
    /// Collects every issue rather than stopping at the first, so schema
    /// authors see the full repair list in one pass.
    pub fn validate_integrity(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.fields.is_empty() {
            issues.push("schema has no fields".to_string());
        }

        let mut seen_ids: Vec<&str> = Vec::new();
        for field in &self.fields {
            check_field(field, false, &mut seen_ids, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_field<'a>(
    field: &'a FieldDefinition,
    is_child: bool,
    seen_ids: &mut Vec<&'a str>,
    issues: &mut Vec<String>,
) {
    if field.id.trim().is_empty() {
        issues.push("field with empty id".to_string());
    } else if seen_ids.contains(&field.id.as_str()) {
        issues.push(format!("duplicate field id '{}'", field.id));
    } else {
        seen_ids.push(&field.id);
    }

    if let (Some(min), Some(max)) = (field.min_length, field.max_length) {
        if min > max {
            issues.push(format!(
                "field '{}': min_length {} exceeds max_length {}",
                field.id, min, max
            ));
        }
    }

    if let Some(pattern) = &field.validation.pattern {
        if let Err(e) = regex::Regex::new(pattern) {
            issues.push(format!("field '{}': pattern does not compile: {}", field.id, e));
        }
    }

    match field.field_type {
        FieldType::ObjectList => {
            if is_child {
                issues.push(format!(
                    "field '{}': object_list children must not nest further lists",
                    field.id
                ));
            }
            if field.fields.is_empty() {
                issues.push(format!("field '{}': object_list declares no child fields", field.id));
            }
            for child in &field.fields {
                check_field(child, true, seen_ids, issues);
            }
        }
        _ => {
            if !field.fields.is_empty() {
                issues.push(format!(
                    "field '{}': only object_list fields may declare children",
                    field.id
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test fixtures (shared by validator / machine tests)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_field(id: &str) -> FieldDefinition {
        FieldDefinition {
            id: id.to_string(),
            label: id.to_string(),
            field_type: FieldType::ShortText,
            required: false,
            min_length: None,
            max_length: None,
            validation: FieldValidation::default(),
            fields: Vec::new(),
            hint: None,
        }
    }

    fn bare_schema(fields: Vec<FieldDefinition>) -> DocumentSchema {
        DocumentSchema {
            document_type: "test_doc".to_string(),
            version: "1".to_string(),
            metadata: SchemaMetadata {
                title: "Test Doc".to_string(),
                estimated_time_minutes: 5,
            },
            commands: BTreeMap::new(),
            fields,
        }
    }

    #[test]
    fn test_custom_rule_parse_known_names() {
        assert_eq!(
            CustomRule::parse("no_special_chars_start"),
            Some(CustomRule::NoSpecialCharsStart)
        );
        assert_eq!(
            CustomRule::parse("min_word_count_10"),
            Some(CustomRule::MinWordCount(10))
        );
        assert_eq!(
            CustomRule::parse("min_word_count_1"),
            Some(CustomRule::MinWordCount(1))
        );
    }

    #[test]
    fn test_custom_rule_parse_rejects_unknown() {
        assert_eq!(CustomRule::parse("shouty_case_only"), None);
        assert_eq!(CustomRule::parse("min_word_count_"), None);
        assert_eq!(CustomRule::parse("min_word_count_0"), None);
        assert_eq!(CustomRule::parse("min_word_count_ten"), None);
    }

    #[test]
    fn test_custom_rule_wire_name_round_trip() {
        for rule in [CustomRule::NoSpecialCharsStart, CustomRule::MinWordCount(15)] {
            assert_eq!(CustomRule::parse(&rule.wire_name()), Some(rule));
        }
    }

    #[test]
    fn test_custom_rule_deserialize_unknown_fails() {
        let err = serde_yaml::from_str::<CustomRule>("all_caps").unwrap_err();
        assert!(err.to_string().contains("unknown custom rule 'all_caps'"));
    }

    #[test]
    fn test_field_type_snake_case_wire_names() {
        let ty: FieldType = serde_yaml::from_str("person_name").unwrap();
        assert_eq!(ty, FieldType::PersonName);
        let ty: FieldType = serde_yaml::from_str("object_list").unwrap();
        assert_eq!(ty, FieldType::ObjectList);
    }

    #[test]
    fn test_effective_max_length_person_name_default() {
        let mut field = bare_field("owner");
        field.field_type = FieldType::PersonName;
        assert_eq!(field.effective_max_length(), Some(100));

        field.max_length = Some(40);
        assert_eq!(field.effective_max_length(), Some(40));

        let plain = bare_field("notes");
        assert_eq!(plain.effective_max_length(), None);
    }

    #[test]
    fn test_integrity_accepts_well_formed_schema() {
        let schema = bare_schema(vec![bare_field("a"), bare_field("b")]);
        assert!(schema.validate_integrity().is_ok());
    }

    #[test]
    fn test_integrity_rejects_empty_field_list() {
        let schema = bare_schema(Vec::new());
        let issues = schema.validate_integrity().unwrap_err();
        assert_eq!(issues, vec!["schema has no fields".to_string()]);
    }

    #[test]
    fn test_integrity_rejects_duplicate_ids_across_children() {
        let mut group = bare_field("milestones");
        group.field_type = FieldType::ObjectList;
        group.fields = vec![bare_field("title"), bare_field("title")];
        let schema = bare_schema(vec![group]);

        let issues = schema.validate_integrity().unwrap_err();
        assert!(issues.iter().any(|i| i.contains("duplicate field id 'title'")));
    }

    #[test]
    fn test_integrity_rejects_nested_object_list() {
        let mut inner = bare_field("inner");
        inner.field_type = FieldType::ObjectList;
        inner.fields = vec![bare_field("leaf")];

        let mut outer = bare_field("outer");
        outer.field_type = FieldType::ObjectList;
        outer.fields = vec![inner];

        let schema = bare_schema(vec![outer]);
        let issues = schema.validate_integrity().unwrap_err();
        assert!(issues.iter().any(|i| i.contains("must not nest further lists")));
    }

    #[test]
    fn test_integrity_rejects_children_on_scalar_field() {
        let mut field = bare_field("name");
        field.fields = vec![bare_field("sub")];
        let schema = bare_schema(vec![field]);

        let issues = schema.validate_integrity().unwrap_err();
        assert!(issues.iter().any(|i| i.contains("only object_list fields")));
    }

    #[test]
    fn test_integrity_rejects_bad_pattern_and_length_bounds() {
        let mut field = bare_field("date");
        field.validation.pattern = Some("^[unclosed".to_string());
        field.min_length = Some(10);
        field.max_length = Some(2);
        let schema = bare_schema(vec![field]);

        let issues = schema.validate_integrity().unwrap_err();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.contains("pattern does not compile")));
        assert!(issues.iter().any(|i| i.contains("min_length 10 exceeds max_length 2")));
    }

    #[test]
    fn test_enabled_commands_sorted_and_filtered() {
        let mut schema = bare_schema(vec![bare_field("a")]);
        schema.commands.insert(
            "skip".to_string(),
            CommandSpec {
                enabled: true,
                description: "Skip".to_string(),
            },
        );
        schema.commands.insert(
            "back".to_string(),
            CommandSpec {
                enabled: true,
                description: "Back".to_string(),
            },
        );
        schema.commands.insert(
            "preview".to_string(),
            CommandSpec {
                enabled: false,
                description: "Preview".to_string(),
            },
        );

        let commands = schema.enabled_commands();
        assert_eq!(commands, vec![("back", "Back"), ("skip", "Skip")]);
    }

    #[test]
    fn test_content_hash_is_raw_bytes_not_reserialization() {
        let yaml_a = b"document_type: x\nversion: '1'\n";
        let yaml_b = b"document_type:  x\nversion:  '1'\n";

        assert_ne!(
            DocumentSchema::content_hash(yaml_a),
            DocumentSchema::content_hash(yaml_b)
        );
        assert_eq!(DocumentSchema::content_hash(yaml_a).len(), 64);
    }
}
