//! Schema Loader
//!
//! Two-pass loading for canonical hashing:
//! 1. Read raw bytes, compute the content hash.
//! 2. Deserialize YAML into a typed `DocumentSchema`.
//! Then run the structural integrity check before the schema is released
//! to callers, so a broken schema fails at load time rather than
//! mid-conversation.
//!
//! `SchemaSource` is the seam embedding hosts implement when schemas live
//! somewhere other than a local directory (database, object store). Both
//! shipped implementations resolve fully at construction; `load` is a
//! registry lookup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{SchemaError, SchemaResult};

use super::DocumentSchema;

// ---------------------------------------------------------------------------
// File / byte loading
// ---------------------------------------------------------------------------

/// Load a single document schema from a YAML file.
///
/// Returns `(schema, content_hash)`.
pub fn load_schema_from_file(path: &Path) -> SchemaResult<(DocumentSchema, String)> {
    let raw_bytes = std::fs::read(path).map_err(|e| SchemaError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_schema_named(&raw_bytes, &path.display().to_string())
}

/// Load a document schema from raw YAML bytes (useful for testing and for
/// embedded schemas).
pub fn load_schema_from_bytes(raw_bytes: &[u8]) -> SchemaResult<(DocumentSchema, String)> {
    load_schema_named(raw_bytes, "<bytes>")
}

fn load_schema_named(raw_bytes: &[u8], origin: &str) -> SchemaResult<(DocumentSchema, String)> {
    let hash = DocumentSchema::content_hash(raw_bytes);
    let schema: DocumentSchema =
        serde_yaml::from_slice(raw_bytes).map_err(|e| SchemaError::Parse {
            path: origin.to_string(),
            source: e,
        })?;
    schema
        .validate_integrity()
        .map_err(|issues| SchemaError::Invalid {
            document_type: schema.document_type.clone(),
            issues,
        })?;
    debug!(
        document_type = %schema.document_type,
        version = %schema.version,
        hash = %hash,
        fields = schema.field_count(),
        "schema loaded"
    );
    Ok((schema, hash))
}

// ---------------------------------------------------------------------------
// SchemaSource
// ---------------------------------------------------------------------------

/// Where the engine gets schemas from.
///
/// Implementations must be cheap to call repeatedly; the engine caches
/// what it receives but re-loads after its cache is dropped.
pub trait SchemaSource: Send + Sync {
    /// Resolve a document type to its schema.
    fn load(&self, document_type: &str) -> SchemaResult<Arc<DocumentSchema>>;
}

// ---------------------------------------------------------------------------
// DirectorySchemaSource
// ---------------------------------------------------------------------------

/// Schema source backed by a directory of `*.yaml` / `*.yml` files
/// (non-recursive). Every file is loaded and integrity-checked up front;
/// the registry key is the `document_type` declared INSIDE each file, not
/// the file name.
#[derive(Debug)]
pub struct DirectorySchemaSource {
    schemas: HashMap<String, Arc<DocumentSchema>>,
    hashes: HashMap<String, String>,
}

impl DirectorySchemaSource {
    pub fn new(dir: &Path) -> SchemaResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| SchemaError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        // Sort paths so duplicate-type detection reports deterministically.
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SchemaError::Io {
                path: dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if ext == "yaml" || ext == "yml" {
                    paths.push(path);
                }
            }
        }
        paths.sort();

        let mut schemas = HashMap::new();
        let mut hashes = HashMap::new();
        for path in &paths {
            let (schema, hash) = load_schema_from_file(path)?;
            let document_type = schema.document_type.clone();
            if schemas.insert(document_type.clone(), Arc::new(schema)).is_some() {
                return Err(SchemaError::Invalid {
                    document_type: document_type.clone(),
                    issues: vec![format!(
                        "document type '{}' declared by more than one file in {}",
                        document_type,
                        dir.display()
                    )],
                });
            }
            hashes.insert(document_type, hash);
        }

        Ok(Self { schemas, hashes })
    }

    /// Content hash of a registered schema's file.
    pub fn hash_of(&self, document_type: &str) -> Option<&str> {
        self.hashes.get(document_type).map(String::as_str)
    }

    /// Registered document types, sorted.
    pub fn document_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.schemas.keys().cloned().collect();
        types.sort();
        types
    }
}

impl SchemaSource for DirectorySchemaSource {
    fn load(&self, document_type: &str) -> SchemaResult<Arc<DocumentSchema>> {
        self.schemas
            .get(document_type)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownDocumentType {
                document_type: document_type.to_string(),
                available: self.document_types(),
            })
    }
}

// ---------------------------------------------------------------------------
// StaticSchemaSource
// ---------------------------------------------------------------------------

/// In-memory schema source for tests and embedding hosts that construct
/// schemas programmatically.
#[derive(Default)]
pub struct StaticSchemaSource {
    schemas: HashMap<String, Arc<DocumentSchema>>,
}

impl StaticSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: DocumentSchema) -> Self {
        self.schemas
            .insert(schema.document_type.clone(), Arc::new(schema));
        self
    }
}

impl SchemaSource for StaticSchemaSource {
    fn load(&self, document_type: &str) -> SchemaResult<Arc<DocumentSchema>> {
        self.schemas
            .get(document_type)
            .cloned()
            .ok_or_else(|| {
                let mut available: Vec<String> = self.schemas.keys().cloned().collect();
                available.sort();
                SchemaError::UnknownDocumentType {
                    document_type: document_type.to_string(),
                    available,
                }
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
