//! Guided document intake engine
//!
//! Walks a user through a schema-defined form one field at a time, with
//! back/edit/skip/preview/confirm semantics, per-field validation and
//! normalization, and a deterministic transition table.
//!
//! One call does one turn: the host feeds the previous state snapshot
//! and the raw user message into [`IntakeEngine::process`] and gets back
//! a new snapshot plus a discriminated [`TurnAction`] to render. The
//! engine owns no session storage and produces no prose; persistence and
//! message templating stay with the embedding host.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guided_intake::{DirectorySchemaSource, IntakeEngine};
//!
//! let source = DirectorySchemaSource::new("config/schemas".as_ref()).unwrap();
//! let engine = IntakeEngine::new(Arc::new(source));
//!
//! let turn = engine.process(None, "hello", "project_charter");
//! println!("{}", turn.action.kind()); // ask_field
//! ```

// Schema boundary errors
pub mod error;

// Document schemas: field definitions, custom rules, YAML loading
pub mod schema;

// Pure per-field helpers
pub mod intent;
pub mod normalize;
pub mod validate;

// The conversation state machine
pub mod machine;

pub use error::{SchemaError, SchemaResult};
pub use intent::{parse_intent, Intent};
pub use machine::{
    ConversationPhase, ConversationState, IntakeEngine, PendingAction, TurnAction, TurnResponse,
};
pub use normalize::normalize_value;
pub use schema::loader::{DirectorySchemaSource, SchemaSource, StaticSchemaSource};
pub use schema::{CustomRule, DocumentSchema, FieldDefinition, FieldType};
pub use validate::{validate_field, ValidationOutcome};
