//! Conversation session state
//!
//! All types in this module are serializable and designed for:
//! - Transition snapshots (owned state in, new state out)
//! - Session-store persistence between turns
//! - Audit trail of confirmations, skips and revisits
//!
//! The flow a healthy session takes:
//! ```text
//! INIT ── schema loaded ──► ASK ── answer ──► VALIDATE ── invalid ──► (re-ask)
//!                            ▲                    │
//!                            │                  valid
//!                   BACK / EDIT_PREVIOUS          ▼
//!                            │               CONFIRM ── no ──► CAPTURE
//!                            │                    │ yes
//!                            │                    ▼
//!                            └── SKIP ◄──── NEXT_FIELD ──► END_REVIEW ──► FINALIZE
//!
//! CANCELLED is reachable from any point and terminal.
//! ```

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ConversationPhase
// ============================================================================

/// Marker recording which transition produced the current snapshot.
///
/// Dispatch is driven by `(intent, pending)`, not by this marker. The
/// engine reads it in exactly two places: `Init` re-enters the session
/// start path, and `Cancelled` refuses further input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Init,
    Ask,
    Capture,
    Validate,
    Confirm,
    NextField,
    Back,
    EditPrevious,
    Skip,
    Preview,
    EndReview,
    Finalize,
    Cancelled,
}

impl ConversationPhase {
    /// Stable snake_case name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationPhase::Init => "init",
            ConversationPhase::Ask => "ask",
            ConversationPhase::Capture => "capture",
            ConversationPhase::Validate => "validate",
            ConversationPhase::Confirm => "confirm",
            ConversationPhase::NextField => "next_field",
            ConversationPhase::Back => "back",
            ConversationPhase::EditPrevious => "edit_previous",
            ConversationPhase::Skip => "skip",
            ConversationPhase::Preview => "preview",
            ConversationPhase::EndReview => "end_review",
            ConversationPhase::Finalize => "finalize",
            ConversationPhase::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// PendingAction
// ============================================================================

/// What the engine is waiting on the user to resolve.
///
/// A single sum type, so a value confirmation and a skip confirmation
/// cannot both be armed at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// Nothing pending; the next answer is captured normally.
    #[default]
    None,

    /// A validated value is held back until the user confirms it.
    AwaitingConfirmation { field_id: String, value: String },

    /// A required field's skip needs the user to repeat `skip`.
    AwaitingSkipConfirmation { field_id: String },
}

impl PendingAction {
    pub fn is_none(&self) -> bool {
        matches!(self, PendingAction::None)
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, PendingAction::AwaitingConfirmation { .. })
    }

    pub fn is_awaiting_skip(&self) -> bool {
        matches!(self, PendingAction::AwaitingSkipConfirmation { .. })
    }

    /// Field the pending interaction concerns, if any.
    pub fn field_id(&self) -> Option<&str> {
        match self {
            PendingAction::None => None,
            PendingAction::AwaitingConfirmation { field_id, .. }
            | PendingAction::AwaitingSkipConfirmation { field_id } => Some(field_id),
        }
    }
}

// ============================================================================
// Edit history
// ============================================================================

/// What happened to a field, for the audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    /// Value committed to `answers`.
    Confirmed,
    /// Skip committed.
    Skipped,
    /// Field re-opened via back or edit.
    Revisited,
}

/// Single entry in the append-only edit history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditRecord {
    pub field_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: EditAction,
}

impl EditRecord {
    pub fn now(field_id: impl Into<String>, action: EditAction) -> Self {
        Self {
            field_id: field_id.into(),
            timestamp: Utc::now(),
            action,
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Per-field ask/completion accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMetrics {
    /// Answer attempts received for this field, valid or not.
    pub ask_count: u32,

    /// When the first answer attempt arrived.
    pub started_at: DateTime<Utc>,

    /// When an answer last passed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FieldMetrics {
    fn started_now() -> Self {
        Self {
            ask_count: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Session-level metadata and metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub field_metrics: BTreeMap<String, FieldMetrics>,

    /// Total validation failures across all fields.
    #[serde(default)]
    pub total_re_asks: u32,
}

impl SessionMetadata {
    fn started_now() -> Self {
        Self {
            started_at: Utc::now(),
            field_metrics: BTreeMap::new(),
            total_re_asks: 0,
        }
    }
}

// ============================================================================
// ConversationState
// ============================================================================

/// Full per-session state, threaded by value through every turn.
///
/// The engine consumes the previous snapshot and returns a new one; the
/// caller persists or discards it. Invariant: `answers` and `skipped`
/// are disjoint. Committing an answer removes the id from `skipped`,
/// and skipping an already-answered field leaves `skipped` untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub session_id: Uuid,

    pub document_type: String,

    pub schema_version: String,

    pub phase: ConversationPhase,

    /// Pointer into the schema's field list. `== field_count` means past
    /// the last field (review/end).
    pub current_field_index: usize,

    /// Confirmed values only, keyed by field id.
    pub answers: BTreeMap<String, String>,

    /// Fields the user chose to leave blank.
    pub skipped: BTreeSet<String>,

    /// Append-only audit trail.
    pub edit_history: Vec<EditRecord>,

    pub pending: PendingAction,

    /// Set at end review when required fields remain unanswered.
    pub has_required_gaps: bool,

    pub metadata: SessionMetadata,

    pub last_active_at: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh state for a newly started session, pointed at the first
    /// field.
    pub fn new(document_type: impl Into<String>, schema_version: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            document_type: document_type.into(),
            schema_version: schema_version.into(),
            phase: ConversationPhase::Ask,
            current_field_index: 0,
            answers: BTreeMap::new(),
            skipped: BTreeSet::new(),
            edit_history: Vec::new(),
            pending: PendingAction::None,
            has_required_gaps: false,
            metadata: SessionMetadata::started_now(),
            last_active_at: Utc::now(),
        }
    }

    /// Inert placeholder returned when a session could not start. Stays
    /// in `Init` so the next turn re-enters the session start path.
    pub fn uninitialized(document_type: impl Into<String>) -> Self {
        let mut state = Self::new(document_type, "");
        state.phase = ConversationPhase::Init;
        state
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == ConversationPhase::Cancelled
    }

    /// Mark activity on this session.
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Append an audit trail entry.
    pub fn record_edit(&mut self, field_id: impl Into<String>, action: EditAction) {
        self.edit_history.push(EditRecord::now(field_id, action));
    }

    /// Count an answer attempt for a field, creating its metric record
    /// on the first attempt.
    pub fn record_ask(&mut self, field_id: &str) {
        let metrics = self
            .metadata
            .field_metrics
            .entry(field_id.to_string())
            .or_insert_with(FieldMetrics::started_now);
        metrics.ask_count += 1;
    }

    /// Mark a field's answer as having passed validation.
    pub fn record_completed(&mut self, field_id: &str) {
        if let Some(metrics) = self.metadata.field_metrics.get_mut(field_id) {
            metrics.completed_at = Some(Utc::now());
        }
    }

    /// Count a validation failure.
    pub fn record_re_ask(&mut self) {
        self.metadata.total_re_asks += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================
