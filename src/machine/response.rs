//! Turn responses
//!
//! Every turn returns the new state snapshot plus a discriminated action
//! telling the host what happened. The renderer picks a message template
//! from the action kind; the engine itself produces no prose beyond the
//! short fixed strings carried by `Error`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::FieldDefinition;

use super::state::ConversationState;

// ---------------------------------------------------------------------------
// TurnResponse
// ---------------------------------------------------------------------------

/// The result of one turn: one user message in, one action out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    /// State after the turn. The caller persists this and threads it
    /// into the next call.
    pub state: ConversationState,

    /// What the renderer should show.
    pub action: TurnAction,
}

impl TurnResponse {
    pub(crate) fn new(state: ConversationState, action: TurnAction) -> Self {
        Self { state, action }
    }
}

// ---------------------------------------------------------------------------
// TurnAction
// ---------------------------------------------------------------------------

/// The type of action — determines how the host renders the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnAction {
    /// Prompt the user for a field. `greeting` is present only on the
    /// session's opening turn.
    AskField {
        field: FieldDefinition,
        #[serde(skip_serializing_if = "Option::is_none")]
        greeting: Option<Greeting>,
    },

    /// Echo a validated value back for confirmation before committing.
    ConfirmValue { field: FieldDefinition, value: String },

    /// The answer failed validation; same field will be asked again.
    ValidationError {
        field: FieldDefinition,
        errors: Vec<String>,
    },

    /// Warn that skipping this required field leaves a review gap; the
    /// user must repeat `skip` to commit.
    ConfirmSkip { field: FieldDefinition },

    /// Progress snapshot, in schema order throughout.
    ShowPreview {
        completed: Vec<PreviewEntry>,
        skipped: Vec<String>,
        remaining: Vec<String>,
    },

    /// All fields visited; advisory summary of gaps.
    EndReview {
        completed_fields: usize,
        total_fields: usize,
        required_gaps: Vec<String>,
        skipped_fields: Vec<String>,
    },

    /// Enabled commands for this document.
    ShowHelp { commands: Vec<CommandHelp> },

    /// Re-open the current field after a rejected confirmation.
    AskAgain { field: FieldDefinition },

    /// Something the user asked for could not be done.
    Error { message: String },

    /// Session abandoned.
    #[serde(rename = "cancel")]
    Cancelled,

    /// Skip issued past the last field; nothing left to capture.
    Complete,

    /// Snapshot handed to the document renderer.
    Finalized {
        answers: BTreeMap<String, String>,
        skipped_fields: Vec<String>,
        has_required_gaps: bool,
    },
}

impl TurnAction {
    /// Stable action name for logs and renderer dispatch.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnAction::AskField { .. } => "ask_field",
            TurnAction::ConfirmValue { .. } => "confirm_value",
            TurnAction::ValidationError { .. } => "validation_error",
            TurnAction::ConfirmSkip { .. } => "confirm_skip",
            TurnAction::ShowPreview { .. } => "show_preview",
            TurnAction::EndReview { .. } => "end_review",
            TurnAction::ShowHelp { .. } => "show_help",
            TurnAction::AskAgain { .. } => "ask_again",
            TurnAction::Error { .. } => "error",
            TurnAction::Cancelled => "cancel",
            TurnAction::Complete => "complete",
            TurnAction::Finalized { .. } => "finalized",
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Opening-turn data the renderer works into its welcome message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Greeting {
    pub title: String,
    pub estimated_time_minutes: u32,
}

/// One captured answer in a preview, keyed by label for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewEntry {
    pub label: String,
    pub value: String,
}

/// One enabled command on the help screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandHelp {
    pub command: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
