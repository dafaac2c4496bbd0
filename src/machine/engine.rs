//! Intake Engine — Guided Conversation State Machine
//!
//! The heart of the crate. Parses each user message into an `Intent`,
//! dispatches it against the current `ConversationState`, and produces a
//! `TurnResponse` for the host to render.
//!
//! # Transition Dispatch
//!
//! | Intent      | Precondition                 | Effect                                | Action                 |
//! |-------------|------------------------------|---------------------------------------|------------------------|
//! | (init)      | no state, or phase `init`    | load schema, fresh state at field 0   | ask_field + greeting   |
//! | ANSWER      | current field exists         | count ask; normalize; validate        | confirm_value or validation_error |
//! | ANSWER      | past last field              | none                                  | error                  |
//! | CONFIRM_YES | value confirmation pending   | commit answer; advance                | ask_field or end_review |
//! | CONFIRM_YES | nothing pending              | none                                  | error                  |
//! | CONFIRM_NO  | any                          | discard held value                    | ask_again              |
//! | BACK        | index > 0                    | decrement index; clear pending        | ask_field              |
//! | BACK        | index == 0                   | none                                  | error                  |
//! | EDIT id     | id in schema                 | jump to field; clear pending          | ask_field              |
//! | EDIT id     | unknown id                   | none                                  | error (with suggestion) |
//! | SKIP        | required, skip not armed     | arm skip confirmation                 | confirm_skip           |
//! | SKIP        | required armed, or optional  | commit skip; advance                  | ask_field or end_review |
//! | SKIP        | past last field              | none                                  | complete               |
//! | PREVIEW     | any                          | none (read-only)                      | show_preview           |
//! | HELP        | any                          | none                                  | show_help              |
//! | CANCEL      | any                          | terminal                              | cancel                 |
//!
//! Malformed user input never fails the call; every problem is returned
//! as a renderable action. Schema-load failure at any turn becomes an
//! `error` action with the caller's state returned unchanged.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::SchemaResult;
use crate::intent::{parse_intent, Intent};
use crate::normalize::normalize_value;
use crate::schema::loader::SchemaSource;
use crate::schema::DocumentSchema;
use crate::validate::validate_field;

use super::response::{CommandHelp, Greeting, PreviewEntry, TurnAction, TurnResponse};
use super::state::{ConversationPhase, ConversationState, EditAction, PendingAction};

const NO_CURRENT_FIELD: &str = "No current field to answer.";
const CANCELLED_SESSION: &str = "Session has been cancelled.";

/// Minimum Jaro-Winkler similarity before an unknown field id gets a
/// did-you-mean suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// IntakeEngine
// ---------------------------------------------------------------------------

/// Stateless turn processor. Sessions live entirely in the
/// `ConversationState` values threaded through [`IntakeEngine::process`];
/// the engine itself holds only the schema source and a cache of loaded
/// schemas, so one engine serves any number of concurrent sessions.
pub struct IntakeEngine {
    source: Arc<dyn SchemaSource>,
    schema_cache: RwLock<HashMap<String, Arc<DocumentSchema>>>,
}

impl IntakeEngine {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            schema_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Process one user message against the previous state snapshot.
    ///
    /// `None` (or a state still in `init`) starts a session: loads the
    /// schema for `document_type` and asks the first field with a
    /// greeting. Subsequent turns resolve the schema from the session's
    /// own document type.
    pub fn process(
        &self,
        state: Option<ConversationState>,
        user_message: &str,
        document_type: &str,
    ) -> TurnResponse {
        match state {
            None => self.start_session(document_type, None),
            Some(s) if s.phase == ConversationPhase::Init => {
                self.start_session(document_type, Some(s))
            }
            Some(s) => self.continue_session(s, user_message, document_type),
        }
    }

    /// Close out a session and hand its snapshot to the document
    /// renderer. Host-invoked rather than message-driven, so the chat
    /// command vocabulary stays closed. Required gaps never block this;
    /// they ride along as an advisory flag.
    pub fn finalize(&self, mut state: ConversationState) -> TurnResponse {
        if state.is_cancelled() {
            return TurnResponse::new(
                state,
                TurnAction::Error {
                    message: CANCELLED_SESSION.to_string(),
                },
            );
        }
        let schema = match self.schema_for(&state.document_type) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(session_id = %state.session_id, error = %e, "schema load failed");
                return TurnResponse::new(
                    state,
                    TurnAction::Error {
                        message: e.to_string(),
                    },
                );
            }
        };

        let required_gaps = required_gap_labels(&schema, &state);
        state.has_required_gaps = !required_gaps.is_empty();
        state.pending = PendingAction::None;
        state.phase = ConversationPhase::Finalize;
        state.touch();
        info!(
            session_id = %state.session_id,
            answers = state.answers.len(),
            gaps = required_gaps.len(),
            "session finalized"
        );

        let action = TurnAction::Finalized {
            answers: state.answers.clone(),
            skipped_fields: skipped_in_schema_order(&schema, &state),
            has_required_gaps: state.has_required_gaps,
        };
        TurnResponse::new(state, action)
    }

    fn start_session(
        &self,
        document_type: &str,
        prior: Option<ConversationState>,
    ) -> TurnResponse {
        let schema = match self.schema_for(document_type) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(%document_type, error = %e, "schema load failed");
                let state =
                    prior.unwrap_or_else(|| ConversationState::uninitialized(document_type));
                return TurnResponse::new(
                    state,
                    TurnAction::Error {
                        message: e.to_string(),
                    },
                );
            }
        };

        let state = ConversationState::new(document_type, schema.version.clone());
        info!(
            session_id = %state.session_id,
            %document_type,
            fields = schema.field_count(),
            "session started"
        );

        match schema.field_at(0).cloned() {
            Some(field) => {
                let greeting = Greeting {
                    title: schema.metadata.title.clone(),
                    estimated_time_minutes: schema.metadata.estimated_time_minutes,
                };
                TurnResponse::new(
                    state,
                    TurnAction::AskField {
                        field,
                        greeting: Some(greeting),
                    },
                )
            }
            None => end_review(state, &schema),
        }
    }

    fn continue_session(
        &self,
        state: ConversationState,
        user_message: &str,
        document_type: &str,
    ) -> TurnResponse {
        if state.is_cancelled() {
            return TurnResponse::new(
                state,
                TurnAction::Error {
                    message: CANCELLED_SESSION.to_string(),
                },
            );
        }
        if document_type != state.document_type {
            warn!(
                session_id = %state.session_id,
                requested = %document_type,
                active = %state.document_type,
                "document type mismatch; keeping the session's type"
            );
        }

        let schema = match self.schema_for(&state.document_type) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(session_id = %state.session_id, error = %e, "schema load failed");
                return TurnResponse::new(
                    state,
                    TurnAction::Error {
                        message: e.to_string(),
                    },
                );
            }
        };

        let intent = parse_intent(user_message, &state);
        debug!(
            session_id = %state.session_id,
            intent = intent.kind(),
            index = state.current_field_index,
            phase = state.phase.as_str(),
            "dispatch"
        );

        match intent {
            Intent::Answer { value } => handle_answer(state, &schema, &value),
            Intent::ConfirmYes => handle_confirm_yes(state, &schema),
            Intent::ConfirmNo => handle_confirm_no(state, &schema),
            Intent::Back => handle_back(state, &schema),
            Intent::Edit { field_id } => handle_edit(state, &schema, &field_id),
            Intent::Skip => handle_skip(state, &schema),
            Intent::Preview => handle_preview(state, &schema),
            Intent::Help => handle_help(state, &schema),
            Intent::Cancel => handle_cancel(state),
        }
    }

    fn schema_for(&self, document_type: &str) -> SchemaResult<Arc<DocumentSchema>> {
        if let Some(schema) = self
            .schema_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_type)
        {
            return Ok(Arc::clone(schema));
        }

        let schema = self.source.load(document_type)?;
        self.schema_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_type.to_string(), Arc::clone(&schema));
        Ok(schema)
    }
}

// ---------------------------------------------------------------------------
// Intent handlers
// ---------------------------------------------------------------------------

fn handle_answer(
    mut state: ConversationState,
    schema: &DocumentSchema,
    raw_value: &str,
) -> TurnResponse {
    let Some(field) = schema.field_at(state.current_field_index).cloned() else {
        return TurnResponse::new(
            state,
            TurnAction::Error {
                message: NO_CURRENT_FIELD.to_string(),
            },
        );
    };

    state.record_ask(&field.id);
    let normalized = normalize_value(&field, raw_value);
    let outcome = validate_field(&field, &normalized);
    state.touch();

    if !outcome.valid {
        state.record_re_ask();
        state.phase = ConversationPhase::Validate;
        debug!(
            session_id = %state.session_id,
            field = %field.id,
            errors = outcome.errors.len(),
            "validation failed"
        );
        return TurnResponse::new(
            state,
            TurnAction::ValidationError {
                field,
                errors: outcome.errors,
            },
        );
    }

    state.record_completed(&field.id);
    state.pending = PendingAction::AwaitingConfirmation {
        field_id: field.id.clone(),
        value: normalized.clone(),
    };
    state.phase = ConversationPhase::Confirm;
    TurnResponse::new(
        state,
        TurnAction::ConfirmValue {
            field,
            value: normalized,
        },
    )
}

fn handle_confirm_yes(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    match std::mem::take(&mut state.pending) {
        PendingAction::AwaitingConfirmation { field_id, value } => {
            state.skipped.remove(&field_id);
            state.answers.insert(field_id.clone(), value);
            state.record_edit(field_id, EditAction::Confirmed);
            state.current_field_index += 1;
            state.touch();
            advance_or_review(state, schema)
        }
        other => {
            state.pending = other;
            TurnResponse::new(
                state,
                TurnAction::Error {
                    message: "Nothing to confirm.".to_string(),
                },
            )
        }
    }
}

fn handle_confirm_no(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    state.pending = PendingAction::None;
    match schema.field_at(state.current_field_index).cloned() {
        Some(field) => {
            state.phase = ConversationPhase::Capture;
            state.touch();
            TurnResponse::new(state, TurnAction::AskAgain { field })
        }
        None => TurnResponse::new(
            state,
            TurnAction::Error {
                message: NO_CURRENT_FIELD.to_string(),
            },
        ),
    }
}

fn handle_back(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    if state.current_field_index == 0 {
        return TurnResponse::new(
            state,
            TurnAction::Error {
                message: "Already at the first field.".to_string(),
            },
        );
    }

    let target = state.current_field_index - 1;
    match schema.field_at(target).cloned() {
        Some(field) => {
            state.current_field_index = target;
            state.pending = PendingAction::None;
            state.phase = ConversationPhase::Back;
            state.record_edit(field.id.clone(), EditAction::Revisited);
            state.touch();
            TurnResponse::new(
                state,
                TurnAction::AskField {
                    field,
                    greeting: None,
                },
            )
        }
        None => TurnResponse::new(
            state,
            TurnAction::Error {
                message: NO_CURRENT_FIELD.to_string(),
            },
        ),
    }
}

fn handle_edit(
    mut state: ConversationState,
    schema: &DocumentSchema,
    field_id: &str,
) -> TurnResponse {
    match schema.position_of(field_id) {
        Some(position) => {
            let field = schema.fields[position].clone();
            state.current_field_index = position;
            state.pending = PendingAction::None;
            state.phase = ConversationPhase::EditPrevious;
            state.record_edit(field.id.clone(), EditAction::Revisited);
            state.touch();
            TurnResponse::new(
                state,
                TurnAction::AskField {
                    field,
                    greeting: None,
                },
            )
        }
        None => {
            let valid = schema.field_ids().join(", ");
            let message = match closest_field_id(schema, field_id) {
                Some(suggestion) => format!(
                    "Unknown field '{}'. Did you mean '{}'? Valid fields: {}",
                    field_id, suggestion, valid
                ),
                None => format!("Unknown field '{}'. Valid fields: {}", field_id, valid),
            };
            TurnResponse::new(state, TurnAction::Error { message })
        }
    }
}

fn handle_skip(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    let Some(field) = schema.field_at(state.current_field_index).cloned() else {
        return TurnResponse::new(state, TurnAction::Complete);
    };

    let skip_armed = matches!(
        &state.pending,
        PendingAction::AwaitingSkipConfirmation { field_id } if *field_id == field.id
    );
    if field.required && !skip_armed {
        state.pending = PendingAction::AwaitingSkipConfirmation {
            field_id: field.id.clone(),
        };
        state.phase = ConversationPhase::Skip;
        state.touch();
        return TurnResponse::new(state, TurnAction::ConfirmSkip { field });
    }

    state.pending = PendingAction::None;
    // Disjointness: an already-answered field is never marked skipped.
    if !state.answers.contains_key(&field.id) {
        state.skipped.insert(field.id.clone());
    }
    state.record_edit(field.id, EditAction::Skipped);
    state.current_field_index += 1;
    state.touch();
    advance_or_review(state, schema)
}

fn handle_preview(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    let completed = schema
        .fields
        .iter()
        .filter_map(|f| {
            state.answers.get(&f.id).map(|value| PreviewEntry {
                label: f.label.clone(),
                value: value.clone(),
            })
        })
        .collect();
    let skipped = skipped_in_schema_order(schema, &state);
    let remaining = schema
        .fields
        .iter()
        .skip(state.current_field_index)
        .filter(|f| !state.answers.contains_key(&f.id))
        .map(|f| f.label.clone())
        .collect();

    state.phase = ConversationPhase::Preview;
    TurnResponse::new(
        state,
        TurnAction::ShowPreview {
            completed,
            skipped,
            remaining,
        },
    )
}

fn handle_help(state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    let commands = schema
        .enabled_commands()
        .into_iter()
        .map(|(command, description)| CommandHelp {
            command: command.to_string(),
            description: description.to_string(),
        })
        .collect();
    TurnResponse::new(state, TurnAction::ShowHelp { commands })
}

fn handle_cancel(mut state: ConversationState) -> TurnResponse {
    state.phase = ConversationPhase::Cancelled;
    state.pending = PendingAction::None;
    state.touch();
    info!(session_id = %state.session_id, "session cancelled");
    TurnResponse::new(state, TurnAction::Cancelled)
}

// ---------------------------------------------------------------------------
// Advancement and review
// ---------------------------------------------------------------------------

fn advance_or_review(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    match schema.field_at(state.current_field_index).cloned() {
        Some(field) => {
            state.phase = ConversationPhase::NextField;
            TurnResponse::new(
                state,
                TurnAction::AskField {
                    field,
                    greeting: None,
                },
            )
        }
        None => end_review(state, schema),
    }
}

fn end_review(mut state: ConversationState, schema: &DocumentSchema) -> TurnResponse {
    let required_gaps = required_gap_labels(schema, &state);
    state.has_required_gaps = !required_gaps.is_empty();
    state.phase = ConversationPhase::EndReview;
    info!(
        session_id = %state.session_id,
        completed = state.answers.len(),
        gaps = required_gaps.len(),
        "end review reached"
    );

    let action = TurnAction::EndReview {
        completed_fields: state.answers.len(),
        total_fields: schema.field_count(),
        required_gaps,
        skipped_fields: skipped_in_schema_order(schema, &state),
    };
    TurnResponse::new(state, action)
}

fn required_gap_labels(schema: &DocumentSchema, state: &ConversationState) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter(|f| f.required && !state.answers.contains_key(&f.id))
        .map(|f| f.label.clone())
        .collect()
}

fn skipped_in_schema_order(schema: &DocumentSchema, state: &ConversationState) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter(|f| state.skipped.contains(&f.id))
        .map(|f| f.id.clone())
        .collect()
}

/// Closest known field id by Jaro-Winkler similarity, if any id clears
/// the suggestion threshold.
fn closest_field_id(schema: &DocumentSchema, unknown: &str) -> Option<String> {
    schema
        .fields
        .iter()
        .map(|f| (strsim::jaro_winkler(unknown, &f.id), &f.id))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
