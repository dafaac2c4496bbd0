//! User intent parsing
//!
//! Classifies a raw chat message into a typed `Intent`. Matching is
//! case-insensitive on the trimmed message; anything unrecognized is a
//! plain answer. Exactly one piece of conversation state feeds the
//! parser: while a value confirmation is pending, bare confirmation
//! words resolve to confirm intents ahead of command matching.
//!
//! A field whose legitimate answer text is exactly "yes" or "no" cannot
//! be entered while a confirmation is pending. Free text carries both
//! commands and answers, so this shadowing is inherent and kept as-is.

use serde::{Deserialize, Serialize};

use crate::machine::ConversationState;

/// Words accepted as a positive confirmation while one is pending.
const CONFIRM_WORDS: [&str; 4] = ["yes", "y", "confirm", "correct"];

/// Words accepted as a rejection while a confirmation is pending.
const REJECT_WORDS: [&str; 4] = ["no", "n", "change", "edit"];

/// One parsed user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Free-text answer to the current field.
    Answer { value: String },

    /// Return to the previous field.
    Back,

    /// Jump to a named field.
    Edit { field_id: String },

    /// Leave the current field blank.
    Skip,

    /// Show captured progress.
    Preview,

    /// Abandon the session.
    Cancel,

    /// Show the command list.
    Help,

    /// Accept the pending value.
    ConfirmYes,

    /// Reject the pending value.
    ConfirmNo,
}

impl Intent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Answer { .. } => "answer",
            Intent::Back => "back",
            Intent::Edit { .. } => "edit",
            Intent::Skip => "skip",
            Intent::Preview => "preview",
            Intent::Cancel => "cancel",
            Intent::Help => "help",
            Intent::ConfirmYes => "confirm_yes",
            Intent::ConfirmNo => "confirm_no",
        }
    }
}

/// Parse a raw user message into an intent.
///
/// Command words must match the whole message. The one prefix form is
/// `edit <field_id>`: everything after the first space is the target
/// field id. A bare `edit` with no argument is not a command and falls
/// through to `Answer` (or to `ConfirmNo` while a confirmation is
/// pending).
pub fn parse_intent(user_message: &str, state: &ConversationState) -> Intent {
    let trimmed = user_message.trim();
    let lower = trimmed.to_lowercase();

    if state.pending.is_awaiting_confirmation() {
        if CONFIRM_WORDS.contains(&lower.as_str()) {
            return Intent::ConfirmYes;
        }
        if REJECT_WORDS.contains(&lower.as_str()) {
            return Intent::ConfirmNo;
        }
        // Not a confirmation word: commands still work mid-confirmation.
    }

    match lower.as_str() {
        "back" | "previous" => return Intent::Back,
        "skip" => return Intent::Skip,
        "preview" | "show progress" | "review" => return Intent::Preview,
        "cancel" | "quit" | "exit" => return Intent::Cancel,
        "help" | "?" => return Intent::Help,
        _ => {}
    }

    if let Some(rest) = lower.strip_prefix("edit ") {
        return Intent::Edit {
            field_id: rest.trim().to_string(),
        };
    }

    Intent::Answer {
        value: trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::PendingAction;

    fn idle_state() -> ConversationState {
        ConversationState::new("project_charter", "1.0")
    }

    fn confirming_state() -> ConversationState {
        let mut state = idle_state();
        state.pending = PendingAction::AwaitingConfirmation {
            field_id: "project_name".to_string(),
            value: "Apollo".to_string(),
        };
        state
    }

    #[test]
    fn test_commands_match_case_insensitive() {
        let state = idle_state();
        assert_eq!(parse_intent("BACK", &state), Intent::Back);
        assert_eq!(parse_intent("Previous", &state), Intent::Back);
        assert_eq!(parse_intent("skip", &state), Intent::Skip);
        assert_eq!(parse_intent("Show Progress", &state), Intent::Preview);
        assert_eq!(parse_intent("review", &state), Intent::Preview);
        assert_eq!(parse_intent("QUIT", &state), Intent::Cancel);
        assert_eq!(parse_intent("?", &state), Intent::Help);
    }

    #[test]
    fn test_commands_require_full_message_match() {
        let state = idle_state();
        assert_eq!(
            parse_intent("skip the formalities", &state),
            Intent::Answer {
                value: "skip the formalities".to_string()
            }
        );
        assert_eq!(
            parse_intent("go back", &state),
            Intent::Answer {
                value: "go back".to_string()
            }
        );
    }

    #[test]
    fn test_edit_extracts_field_id() {
        let state = idle_state();
        assert_eq!(
            parse_intent("edit start_date", &state),
            Intent::Edit {
                field_id: "start_date".to_string()
            }
        );
        assert_eq!(
            parse_intent("EDIT  Owner ", &state),
            Intent::Edit {
                field_id: "owner".to_string()
            }
        );
    }

    #[test]
    fn test_bare_edit_is_an_answer_outside_confirmation() {
        let state = idle_state();
        assert_eq!(
            parse_intent("edit", &state),
            Intent::Answer {
                value: "edit".to_string()
            }
        );
    }

    #[test]
    fn test_free_text_is_an_answer() {
        let state = idle_state();
        assert_eq!(
            parse_intent("  Project Apollo  ", &state),
            Intent::Answer {
                value: "Project Apollo".to_string()
            }
        );
    }

    #[test]
    fn test_confirmation_words_take_priority_while_pending() {
        let state = confirming_state();
        assert_eq!(parse_intent("yes", &state), Intent::ConfirmYes);
        assert_eq!(parse_intent("Y", &state), Intent::ConfirmYes);
        assert_eq!(parse_intent("Correct", &state), Intent::ConfirmYes);
        assert_eq!(parse_intent("no", &state), Intent::ConfirmNo);
        assert_eq!(parse_intent("change", &state), Intent::ConfirmNo);
        assert_eq!(parse_intent("edit", &state), Intent::ConfirmNo);
    }

    #[test]
    fn test_confirmation_words_ignored_when_nothing_pending() {
        let state = idle_state();
        assert_eq!(
            parse_intent("yes", &state),
            Intent::Answer {
                value: "yes".to_string()
            }
        );
    }

    #[test]
    fn test_skip_confirmation_does_not_capture_yes() {
        let mut state = idle_state();
        state.pending = PendingAction::AwaitingSkipConfirmation {
            field_id: "owner".to_string(),
        };
        // A pending skip is confirmed by repeating "skip", not by yes/no.
        assert_eq!(
            parse_intent("yes", &state),
            Intent::Answer {
                value: "yes".to_string()
            }
        );
        assert_eq!(parse_intent("skip", &state), Intent::Skip);
    }

    #[test]
    fn test_commands_fall_through_while_pending() {
        let state = confirming_state();
        assert_eq!(parse_intent("back", &state), Intent::Back);
        assert_eq!(
            parse_intent("edit owner", &state),
            Intent::Edit {
                field_id: "owner".to_string()
            }
        );
        assert_eq!(parse_intent("cancel", &state), Intent::Cancel);
    }

    #[test]
    fn test_intent_serde_tags() {
        let json = serde_json::to_string(&Intent::Edit {
            field_id: "owner".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"edit""#));

        let parsed: Intent = serde_json::from_str(r#"{"type":"confirm_yes"}"#).unwrap();
        assert_eq!(parsed, Intent::ConfirmYes);
    }
}
