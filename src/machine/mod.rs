//! Conversation state machine
//!
//! Split across three modules: `state` holds the per-session snapshot
//! types, `response` the discriminated turn results, and `engine` the
//! transition function that ties them to the schema layer.

pub mod engine;
pub mod response;
pub mod state;

pub use engine::IntakeEngine;
pub use response::{CommandHelp, Greeting, PreviewEntry, TurnAction, TurnResponse};
pub use state::{
    ConversationPhase, ConversationState, EditAction, EditRecord, FieldMetrics, PendingAction,
    SessionMetadata,
};
