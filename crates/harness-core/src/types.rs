use crate::controls::Controls;
use serde::{Deserialize, Serialize};

/// A registered action. Same shape as the wire definition.
pub use game_api_protocol::ActionDefinition as Action;

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// ForcePrompt
// ---------------------------------------------------------------------------

/// What the human decision point is shown for a forced action.
///
/// Candidates keep the order the game sent them in; the operator may answer
/// with a 1-based index into `candidates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcePrompt {
    pub prompt_id: u64,
    pub state: Option<String>,
    pub query: String,
    pub ephemeral: bool,
    pub candidates: Vec<Action>,
    pub is_retry: bool,
}

// ---------------------------------------------------------------------------
// HarnessSnapshot
// ---------------------------------------------------------------------------

/// Read-only view of the dispatcher, for status routes and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessSnapshot {
    pub actions: Vec<Action>,
    pub controls: Controls,
    pub execution_locked: bool,
    pub forced: ForcedSummary,
    pub invocations_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ForcedSummary {
    Idle,
    Deciding {
        prompt_id: u64,
        query: String,
        candidates: Vec<String>,
        is_retry: bool,
    },
    AwaitingResult {
        action_id: String,
        query: String,
        candidates: Vec<String>,
        is_retry: bool,
    },
}
