use crate::controls::ControlChange;

/// A request from the operator's console. Goes through the same serial
/// queue as protocol commands.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorRequest {
    /// Execute a registered action outside any forced request.
    Execute { name: String, data: Option<String> },
    /// Remove an action from the registry locally.
    Delete { name: String },
    /// Clear the registry and ask the game to register everything again.
    ReregisterAll,
    ShutdownGraceful,
    ShutdownGracefulCancel,
    ShutdownImmediate,
    /// Re-enable operator execution while a result is still outstanding.
    Unlock,
    /// Answer to the forced-action prompt `prompt_id`.
    ForceDecision {
        prompt_id: u64,
        decision: ForceDecision,
    },
    /// Show the prompt of the pending forced action again.
    ReopenForce,
    SetControl(ControlChange),
    ListActions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForceDecision {
    Choose {
        choice: ForceChoice,
        data: Option<String>,
    },
    Cancel,
}

/// How the operator names a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceChoice {
    /// 1-based position in the prompt's candidate list.
    Index(usize),
    Name(String),
}
