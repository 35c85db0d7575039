use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{
    ActionDefinition, ActionInvocation, ContextData, ForceData, Frame, RegisterData, ResultData,
    UnregisterData,
};
use crate::{ProtocolError, Result};

// ─── Incoming commands ────────────────────────────────────────────────────

/// Every command the game can send, in decoded form.
///
/// The set is closed: any `"command"` value this crate does not know is kept
/// verbatim in [`Command::Unknown`] so the caller can report it.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `startup`: the game (re)started; all previous actions are invalid.
    Startup { game: Option<String> },
    /// `context`: free-form information for the agent.
    Context { message: String, silent: bool },
    /// `actions/register`
    ActionsRegister { actions: Vec<ActionDefinition> },
    /// `actions/unregister`
    ActionsUnregister { names: Vec<String> },
    /// `actions/force`: the agent must execute one of `names`.
    ActionsForce {
        state: Option<String>,
        query: String,
        ephemeral: bool,
        names: Vec<String>,
    },
    /// `action/result`: outcome of a previously sent invocation.
    ActionResult {
        id: Option<String>,
        success: bool,
        message: Option<String>,
    },
    /// `shutdown/ready`: not part of the official protocol.
    ShutdownReady,
    /// Any other `command` value; `raw` is the whole frame.
    Unknown { raw: serde_json::Value },
}

impl Command {
    /// The wire name of this command.
    pub fn kind(&self) -> &str {
        match self {
            Command::Startup { .. } => "startup",
            Command::Context { .. } => "context",
            Command::ActionsRegister { .. } => "actions/register",
            Command::ActionsUnregister { .. } => "actions/unregister",
            Command::ActionsForce { .. } => "actions/force",
            Command::ActionResult { .. } => "action/result",
            Command::ShutdownReady => "shutdown/ready",
            Command::Unknown { raw } => raw
                .get("command")
                .and_then(|c| c.as_str())
                .unwrap_or("<unknown>"),
        }
    }
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Result<Command> {
    let value: serde_json::Value =
        serde_json::from_str(frame).map_err(|source| ProtocolError::Parse {
            frame: frame.to_string(),
            source,
        })?;
    decode_value(value)
}

/// Decode an already-parsed frame.
pub fn decode_value(value: serde_json::Value) -> Result<Command> {
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }
    match value.get("command") {
        Some(serde_json::Value::String(_)) => {}
        _ => return Err(ProtocolError::MissingCommand),
    }

    let frame: Frame =
        serde_json::from_value(value.clone()).map_err(|_| ProtocolError::MissingCommand)?;
    let command = frame.command.as_str();

    let cmd = match command {
        "startup" => Command::Startup { game: frame.game },
        "context" => {
            let d: ContextData = data_of(command, frame.data)?;
            Command::Context {
                message: d.message,
                silent: d.silent,
            }
        }
        "actions/register" => {
            let d: RegisterData = data_of(command, frame.data)?;
            Command::ActionsRegister { actions: d.actions }
        }
        "actions/unregister" => {
            let d: UnregisterData = data_of(command, frame.data)?;
            Command::ActionsUnregister {
                names: d.action_names,
            }
        }
        "actions/force" => {
            let d: ForceData = data_of(command, frame.data)?;
            Command::ActionsForce {
                state: d.state,
                query: d.query,
                ephemeral: d.ephemeral_context,
                names: d.action_names,
            }
        }
        "action/result" => {
            let d: ResultData = data_of(command, frame.data)?;
            Command::ActionResult {
                id: d.id,
                success: d.success,
                message: d.message,
            }
        }
        "shutdown/ready" => Command::ShutdownReady,
        _ => Command::Unknown { raw: value },
    };
    Ok(cmd)
}

fn data_of<T: DeserializeOwned>(command: &str, data: Option<serde_json::Value>) -> Result<T> {
    serde_json::from_value(data.unwrap_or(serde_json::Value::Null)).map_err(|source| {
        ProtocolError::MalformedData {
            command: command.to_string(),
            source,
        }
    })
}

// ─── Outgoing commands ────────────────────────────────────────────────────

/// Every command the harness can send to the game.
///
/// Only [`OutgoingCommand::Action`] is part of the official protocol; the
/// administrative commands are extensions some games understand.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "command", content = "data")]
pub enum OutgoingCommand {
    #[serde(rename = "action")]
    Action(ActionInvocation),
    #[serde(rename = "actions/reregister_all")]
    ActionsReregisterAll,
    #[serde(rename = "shutdown/graceful")]
    ShutdownGraceful { wants_shutdown: bool },
    #[serde(rename = "shutdown/immediate")]
    ShutdownImmediate,
}

impl OutgoingCommand {
    /// The wire name of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingCommand::Action(_) => "action",
            OutgoingCommand::ActionsReregisterAll => "actions/reregister_all",
            OutgoingCommand::ShutdownGraceful { .. } => "shutdown/graceful",
            OutgoingCommand::ShutdownImmediate => "shutdown/immediate",
        }
    }
}

/// Encode an outgoing command as a text frame.
pub fn encode(cmd: &OutgoingCommand) -> Result<String> {
    serde_json::to_string(cmd).map_err(ProtocolError::Encode)
}
