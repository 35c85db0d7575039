use serde::{Deserialize, Deserializer, Serialize};

// ─── Action definitions ───────────────────────────────────────────────────

/// An action as declared by the game in `actions/register`.
///
/// `schema` is a JSON schema describing the `data` the game expects when the
/// action is invoked. An absent, `null` or empty-object schema all mean the
/// action takes no data, so they normalise to `None`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema: Option<serde_json::Value>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = normalise_schema(Some(schema));
        self
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }
}

fn normalise_schema(schema: Option<serde_json::Value>) -> Option<serde_json::Value> {
    match schema {
        Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Object(map)) if map.is_empty() => None,
        other => other,
    }
}

fn deserialize_schema<'de, D>(d: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(normalise_schema(raw))
}

// ─── Outgoing invocation ──────────────────────────────────────────────────

/// One execution of a registered action, sent as the `action` command.
///
/// `data` is the JSON payload already serialized to a string; the harness
/// never reinterprets it after it was produced.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionInvocation {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

// ─── Incoming data payloads ───────────────────────────────────────────────

/// Envelope shared by every incoming frame.
#[derive(Debug, Deserialize)]
pub(crate) struct Frame {
    pub command: String,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContextData {
    pub message: String,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterData {
    pub actions: Vec<ActionDefinition>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnregisterData {
    pub action_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForceData {
    #[serde(default)]
    pub state: Option<String>,
    pub query: String,
    #[serde(default)]
    pub ephemeral_context: bool,
    pub action_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultData {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
