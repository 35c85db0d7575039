use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for [`Controls::send_delay_ms`].
pub const MAX_SEND_DELAY_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

/// Live operator settings. Every field can change while the harness runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Drop `actions/force` requests without executing anything.
    #[serde(default)]
    pub ignore_forced_actions: bool,
    /// Answer forced actions with a random candidate and sampled data
    /// instead of asking the operator.
    #[serde(default)]
    pub auto_send: bool,
    /// Check operator-supplied payloads against the action schema.
    #[serde(default = "default_validate_schema")]
    pub validate_schema: bool,
    /// Delay applied before an outgoing command reaches the game.
    #[serde(default)]
    pub send_delay_ms: u64,
}

fn default_validate_schema() -> bool {
    true
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            ignore_forced_actions: false,
            auto_send: false,
            validate_schema: default_validate_schema(),
            send_delay_ms: 0,
        }
    }
}

impl Controls {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    /// Set the send delay. Values outside `0..=10000` are rejected and the
    /// previous value is kept.
    pub fn set_send_delay_ms(&mut self, ms: i64) -> Result<()> {
        self.send_delay_ms = check_send_delay(ms)?;
        Ok(())
    }

    pub fn apply(&mut self, change: ControlChange) -> Result<()> {
        match change {
            ControlChange::IgnoreForcedActions(v) => self.ignore_forced_actions = v,
            ControlChange::AutoSend(v) => self.auto_send = v,
            ControlChange::ValidateSchema(v) => self.validate_schema = v,
            ControlChange::SendDelayMs(ms) => self.set_send_delay_ms(ms)?,
        }
        Ok(())
    }
}

pub fn check_send_delay(ms: i64) -> Result<u64> {
    if ms < 0 {
        return Err(HarnessError::ConfigurationRejected(
            "send delay must be non-negative".into(),
        ));
    }
    let ms = ms as u64;
    if ms > MAX_SEND_DELAY_MS {
        return Err(HarnessError::ConfigurationRejected(format!(
            "send delay must not exceed {MAX_SEND_DELAY_MS} ms"
        )));
    }
    Ok(ms)
}

// ---------------------------------------------------------------------------
// ControlChange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlChange {
    IgnoreForcedActions(bool),
    AutoSend(bool),
    ValidateSchema(bool),
    SendDelayMs(i64),
}

impl std::fmt::Display for ControlChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlChange::IgnoreForcedActions(v) => write!(f, "ignore_forced_actions = {v}"),
            ControlChange::AutoSend(v) => write!(f, "auto_send = {v}"),
            ControlChange::ValidateSchema(v) => write!(f, "validate_schema = {v}"),
            ControlChange::SendDelayMs(v) => write!(f, "send_delay_ms = {v}"),
        }
    }
}
