//! Capabilities the dispatcher is constructed with.
//!
//! The dispatcher never renders anything or touches a socket. It posts
//! [`UiEvent`]s to a [`Presentation`] and hands [`Outbound`] envelopes to a
//! [`Transport`]. The channel-backed implementations here are what the
//! server and CLI wire together; tests use recording implementations.

use crate::controls::Controls;
use crate::error::{HarnessError, Result};
use crate::types::{Action, ForcePrompt, LogLevel};
use game_api_protocol::OutgoingCommand;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// UiEvent
// ---------------------------------------------------------------------------

/// Everything the presentation side is told about.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Log {
        level: LogLevel,
        message: String,
    },
    /// Text that would reach the agent's context.
    Context {
        message: String,
        silent: bool,
        ephemeral: bool,
    },
    ActionAdded(Action),
    ActionRemoved(String),
    ActionsCleared,
    ActionList(Vec<Action>),
    /// Operator-initiated execution was disabled (`true`) or re-enabled.
    ExecutionLocked(bool),
    ForcePrompt(ForcePrompt),
    ForcePromptDismissed {
        prompt_id: u64,
    },
    ActionResult {
        success: bool,
        message: Option<String>,
    },
    ControlsChanged(Controls),
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

pub trait Presentation: Send {
    /// Queue `event` for the presentation side. Never blocks.
    fn post(&self, event: UiEvent);
}

/// Posts events onto an unbounded channel owned by the interactive side.
pub struct ChannelPresentation {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelPresentation {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Presentation for ChannelPresentation {
    fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("presentation channel closed; dropping event");
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// An outgoing command plus the delay to apply before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub command: OutgoingCommand,
    pub delay: Duration,
}

pub trait Transport: Send {
    fn send(&self, outbound: Outbound) -> Result<()>;
}

/// Hands envelopes to whichever connection task owns the receiver.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, outbound: Outbound) -> Result<()> {
        self.tx
            .send(outbound)
            .map_err(|_| HarnessError::TransportClosed)
    }
}
