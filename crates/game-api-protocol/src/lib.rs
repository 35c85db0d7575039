//! `game-api-protocol`: typed frames for the Game API command protocol.
//!
//! The game (the controlled application) and the harness exchange JSON text
//! frames of the shape `{"command": <kind>, "game": <name>, "data": {...}}`.
//! This crate decodes incoming frames into the closed [`Command`] enum and
//! encodes [`OutgoingCommand`] values back into frames. It holds no state.
//!
//! # Architecture
//!
//! ```text
//! text frame
//!     │
//!     ▼
//! decode()          ← reads "command", deserializes "data" per kind
//!     │
//!     ▼
//! Command enum      ← closed; unrecognised kinds land in Command::Unknown
//!
//! OutgoingCommand   ← action invocations and administrative commands
//!     │
//!     ▼
//! encode()          ← text frame for the transport
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use game_api_protocol::{decode, encode, ActionInvocation, Command, OutgoingCommand};
//!
//! let cmd = decode(r#"{"command":"startup","game":"Test Game"}"#)?;
//! assert!(matches!(cmd, Command::Startup { .. }));
//!
//! let frame = encode(&OutgoingCommand::Action(ActionInvocation {
//!     id: "action_0".into(),
//!     name: "jump".into(),
//!     data: None,
//! }))?;
//! ```

pub mod command;
pub mod error;
pub mod types;


pub use command::{decode, decode_value, encode, Command, OutgoingCommand};
pub use error::ProtocolError;
pub use types::{ActionDefinition, ActionInvocation};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
