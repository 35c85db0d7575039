pub mod capability;
pub mod config;
pub mod controls;
pub mod dispatcher;
pub mod error;
pub mod forced;
pub mod ids;
pub mod operator;
pub mod registry;
pub mod runtime;
pub mod sampler;
pub mod types;

pub use capability::{ChannelPresentation, ChannelTransport, Outbound, Presentation, Transport, UiEvent};
pub use dispatcher::Dispatcher;
pub use error::{HarnessError, Result};
pub use runtime::HarnessHandle;
