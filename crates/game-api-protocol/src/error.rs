use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to parse frame: {source}\n  frame: {frame}")]
    Parse {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has no string \"command\" field")]
    MissingCommand,

    #[error("Malformed data for command '{command}': {source}")]
    MalformedData {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode outgoing command: {0}")]
    Encode(#[source] serde_json::Error),
}
