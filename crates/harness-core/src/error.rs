use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("action \"{0}\" already exists")]
    Duplicate(String),

    #[error("action \"{0}\" does not exist")]
    NotFound(String),

    #[error("Invalid actions: {}", .missing.join(", "))]
    InvalidForceRequest { missing: Vec<String> },

    #[error("another forced action is already pending")]
    ForceConflict,

    #[error("{0} is not one of the forced action candidates")]
    NotACandidate(String),

    #[error("configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error("cannot generate a sample: {0}")]
    Sampler(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("action execution is locked until a result arrives")]
    ExecutionLocked,

    #[error("transport closed")]
    TransportClosed,

    #[error("harness runtime stopped")]
    RuntimeStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
