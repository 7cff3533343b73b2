//! Error taxonomy shared by the manager and its adapters.

/// Errors surfaced by scheduling operations.
///
/// "Not found" is deliberately absent: deleting or looking up a task that does
/// not exist is a normal outcome and adapters report it as `Ok`.
#[derive(Debug, thiserror::Error)]
pub enum AutoPowerError {
    /// Bad user input, rejected before any adapter call.
    #[error("invalid schedule: {0}")]
    Validation(String),

    /// The caller lacks the rights to register an elevated task.
    #[error("administrator rights required: {0}")]
    PermissionDenied(String),

    /// The external service could not be reached or started.
    #[error("scheduling service unavailable: {0}")]
    AdapterUnavailable(String),

    /// Any other adapter failure, with the underlying detail text.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AutoPowerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Whether the caller should be prompted to relaunch elevated.
    pub fn needs_elevation(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, AutoPowerError>;
