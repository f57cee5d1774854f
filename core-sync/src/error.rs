use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Enumeration of repository {repository} failed: {message}")]
    Enumeration { repository: String, message: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Dispatcher error: {0}")]
    DispatcherState(String),

    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl SyncError {
    /// Whether the dispatcher should give the failed job another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Bridge(e) => e.is_retryable(),
            SyncError::Staging(_) => true,
            SyncError::Enumeration { .. }
            | SyncError::Cancelled
            | SyncError::InvalidStateTransition { .. }
            | SyncError::DispatcherState(_)
            | SyncError::Config(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
