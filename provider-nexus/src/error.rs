//! Error types for the Nexus provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Nexus provider errors
#[derive(Error, Debug)]
pub enum NexusError {
    /// Repository URL could not be parsed
    #[error("Invalid repository endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// RPC call answered with an exception
    #[error("RPC {action}.{method} failed: {message}")]
    RpcException {
        action: String,
        method: String,
        message: String,
    },

    /// RPC call answered with `success: false`
    #[error("RPC {action}.{method} reported no success")]
    RpcUnsuccessful { action: String, method: String },

    /// Response parsed but its shape is not usable
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Nexus operations
pub type Result<T> = std::result::Result<T, NexusError>;

impl From<NexusError> for BridgeError {
    fn from(error: NexusError) -> Self {
        match error {
            NexusError::InvalidEndpoint { .. } => BridgeError::OperationFailed(error.to_string()),
            NexusError::RpcException { .. } => BridgeError::MetadataUnavailable(error.to_string()),
            NexusError::RpcUnsuccessful { .. } | NexusError::UnexpectedResponse(_) => {
                BridgeError::Malformed(error.to_string())
            }
            NexusError::Bridge(e) => e,
        }
    }
}
