use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Rejected by server (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Asset {asset} is missing attribute '{attribute}'")]
    AttributeMissing {
        asset: String,
        attribute: &'static str,
    },

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether a later attempt of the same operation may succeed.
    ///
    /// Structural problems (bad listings, unknown repositories, absent
    /// attributes) do not go away on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Transient(_)
            | BridgeError::MetadataUnavailable(_)
            | BridgeError::Rejected { .. }
            | BridgeError::OperationFailed(_)
            | BridgeError::Io(_) => true,
            BridgeError::NotFound(_)
            | BridgeError::Malformed(_)
            | BridgeError::AttributeMissing { .. } => false,
        }
    }

    /// Map an HTTP status code that was not a success onto the error taxonomy.
    pub fn from_status(status: u16, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            404 => BridgeError::NotFound(context),
            408 | 429 | 500..=599 => {
                BridgeError::Transient(format!("HTTP {}: {}", status, context))
            }
            _ => BridgeError::Rejected {
                status,
                message: context,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
