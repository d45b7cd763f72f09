use thiserror::Error;

/// Errors raised while talking to another distcalc process.
#[derive(Error, Debug)]
pub enum DistcalcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The peer answered with a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DistcalcError {
    /// JSON-RPC error code if the peer rejected the call.
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            DistcalcError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::net::AddrParseError> for DistcalcError {
    fn from(err: std::net::AddrParseError) -> Self {
        DistcalcError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DistcalcError>;
