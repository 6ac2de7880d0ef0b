//! Error types for the hub client

use thiserror::Error;

/// Classified failure of a client flow. Nothing here is retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: String, need: String },

    /// Contract-level rejection, message passed through verbatim.
    #[error("Transaction reverted: {0}")]
    Revert(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ClientError {
    /// Short machine-readable name, logged alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Configuration(_) => "configuration",
            ClientError::Connection(_) => "connection",
            ClientError::Argument(_) => "argument",
            ClientError::InsufficientFunds { .. } => "insufficient_funds",
            ClientError::Revert(_) => "revert",
            ClientError::Unknown(_) => "unknown",
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_message_is_verbatim() {
        let err = ClientError::Revert("Exceeds max supply".to_string());
        assert_eq!(err.to_string(), "Transaction reverted: Exceeds max supply");
        assert_eq!(err.kind(), "revert");
    }

    #[test]
    fn test_insufficient_funds_display() {
        let err = ClientError::InsufficientFunds {
            have: "0.05".to_string(),
            need: "0.1".to_string(),
        };
        assert_eq!(err.to_string(), "Insufficient funds: have 0.05, need 0.1");
    }
}
