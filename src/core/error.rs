//! Errors surfaced by the gateway client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, timeout or TLS failure before a response arrived
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend rejected the bearer token (or none was held)
    #[error("not authenticated")]
    Unauthorized,

    /// Any other non-2xx response
    #[error("backend returned {status}: {detail}")]
    Api { status: u16, detail: String },

    /// 2xx response whose body did not match the expected shape
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// Rejected locally, no request was made
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// Short text for the status bar; validation errors are shown verbatim
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ClientError::Validation(message) => message.clone(),
            ClientError::Unauthorized => "Session expired, please log in again".to_string(),
            _ => format!("Failed to {}", action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let err = ClientError::Api {
            status: 500,
            detail: "boom".to_string(),
        };
        assert_eq!(err.user_message("fetch messages"), "Failed to fetch messages");
        assert_eq!(err.to_string(), "backend returned 500: boom");

        let err = ClientError::validation("API key name is required");
        assert_eq!(err.user_message("create API key"), "API key name is required");
        assert!(ClientError::Unauthorized.is_unauthorized());
    }
}
