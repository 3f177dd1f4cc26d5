//! Error types for the relay.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Why an upstream stream could not be opened or read to completion.
///
/// Every variant ends the client stream the same way (one `error` event, then
/// `[DONE]`); the variant decides the message and how the failure is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    #[error("could not reach provider: {0}")]
    Connect(String),

    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("upstream stream interrupted: {0}")]
    Stream(String),

    #[error("malformed upstream chunk: {0}")]
    Decode(String),

    #[error("provider did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("upstream stream ended before a finish reason")]
    Truncated,
}

impl UpstreamFailure {
    /// Short stable label used in log context.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Status { .. } => "status",
            Self::Provider { .. } => "provider",
            Self::Stream(_) => "stream",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
            Self::Truncated => "truncated",
        }
    }

    /// Connection-level failures, as opposed to the provider answering with an error.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Stream(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let status = UpstreamFailure::Status {
            status: 401,
            message: "invalid api key".to_string(),
        };
        assert_eq!(
            status.to_string(),
            "provider returned status 401: invalid api key"
        );
        assert_eq!(
            UpstreamFailure::Timeout(Duration::from_secs(30)).to_string(),
            "provider did not finish within 30s"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(UpstreamFailure::Connect("refused".into()).is_transport());
        assert!(UpstreamFailure::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!UpstreamFailure::Provider {
            message: "overloaded".into()
        }
        .is_transport());
        assert!(!UpstreamFailure::Truncated.is_transport());
        assert_eq!(UpstreamFailure::Decode("x".into()).kind(), "decode");
    }
}
