//! Types for the client-facing side of the relay: the `/api/chat` request body
//! and the events pushed back over the SSE stream.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what the client sends TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// `None` defers to the server-wide default.
    #[serde(default)]
    pub enable_thinking: Option<bool>,
}

impl ChatRequest {
    /// The only semantic check the relay performs; roles and contents pass through.
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(RelayError::invalid_request("messages must not be empty"));
        }
        Ok(())
    }

    /// Request flag if given, otherwise `default`.
    #[must_use]
    pub fn thinking_enabled(&self, default: bool) -> bool {
        self.enable_thinking.unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message author. Roles the relay does not know are forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[serde(untagged)]
    Other(String),
}

/// Body of a `4xx` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stream types (what we push back to the client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    Reasoning {
        content: String,
    },
    Content {
        content: String,
    },
    Finish {
        reason: String,
        usage: Option<UsageSummary>,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Reasoning { .. } => "reasoning",
            Self::Content { .. } => "content",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageSummary {
    /// The total is always recomputed so that it equals prompt + completion.
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One `data:` frame of the client stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Event(OutboundEvent),
    Done,
}

pub const DONE_SENTINEL: &str = "[DONE]";

impl SseFrame {
    /// Payload of the `data:` line.
    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::Event(event) => serde_json::to_string(event).unwrap_or_else(|e| {
                format!(r#"{{"type":"error","message":"failed to encode event: {e}"}}"#)
            }),
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }
}
