//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat)
//! as spoken by OpenAI-compatible providers (DeepSeek, DashScope, ...).
//!
//! Only the streaming subset is modelled: the request we send and the chunks
//! and error payloads that come back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat_types::Role;

// ---------------------------------------------------------------------------
// Request types (what we send TO the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub max_tokens: u32,
    /// Provider-specific fields (e.g. DeepSeek's `thinking`), merged at top level.
    #[serde(flatten)]
    pub extension: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Deliberation trace (DeepSeek, Qwen, Kimi). Absent on most providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorResponse {
    pub error: ChatError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    pub message: String,
    #[serde(rename = "type")]
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deepseek_reasoning_chunk() {
        let raw = r#"{"id":"8f1c","object":"chat.completion.chunk","created":1718345013,"model":"deepseek-reasoner","system_fingerprint":"fp_1","choices":[{"index":0,"delta":{"content":null,"reasoning_content":"Let me think"},"logprobs":null,"finish_reason":null}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let delta = &chunk.choices[0].delta;
        assert_eq!(delta.content, None);
        assert_eq!(delta.reasoning_content.as_deref(), Some("Let me think"));
        assert!(chunk.usage.is_none());
    }

    #[test]
    fn test_parse_minimal_chunk() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));
        assert_eq!(chunk.choices[0].finish_reason, None);
    }

    #[test]
    fn test_extension_is_flattened() {
        let mut extension = Map::new();
        extension.insert(
            "thinking".to_string(),
            serde_json::json!({ "type": "enabled" }),
        );
        let req = ChatCompletionRequest {
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "hi".to_string(),
            }],
            stream: true,
            max_tokens: 8192,
            extension,
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["thinking"]["type"], "enabled");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_parse_error_payload() {
        let err: ChatErrorResponse = serde_json::from_str(
            r#"{"error":{"message":"Authentication Fails","type":"authentication_error","param":null,"code":"invalid_request_error"}}"#,
        )
        .unwrap();
        assert_eq!(err.error.message, "Authentication Fails");
        assert_eq!(err.error.error_type.as_deref(), Some("authentication_error"));
    }
}
