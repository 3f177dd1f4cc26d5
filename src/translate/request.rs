//! Build the upstream chat completion request from a client conversation.

use serde_json::{Map, Value};

use super::chat_types::{Message, Role};
use super::openai_types::{ChatCompletionRequest, ChatMessage};

/// Settings that shape every upstream request. Fixed at startup.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Sent only when thinking mode is on.
    pub thinking_extension: Option<Map<String, Value>>,
}

/// Pure function: the configured system prompt goes first, then the caller's
/// history in order, untouched.
#[must_use]
pub fn build_chat_request(
    template: &RequestTemplate,
    messages: &[Message],
    thinking: bool,
) -> ChatCompletionRequest {
    let mut full = Vec::with_capacity(messages.len() + 1);
    full.push(ChatMessage {
        role: Role::System,
        content: template.system_prompt.clone(),
    });
    full.extend(messages.iter().map(|m| ChatMessage {
        role: m.role.clone(),
        content: m.content.clone(),
    }));

    let extension = if thinking {
        template.thinking_extension.clone().unwrap_or_default()
    } else {
        Map::new()
    };

    ChatCompletionRequest {
        model: template.model.clone(),
        messages: full,
        stream: true,
        max_tokens: template.max_tokens,
        extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> RequestTemplate {
        let mut ext = Map::new();
        ext.insert("thinking".to_string(), json!({ "type": "enabled" }));
        RequestTemplate {
            model: "deepseek-chat".to_string(),
            system_prompt: "You are terse.".to_string(),
            max_tokens: 8192,
            thinking_extension: Some(ext),
        }
    }

    #[test]
    fn test_system_prompt_prepended() {
        let history = vec![
            Message::new(Role::User, "hello"),
            Message::new(Role::Assistant, "hi"),
            Message::new(Role::User, "how are you?"),
        ];
        let req = build_chat_request(&template(), &history, false);

        assert_eq!(req.model, "deepseek-chat");
        assert!(req.stream);
        assert_eq!(req.max_tokens, 8192);
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "You are terse.");
        let contents: Vec<&str> = req.messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi", "how are you?"]);
    }

    #[test]
    fn test_extension_only_when_thinking() {
        let history = vec![Message::new(Role::User, "hello")];

        let off = serde_json::to_value(build_chat_request(&template(), &history, false)).unwrap();
        assert!(off.get("thinking").is_none());

        let on = serde_json::to_value(build_chat_request(&template(), &history, true)).unwrap();
        assert_eq!(on["thinking"], json!({ "type": "enabled" }));
    }

    #[test]
    fn test_thinking_without_extension() {
        let mut tpl = template();
        tpl.thinking_extension = None;
        let req = build_chat_request(&tpl, &[Message::new(Role::User, "x")], true);
        assert!(req.extension.is_empty());
    }
}
