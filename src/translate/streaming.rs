//! Translation of OpenAI streaming chunks into client events.
//!
//! The [`EventTranslator`] processes `ChatCompletionChunk`s one at a time and
//! returns the [`OutboundEvent`]s each one produces. It stops accepting input
//! after the first finish reason, so at most one `finish` event is ever built.

use super::chat_types::{OutboundEvent, UsageSummary};
use super::openai_types::{ChatCompletionChunk, ChatUsage};

/// Per-request translation state.
///
/// Usage:
///   let mut translator = EventTranslator::new(thinking);
///   for chunk in chunks {
///       for event in translator.process_chunk(&chunk) { /* send */ }
///       if translator.is_finished() { break; }
///   }
#[derive(Debug)]
pub struct EventTranslator {
    thinking: bool,
    finished: bool,
}

impl EventTranslator {
    #[must_use]
    pub fn new(thinking: bool) -> Self {
        Self {
            thinking,
            finished: false,
        }
    }

    /// Process one chunk, returning zero or more events in emission order.
    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Vec<OutboundEvent> {
        if self.finished {
            return Vec::new();
        }

        let Some(choice) = chunk.choices.first() else {
            return Vec::new();
        };

        // Some providers send `"finish_reason": ""` on ordinary deltas.
        if let Some(reason) = non_empty(choice.finish_reason.as_deref()) {
            self.finished = true;
            return vec![OutboundEvent::Finish {
                reason: reason.to_string(),
                usage: chunk.usage.as_ref().map(normalize_usage),
            }];
        }

        let mut events = Vec::with_capacity(2);

        // Reasoning is dropped outright when thinking is off, even if the
        // provider sends it anyway.
        if self.thinking {
            if let Some(reasoning) = non_empty(choice.delta.reasoning_content.as_deref()) {
                events.push(OutboundEvent::Reasoning {
                    content: reasoning.to_string(),
                });
            }
        }

        if let Some(content) = non_empty(choice.delta.content.as_deref()) {
            events.push(OutboundEvent::Content {
                content: content.to_string(),
            });
        }

        events
    }

    /// True once a finish reason has been seen.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn normalize_usage(usage: &ChatUsage) -> UsageSummary {
    UsageSummary::new(usage.prompt_tokens, usage.completion_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::*;

    fn delta_chunk(content: Option<&str>, reasoning: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "c1".to_string(),
            model: "test".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: content.map(String::from),
                    reasoning_content: reasoning.map(String::from),
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    fn finish_chunk(reason: &str, usage: Option<(u64, u64, u64)>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "c1".to_string(),
            model: "test".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta::default(),
                finish_reason: Some(reason.to_string()),
            }],
            usage: usage.map(|(p, c, t)| ChatUsage {
                prompt_tokens: p,
                completion_tokens: c,
                total_tokens: t,
            }),
        }
    }

    #[test]
    fn test_content_then_finish() {
        let mut translator = EventTranslator::new(false);

        let mut events = translator.process_chunk(&delta_chunk(Some("Hi"), None));
        events.extend(translator.process_chunk(&delta_chunk(Some(" there"), None)));
        events.extend(translator.process_chunk(&finish_chunk("stop", Some((5, 3, 8)))));

        assert_eq!(
            events,
            vec![
                OutboundEvent::Content { content: "Hi".into() },
                OutboundEvent::Content { content: " there".into() },
                OutboundEvent::Finish {
                    reason: "stop".into(),
                    usage: Some(UsageSummary::new(5, 3)),
                },
            ]
        );
        assert!(translator.is_finished());
    }

    #[test]
    fn test_reasoning_and_content_in_one_chunk() {
        let mut translator = EventTranslator::new(true);
        let events = translator.process_chunk(&delta_chunk(Some("answer"), Some("hmm")));
        assert_eq!(
            events,
            vec![
                OutboundEvent::Reasoning { content: "hmm".into() },
                OutboundEvent::Content { content: "answer".into() },
            ]
        );
    }

    #[test]
    fn test_reasoning_dropped_when_thinking_off() {
        let mut translator = EventTranslator::new(false);
        let events = translator.process_chunk(&delta_chunk(None, Some("secret thoughts")));
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_and_missing_fields_emit_nothing() {
        let mut translator = EventTranslator::new(true);
        assert!(translator
            .process_chunk(&delta_chunk(Some(""), Some("")))
            .is_empty());
        assert!(translator.process_chunk(&delta_chunk(None, None)).is_empty());
        assert!(translator
            .process_chunk(&ChatCompletionChunk::default())
            .is_empty());
        assert!(!translator.is_finished());
    }

    #[test]
    fn test_empty_finish_reason_is_not_a_finish() {
        let mut translator = EventTranslator::new(false);
        let mut chunk = delta_chunk(Some("Hi"), None);
        chunk.choices[0].finish_reason = Some(String::new());

        let events = translator.process_chunk(&chunk);
        assert_eq!(events, vec![OutboundEvent::Content { content: "Hi".into() }]);
        assert!(!translator.is_finished());

        let events = translator.process_chunk(&finish_chunk("stop", None));
        assert_eq!(
            events,
            vec![OutboundEvent::Finish {
                reason: "stop".into(),
                usage: None,
            }]
        );
    }

    #[test]
    fn test_usage_total_is_normalized() {
        let mut translator = EventTranslator::new(false);
        let events = translator.process_chunk(&finish_chunk("length", Some((10, 20, 99))));
        assert_eq!(
            events,
            vec![OutboundEvent::Finish {
                reason: "length".into(),
                usage: Some(UsageSummary {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                }),
            }]
        );
    }

    #[test]
    fn test_finish_without_usage() {
        let mut translator = EventTranslator::new(false);
        let events = translator.process_chunk(&finish_chunk("stop", None));
        assert_eq!(
            events,
            vec![OutboundEvent::Finish {
                reason: "stop".into(),
                usage: None,
            }]
        );
    }

    #[test]
    fn test_nothing_after_finish() {
        let mut translator = EventTranslator::new(true);
        translator.process_chunk(&finish_chunk("stop", None));
        assert!(translator
            .process_chunk(&delta_chunk(Some("late"), Some("late")))
            .is_empty());
        assert!(translator.process_chunk(&finish_chunk("stop", None)).is_empty());
    }
}
