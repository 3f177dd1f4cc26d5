use crate::config::RelayConfig;
use crate::error::{Result, UpstreamFailure};
use crate::logging::{LogEntry, LogLevel, SharedLogger};
use crate::translate::chat_types::{Message, OutboundEvent, SseFrame, UsageSummary, DONE_SENTINEL};
use crate::translate::openai_types::{ChatCompletionChunk, ChatCompletionRequest, ChatErrorResponse};
use crate::translate::request::{build_chat_request, RequestTemplate};
use crate::translate::streaming::EventTranslator;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::Stream;
use futures::StreamExt;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

/// Frames for one client stream: zero or more fragments, one terminal event, `[DONE]`.
pub type SseStream = Pin<Box<dyn Stream<Item = SseFrame> + Send>>;

/// Everything needed to open upstream streams. Built once at startup and shared
/// read-only by all requests.
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    template: RequestTemplate,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn from_config(
        config: &RelayConfig,
        api_key: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        config.validate()?;
        let base_url = config.effective_base_url()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            template: RequestTemplate {
                model: config.provider.model.clone(),
                system_prompt: config.chat.system_prompt.clone(),
                max_tokens: config.chat.max_tokens,
                thinking_extension: config.effective_thinking_extension()?,
            },
            timeout: Duration::from_secs(config.chat.timeout_secs),
        })
    }

    /// Replace the end-to-end deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.template.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn build_request(&self, messages: &[Message], thinking: bool) -> ChatCompletionRequest {
        build_chat_request(&self.template, messages, thinking)
    }

    /// Send the request and check the status. The body is left unread.
    async fn open(
        &self,
        req: &ChatCompletionRequest,
    ) -> std::result::Result<reqwest::Response, UpstreamFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(req)
            .send()
            .await
            .map_err(|e| UpstreamFailure::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ChatErrorResponse>(&body) {
                Ok(err) => err.error.message,
                Err(_) if body.trim().is_empty() => "empty response body".to_string(),
                Err(_) => truncate(body.trim(), 300).to_string(),
            };
            return Err(UpstreamFailure::Status { status, message });
        }

        Ok(response)
    }
}

/// Relay one conversation: open the upstream stream lazily on first poll and
/// translate it into client frames.
///
/// Dropping the returned stream (client gone) drops the upstream response and
/// with it the connection.
pub fn stream_chat(
    upstream: Arc<UpstreamClient>,
    messages: Vec<Message>,
    thinking: bool,
    logger: SharedLogger,
    request_id: Uuid,
) -> SseStream {
    Box::pin(async_stream::stream! {
        let mut exchange = ExchangeGuard::new(logger.clone(), request_id);
        let deadline = Instant::now() + upstream.timeout;
        let request = upstream.build_request(&messages, thinking);

        logger.log(
            LogEntry::new(
                LogLevel::Info,
                "relay",
                format!(
                    "POST {} model={} messages={} thinking={}",
                    upstream.endpoint,
                    request.model,
                    request.messages.len(),
                    thinking
                ),
            )
            .for_request(request_id),
        );

        let opened = match timeout_at(deadline, upstream.open(&request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamFailure::Timeout(upstream.timeout)),
        };

        match opened {
            Ok(response) => {
                let events =
                    translate_byte_stream(response.bytes_stream(), thinking, deadline, upstream.timeout);
                tokio::pin!(events);

                while let Some(item) = events.next().await {
                    match item {
                        Ok(event) => {
                            exchange.observe(&event);
                            yield SseFrame::Event(event);
                        }
                        Err(failure) => {
                            exchange.fail(&failure);
                            yield SseFrame::Event(error_event(&failure));
                        }
                    }
                }
            }
            Err(failure) => {
                exchange.fail(&failure);
                yield SseFrame::Event(error_event(&failure));
            }
        }

        yield SseFrame::Done;
    })
}

/// Parse an OpenAI SSE byte stream into client events.
///
/// The stream always ends with exactly one terminal item: `Ok(Finish)` or
/// `Err(failure)`. Nothing is read after it.
pub fn translate_byte_stream<S, B, E>(
    bytes: S,
    thinking: bool,
    deadline: Instant,
    budget: Duration,
) -> impl Stream<Item = std::result::Result<OutboundEvent, UpstreamFailure>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut translator = EventTranslator::new(thinking);
        let frames = bytes.eventsource();
        tokio::pin!(frames);

        loop {
            let next = match timeout_at(deadline, frames.next()).await {
                Ok(next) => next,
                Err(_) => {
                    yield Err(UpstreamFailure::Timeout(budget));
                    break;
                }
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(EventStreamError::Transport(e))) => {
                    yield Err(UpstreamFailure::Stream(e.to_string()));
                    break;
                }
                Some(Err(e)) => {
                    yield Err(UpstreamFailure::Decode(e.to_string()));
                    break;
                }
                None => {
                    yield Err(UpstreamFailure::Truncated);
                    break;
                }
            };

            let data = frame.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                yield Err(UpstreamFailure::Truncated);
                break;
            }

            match decode_chunk(data) {
                Ok(chunk) => {
                    for event in translator.process_chunk(&chunk) {
                        yield Ok(event);
                    }
                    if translator.is_finished() {
                        break;
                    }
                }
                Err(failure) => {
                    yield Err(failure);
                    break;
                }
            }
        }
    }
}

/// An `{"error": ...}` payload is checked first: every chunk field is optional,
/// so it would otherwise decode as an empty chunk.
fn decode_chunk(data: &str) -> std::result::Result<ChatCompletionChunk, UpstreamFailure> {
    if let Ok(err) = serde_json::from_str::<ChatErrorResponse>(data) {
        return Err(UpstreamFailure::Provider {
            message: err.error.message,
        });
    }

    serde_json::from_str(data)
        .map_err(|e| UpstreamFailure::Decode(format!("{e}: {}", truncate(data, 200))))
}

fn error_event(failure: &UpstreamFailure) -> OutboundEvent {
    OutboundEvent::Error {
        message: failure.to_string(),
    }
}

/// Logs how an exchange ended. If it is dropped before a terminal event was
/// seen, the client went away mid-stream.
struct ExchangeGuard {
    logger: SharedLogger,
    request_id: Uuid,
    started: Instant,
    fragments: usize,
    settled: bool,
}

impl ExchangeGuard {
    fn new(logger: SharedLogger, request_id: Uuid) -> Self {
        Self {
            logger,
            request_id,
            started: Instant::now(),
            fragments: 0,
            settled: false,
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn observe(&mut self, event: &OutboundEvent) {
        match event {
            OutboundEvent::Finish { reason, usage } => self.finish(reason, usage.as_ref()),
            OutboundEvent::Error { .. } => self.settled = true,
            OutboundEvent::Reasoning { .. } | OutboundEvent::Content { .. } => self.fragments += 1,
        }
    }

    fn finish(&mut self, reason: &str, usage: Option<&UsageSummary>) {
        self.settled = true;
        tracing::debug!(request_id = %self.request_id, reason, fragments = self.fragments, "Stream finished");
        self.logger.log(
            LogEntry::new(
                LogLevel::Info,
                "relay",
                format!(
                    "Completed: reason={} fragments={} elapsed_ms={}",
                    reason,
                    self.fragments,
                    self.elapsed_ms()
                ),
            )
            .for_request(self.request_id)
            .with_context(serde_json::json!({ "usage": usage })),
        );
    }

    fn fail(&mut self, failure: &UpstreamFailure) {
        self.settled = true;
        tracing::warn!(request_id = %self.request_id, kind = failure.kind(), "Upstream failure: {}", failure);
        let level = if failure.is_transport() {
            LogLevel::Error
        } else {
            LogLevel::Warn
        };
        self.logger.log(
            LogEntry::new(level, "relay", format!("Upstream failure: {failure}"))
                .for_request(self.request_id)
                .with_context(serde_json::json!({
                    "kind": failure.kind(),
                    "fragments": self.fragments,
                    "elapsed_ms": self.elapsed_ms(),
                })),
        );
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::info!(request_id = %self.request_id, "Client disconnected mid-stream");
        self.logger.log(
            LogEntry::new(
                LogLevel::Warn,
                "relay",
                format!(
                    "Client disconnected after {} fragments; upstream released",
                    self.fragments
                ),
            )
            .for_request(self.request_id),
        );
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
