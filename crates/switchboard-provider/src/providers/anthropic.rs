//! Anthropic Claude provider implementation.
//!
//! Implements the Provider trait for Anthropic's Messages API with SSE streaming.
//! Tools are omitted entirely when the tool list is empty.

use crate::error::ProviderError;
use crate::http::{self, SseStream};
use crate::normalize::{self, Conversation};
use crate::retry::RetryPolicy;
use crate::schema::{self, Dialect};
use crate::stream::{self, BlockDelta, StreamAccumulator, StreamEvent};
use crate::traits::{self as contract, Provider};
use crate::types::{
    ChunkSink, CompletionConfig, CompletionResult, ContentBlock, ImageSource, Message, ModelInfo,
    Role, StopReason, Tool, ToolChoice, Usage,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Body keys the settings bag may not override.
const RESERVED_KEYS: &[&str] = &[
    "model",
    "messages",
    "system",
    "tools",
    "tool_choice",
    "max_tokens",
    "stream",
];

/// Anthropic Claude provider.
#[derive(Debug, Default)]
pub struct AnthropicProvider {
    retry: RetryPolicy,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Output limit used when the caller did not set one.
    ///
    /// Anthropic requires `max_tokens`; with extended thinking enabled the
    /// limit must also exceed the thinking budget.
    fn default_max_tokens(&self, config: &CompletionConfig) -> u32 {
        let base = self
            .models()
            .into_iter()
            .find(|m| m.id == config.model)
            .map_or(DEFAULT_MAX_TOKENS, |m| m.max_output_tokens);
        let budget = config
            .provider_config
            .settings
            .get("thinking")
            .and_then(|t| t.get("budget_tokens"))
            .and_then(Value::as_u64)
            .map_or(0, |b| u32::try_from(b).unwrap_or(u32::MAX));
        if budget >= base {
            budget.saturating_add(DEFAULT_MAX_TOKENS)
        } else {
            base
        }
    }

    /// Convert one turn to the Anthropic JSON format.
    fn convert_message(&self, msg: &Message) -> Result<Option<Value>, ProviderError> {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => return Ok(None), // System is handled separately
        };

        let mut content = Vec::with_capacity(msg.blocks.len());
        for block in &msg.blocks {
            if let Some(value) = self.convert_content(msg.role, block)? {
                content.push(value);
            }
        }

        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(json!({
            "role": role,
            "content": content,
        })))
    }

    fn convert_turns(&self, conversation: &Conversation) -> Result<Vec<Value>, ProviderError> {
        let mut native = Vec::with_capacity(conversation.turns.len());
        for turn in &conversation.turns {
            native.extend(self.convert_message(turn)?);
        }
        Ok(native)
    }

    /// Convert a content block to Anthropic format.
    fn convert_content(&self, role: Role, block: &ContentBlock) -> Result<Option<Value>, ProviderError> {
        let value = match (role, block) {
            (_, ContentBlock::Text { text }) if text.is_empty() => return Ok(None),
            (_, ContentBlock::Text { text }) => json!({
                "type": "text",
                "text": text,
            }),
            (
                Role::User,
                ContentBlock::Image {
                    source_kind,
                    mime_type,
                    data,
                },
            ) => {
                let source = match source_kind {
                    ImageSource::Base64 => json!({
                        "type": "base64",
                        "media_type": mime_type,
                        "data": data,
                    }),
                    ImageSource::Url => json!({
                        "type": "url",
                        "url": data,
                    }),
                };
                json!({"type": "image", "source": source})
            }
            (
                Role::Assistant,
                ContentBlock::ToolCall {
                    id,
                    fn_name,
                    fn_args,
                    ..
                },
            ) => json!({
                "type": "tool_use",
                "id": id,
                "name": fn_name,
                "input": fn_args,
            }),
            (Role::User, ContentBlock::ToolResult { id, result, error }) => json!({
                "type": "tool_result",
                "tool_use_id": id,
                "content": result.to_text(),
                "is_error": error,
            }),
            (
                Role::Assistant,
                ContentBlock::Reasoning {
                    reasoning,
                    signature,
                    redacted,
                },
            ) => {
                if *redacted {
                    json!({"type": "redacted_thinking", "data": reasoning})
                } else if let Some(signature) = signature {
                    json!({
                        "type": "thinking",
                        "thinking": reasoning,
                        "signature": signature,
                    })
                } else {
                    json!({
                        "type": "text",
                        "text": normalize::reasoning_markup(reasoning),
                    })
                }
            }
            (role, block) => {
                return Err(ProviderError::UnsupportedContent(format!(
                    "anthropic cannot send a {} block in a {role} message",
                    block.kind()
                )))
            }
        };
        Ok(Some(value))
    }

    /// Convert a Tool to Anthropic format.
    fn convert_tool(&self, tool: &Tool) -> Value {
        let mut value = json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": schema::lower(&tool.params, Dialect::JsonSchema),
        });
        if tool.cache == Some(true) {
            value["cache_control"] = json!({"type": "ephemeral"});
        }
        value
    }

    /// Map one Anthropic SSE event onto the shared stream vocabulary.
    ///
    /// Returns `Ok(None)` for events that carry nothing (ping, block stop).
    fn parse_sse_event(
        &self,
        event: AnthropicEvent,
        seen: &Usage,
    ) -> Result<Option<StreamEvent>, ProviderError> {
        let mapped = match event {
            AnthropicEvent::MessageStart { message } => StreamEvent::MessageStart {
                id: message.id,
                model: message.model,
                usage: message.usage.map(Usage::from),
            },
            AnthropicEvent::ContentBlockStart {
                index,
                content_block,
            } => StreamEvent::BlockStart {
                index,
                block: content_block.into_block()?,
            },
            AnthropicEvent::ContentBlockDelta { index, delta } => StreamEvent::BlockDelta {
                index,
                delta: match delta {
                    Delta::Text { text } => BlockDelta::Text(text),
                    Delta::InputJson { partial_json } => BlockDelta::Json(partial_json),
                    Delta::Thinking { thinking } => BlockDelta::Reasoning(thinking),
                    Delta::Signature { signature } => BlockDelta::Signature(signature),
                    Delta::Other => BlockDelta::Unknown("unrecognized content_block_delta".into()),
                },
            },
            AnthropicEvent::MessageDelta { delta, usage } => StreamEvent::MessageDelta {
                // Anthropic reports cumulative counts; the accumulator adds.
                usage: usage.map(|u| Usage::from(u).since(seen)),
                stop_reason: delta
                    .stop_reason
                    .map(|reason| self.convert_stop_reason(&reason)),
            },
            AnthropicEvent::Error { error } => {
                return Err(if is_rate_limit_type(&error.error_type) {
                    ProviderError::RateLimited(format!("{}: {}", error.error_type, error.message))
                } else {
                    ProviderError::StreamError(format!("{}: {}", error.error_type, error.message))
                })
            }
            AnthropicEvent::ContentBlockStop { .. }
            | AnthropicEvent::Ping
            | AnthropicEvent::MessageStop
            | AnthropicEvent::Other => return Ok(None),
        };
        Ok(Some(mapped))
    }

    /// Build the full request: URL headers and body.
    fn request(
        &self,
        config: &CompletionConfig,
        body: &Value,
    ) -> Result<reqwest::RequestBuilder, ProviderError> {
        let client = contract::require_client(self.name(), config)?;
        Ok(client
            .http
            .post(format!("{}/v1/messages", client.base_url_or(API_BASE)))
            .header("x-api-key", &client.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body))
    }

    async fn stream_completion(
        &self,
        config: &CompletionConfig,
        mut body: Value,
        on_chunk: Option<ChunkSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        body["stream"] = json!(true);
        let request = self.request(config, &body)?;
        let mut events = SseStream::open(self.name(), request, is_rate_limited)?;
        let mut acc = StreamAccumulator::new(self.name(), &config.model);

        while let Some(message) = events.next(cancel).await? {
            if message.data.trim().is_empty() {
                continue;
            }
            let event: AnthropicEvent = serde_json::from_str(&message.data)?;
            if matches!(event, AnthropicEvent::MessageStop) {
                events.close();
                break;
            }
            if let Some(event) = self.parse_sse_event(event, acc.usage())? {
                let chunk = acc.apply(event)?;
                if let Some(sink) = on_chunk {
                    sink(chunk);
                }
            }
        }

        acc.finish()
    }

    async fn complete_once(
        &self,
        config: &CompletionConfig,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        let request = self.request(config, &body)?;
        let resp: AnthropicResponse =
            http::send_json(self.name(), request, is_rate_limited, cancel).await?;

        let blocks = resp
            .content
            .into_iter()
            .map(ContentBlockInfo::into_block)
            .collect::<Result<Vec<_>, _>>()?;

        stream::finalize(
            self.name().to_string(),
            resp.model.unwrap_or_else(|| config.model.clone()),
            blocks,
            resp.usage.map(Usage::from).unwrap_or_default(),
            resp.stop_reason.map(|r| self.convert_stop_reason(&r)),
        )
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".to_string(),
                name: "Claude Sonnet 4".to_string(),
                context_window: 200_000,
                max_output_tokens: 16_384,
                supports_reasoning: true,
                supports_tools: true,
            },
            ModelInfo {
                id: "claude-3-5-sonnet-20241022".to_string(),
                name: "Claude 3.5 Sonnet".to_string(),
                context_window: 200_000,
                max_output_tokens: 8_192,
                supports_reasoning: false,
                supports_tools: true,
            },
            ModelInfo {
                id: "claude-3-5-haiku-20241022".to_string(),
                name: "Claude 3.5 Haiku".to_string(),
                context_window: 200_000,
                max_output_tokens: 8_192,
                supports_reasoning: false,
                supports_tools: true,
            },
        ]
    }

    fn convert_config(&self, config: &CompletionConfig) -> Result<Value, ProviderError> {
        let conversation = normalize::normalize(&config.messages);

        let mut body = json!({
            "model": config.model,
            "messages": self.convert_turns(&conversation)?,
            "max_tokens": config.max_tokens.unwrap_or_else(|| self.default_max_tokens(config)),
        });

        if let Some(system) = &conversation.system {
            body["system"] = json!(system);
        }

        // tool_choice is only accepted alongside tools.
        if let Some(tools) = self.convert_tools(&config.tools) {
            body["tools"] = tools;
            if let Some(choice) = &config.tool_choice {
                body["tool_choice"] = match choice {
                    ToolChoice::Auto => json!({"type": "auto"}),
                    ToolChoice::Required => json!({"type": "any"}),
                    ToolChoice::None => json!({"type": "none"}),
                    ToolChoice::Tool(name) => json!({"type": "tool", "name": name}),
                };
            }
        }

        contract::merge_settings(
            self.name(),
            &mut body,
            &config.provider_config.settings,
            RESERVED_KEYS,
        );
        Ok(body)
    }

    fn convert_messages(&self, messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        self.convert_turns(&normalize::normalize(messages))
    }

    fn convert_tools(&self, tools: &[Tool]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }
        Some(json!(tools
            .iter()
            .map(|t| self.convert_tool(t))
            .collect::<Vec<_>>()))
    }

    fn convert_stop_reason(&self, reason: &str) -> StopReason {
        match reason {
            "end_turn" | "stop_sequence" => StopReason::Natural,
            "max_tokens" | "model_context_window_exceeded" => StopReason::MaxTokens,
            "tool_use" => StopReason::ToolCall,
            "refusal" => StopReason::ContentFilter,
            "pause_turn" => StopReason::Unsupported,
            _ => StopReason::Unknown,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn send_completion(
        &self,
        config: &CompletionConfig,
        on_chunk: Option<ChunkSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        let body = self.convert_config(config)?;
        if config.stream {
            self.stream_completion(config, body, on_chunk, cancel).await
        } else {
            self.complete_once(config, body, cancel).await
        }
    }
}

/// 429, 529 (overloaded), or an explicit rate-limit error body.
fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == 529
        || body.contains("rate_limit_error")
        || body.contains("overloaded_error")
}

fn is_rate_limit_type(error_type: &str) -> bool {
    matches!(error_type, "rate_limit_error" | "overloaded_error")
}

// ──────────────────────────────────────────────────────────
// Anthropic wire types (internal)
// ──────────────────────────────────────────────────────────

/// Top-level SSE event from the Anthropic API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartData },

    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlockInfo,
    },

    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: Delta },

    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        #[allow(dead_code)]
        index: usize,
    },

    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaData,
        #[serde(default)]
        usage: Option<UsageData>,
    },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "error")]
    Error { error: ErrorData },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageStartData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<UsageData>,
}

/// A content block, as announced by `content_block_start` or returned whole
/// by a non-streaming response.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlockInfo {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Option<Value>,
    },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },

    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default)]
        data: String,
    },

    #[serde(other)]
    Other,
}

impl ContentBlockInfo {
    fn into_block(self) -> Result<ContentBlock, ProviderError> {
        Ok(match self {
            ContentBlockInfo::Text { text } => ContentBlock::Text { text },
            // Streaming starts with `input: {}` and sends the arguments as
            // deltas; a non-streaming response carries the full input here.
            ContentBlockInfo::ToolUse { id, name, input } => {
                let buffer = match input {
                    Some(Value::Object(map)) if map.is_empty() => String::new(),
                    Some(Value::Null) | None => String::new(),
                    Some(value) => value.to_string(),
                };
                ContentBlock::tool_call(id, name, buffer)
            }
            ContentBlockInfo::Thinking {
                thinking,
                signature,
            } => ContentBlock::Reasoning {
                reasoning: thinking,
                signature: signature.filter(|s| !s.is_empty()),
                redacted: false,
            },
            ContentBlockInfo::RedactedThinking { data } => ContentBlock::Reasoning {
                reasoning: data,
                signature: None,
                redacted: true,
            },
            ContentBlockInfo::Other => {
                return Err(ProviderError::UnknownDelta(
                    "unrecognized anthropic content block".to_string(),
                ))
            }
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[allow(clippy::enum_variant_names)]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },

    #[serde(rename = "thinking_delta")]
    Thinking { thinking: String },

    #[serde(rename = "signature_delta")]
    Signature { signature: String },

    #[serde(rename = "input_json_delta")]
    InputJson { partial_json: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaData {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

impl From<UsageData> for Usage {
    fn from(u: UsageData) -> Self {
        Usage {
            input_tokens: u.input_tokens.unwrap_or(0),
            output_tokens: u.output_tokens.unwrap_or(0),
            cache_write_tokens: u.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: u.cache_read_input_tokens.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlockInfo>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<UsageData>,
}

// ──────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────
