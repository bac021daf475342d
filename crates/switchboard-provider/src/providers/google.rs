//! Google Gemini provider implementation.
//!
//! Speaks the Generative Language API (`generateContent` and
//! `streamGenerateContent?alt=sse`). The API key travels in the query string.

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
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Settings that belong at the top level of the body rather than in
/// `generationConfig`.
const TOP_LEVEL_SETTINGS: &[&str] = &["safetySettings", "cachedContent", "labels"];

const RESERVED_KEYS: &[&str] = &[
    "contents",
    "systemInstruction",
    "tools",
    "toolConfig",
    "generationConfig",
];

/// Google Gemini provider.
#[derive(Debug, Default)]
pub struct GoogleProvider {
    retry: RetryPolicy,
}

impl GoogleProvider {
    /// Create a new Google provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn unsupported(role: Role, block: &ContentBlock) -> ProviderError {
        ProviderError::UnsupportedContent(format!(
            "google cannot send a {} block in a {role} message",
            block.kind()
        ))
    }

    /// Convert one part. `turns` is the whole normalized history, used to
    /// recover function names for tool results.
    fn convert_part(
        &self,
        role: Role,
        block: &ContentBlock,
        turns: &[Message],
    ) -> Result<Option<Value>, ProviderError> {
        let part = match (role, block) {
            (_, ContentBlock::Text { text }) if text.is_empty() => return Ok(None),
            (_, ContentBlock::Text { text }) => json!({"text": text}),
            (
                Role::User,
                ContentBlock::Image {
                    source_kind: ImageSource::Base64,
                    mime_type,
                    data,
                },
            ) => json!({"inlineData": {"mimeType": mime_type, "data": data}}),
            (
                Role::Assistant,
                ContentBlock::ToolCall {
                    fn_name, fn_args, ..
                },
            ) => json!({"functionCall": {"name": fn_name, "args": fn_args}}),
            (Role::User, ContentBlock::ToolResult { id, result, error }) => {
                let name = normalize::tool_name_for(turns, id).unwrap_or(id.as_str());
                let mut response = Map::new();
                response.insert("name".into(), json!(name));
                let key = if *error { "error" } else { "content" };
                response.insert(key.into(), result.to_value());
                json!({"functionResponse": {"name": name, "response": response}})
            }
            (
                Role::Assistant,
                ContentBlock::Reasoning {
                    redacted: true, ..
                },
            ) => {
                tracing::debug!(provider = "google", "dropping redacted reasoning");
                return Ok(None);
            }
            (
                Role::Assistant,
                ContentBlock::Reasoning {
                    reasoning,
                    signature: Some(signature),
                    ..
                },
            ) => json!({"text": reasoning, "thought": true, "thoughtSignature": signature}),
            (Role::Assistant, ContentBlock::Reasoning { reasoning, .. }) => {
                json!({"text": normalize::reasoning_markup(reasoning)})
            }
            (role, block) => return Err(Self::unsupported(role, block)),
        };
        Ok(Some(part))
    }

    fn convert_turns(&self, conversation: &Conversation) -> Result<Vec<Value>, ProviderError> {
        let mut contents = Vec::with_capacity(conversation.turns.len());
        for turn in &conversation.turns {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => continue,
            };
            let mut parts = Vec::with_capacity(turn.blocks.len());
            for block in &turn.blocks {
                parts.extend(self.convert_part(turn.role, block, &conversation.turns)?);
            }
            if !parts.is_empty() {
                contents.push(json!({"role": role, "parts": parts}));
            }
        }
        Ok(contents)
    }

    fn endpoint(
        &self,
        config: &CompletionConfig,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder, ProviderError> {
        let client = contract::require_client(self.name(), config)?;
        let base = client.base_url_or(API_BASE);
        let request = if stream {
            client
                .http
                .post(format!("{base}/models/{}:streamGenerateContent", config.model))
                .query(&[("alt", "sse"), ("key", client.api_key.as_str())])
        } else {
            client
                .http
                .post(format!("{base}/models/{}:generateContent", config.model))
                .query(&[("key", client.api_key.as_str())])
        };
        Ok(request.header("Content-Type", "application/json"))
    }

    /// Translate one streamed response object into stream events.
    ///
    /// Google sends whole parts rather than indexed deltas: consecutive text
    /// parts share one block, each function call opens its own.
    fn parse_response(
        &self,
        resp: GoogleResponse,
        state: &mut StreamState,
        seen: &Usage,
    ) -> Result<Vec<StreamEvent>, ProviderError> {
        if let Some(error) = resp.error {
            return Err(error.into_error());
        }

        let mut events = Vec::new();
        if !state.started {
            state.started = true;
            events.push(StreamEvent::MessageStart {
                id: resp.response_id,
                model: resp.model_version,
                usage: None,
            });
        }

        let mut stop_reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|_| StopReason::ContentFilter);

        if let Some(candidate) = resp.candidates.into_iter().next() {
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if let Some(call) = part.function_call {
                    let index = state.open_slot();
                    state.text = None;
                    events.push(StreamEvent::BlockStart {
                        index,
                        block: ContentBlock::tool_call(
                            ulid::Ulid::new().to_string(),
                            call.name,
                            String::new(),
                        ),
                    });
                    if !call.args.is_null() {
                        events.push(StreamEvent::BlockDelta {
                            index,
                            delta: BlockDelta::Json(call.args.to_string()),
                        });
                    }
                    continue;
                }

                if part.thought {
                    let index = match state.reasoning {
                        Some(index) => index,
                        None => {
                            let index = state.open_slot();
                            state.reasoning = Some(index);
                            index
                        }
                    };
                    if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                        events.push(StreamEvent::BlockDelta {
                            index,
                            delta: BlockDelta::Reasoning(text),
                        });
                    }
                    if let Some(signature) = part.thought_signature {
                        events.push(StreamEvent::BlockDelta {
                            index,
                            delta: BlockDelta::Signature(signature),
                        });
                    }
                    continue;
                }

                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    let index = match state.text {
                        Some(index) => index,
                        None => {
                            let index = state.open_slot();
                            state.text = Some(index);
                            index
                        }
                    };
                    events.push(StreamEvent::BlockDelta {
                        index,
                        delta: BlockDelta::Text(text),
                    });
                }
            }

            if let Some(reason) = candidate.finish_reason {
                stop_reason = Some(self.convert_stop_reason(&reason));
            }
        }

        // usageMetadata totals are cumulative; the accumulator adds.
        let usage = resp.usage_metadata.map(|u| Usage::from(u).since(seen));
        if usage.is_some() || stop_reason.is_some() {
            events.push(StreamEvent::MessageDelta { usage, stop_reason });
        }

        Ok(events)
    }

    async fn stream_completion(
        &self,
        config: &CompletionConfig,
        body: Value,
        on_chunk: Option<ChunkSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        let request = self.endpoint(config, true)?.json(&body);
        let mut events = SseStream::open(self.name(), request, is_rate_limited)?;
        let mut acc = StreamAccumulator::new(self.name(), &config.model);
        let mut state = StreamState::default();

        while let Some(message) = events.next(cancel).await? {
            if message.data.trim().is_empty() {
                continue;
            }
            let resp: GoogleResponse = serde_json::from_str(&message.data)?;
            let seen = *acc.usage();
            for event in self.parse_response(resp, &mut state, &seen)? {
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
        let request = self.endpoint(config, false)?.json(&body);
        let resp: GoogleResponse =
            http::send_json(self.name(), request, is_rate_limited, cancel).await?;
        if let Some(error) = resp.error {
            return Err(error.into_error());
        }

        let usage = resp.usage_metadata.map(Usage::from).unwrap_or_default();
        let mut stop_reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|_| StopReason::ContentFilter);
        let mut blocks = Vec::new();

        if let Some(candidate) = resp.candidates.into_iter().next() {
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if let Some(call) = part.function_call {
                    blocks.push(ContentBlock::tool_call_with_args(
                        ulid::Ulid::new().to_string(),
                        call.name,
                        call.args,
                    ));
                } else if part.thought {
                    blocks.push(ContentBlock::Reasoning {
                        reasoning: part.text.unwrap_or_default(),
                        signature: part.thought_signature,
                        redacted: false,
                    });
                } else if let Some(text) = part.text {
                    match blocks.last_mut() {
                        Some(ContentBlock::Text { text: prev }) => prev.push_str(&text),
                        _ => blocks.push(ContentBlock::text(text)),
                    }
                }
            }
            if let Some(reason) = candidate.finish_reason {
                stop_reason = Some(self.convert_stop_reason(&reason));
            }
        }

        stream::finalize(
            self.name().to_string(),
            resp.model_version.unwrap_or_else(|| config.model.clone()),
            blocks,
            usage,
            stop_reason,
        )
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gemini-2.5-pro".to_string(),
                name: "Gemini 2.5 Pro".to_string(),
                context_window: 1_048_576,
                max_output_tokens: 65_536,
                supports_reasoning: true,
                supports_tools: true,
            },
            ModelInfo {
                id: "gemini-2.5-flash".to_string(),
                name: "Gemini 2.5 Flash".to_string(),
                context_window: 1_048_576,
                max_output_tokens: 65_536,
                supports_reasoning: true,
                supports_tools: true,
            },
            ModelInfo {
                id: "gemini-2.0-flash".to_string(),
                name: "Gemini 2.0 Flash".to_string(),
                context_window: 1_048_576,
                max_output_tokens: 8_192,
                supports_reasoning: false,
                supports_tools: true,
            },
        ]
    }

    fn convert_config(&self, config: &CompletionConfig) -> Result<Value, ProviderError> {
        let conversation =
            normalize::normalize_for(&config.messages, normalize::carries_unredacted);

        let mut body = json!({
            "contents": self.convert_turns(&conversation)?,
        });

        if let Some(system) = &conversation.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        if let Some(tools) = self.convert_tools(&config.tools) {
            body["tools"] = tools;
            if let Some(choice) = &config.tool_choice {
                let calling = match choice {
                    ToolChoice::Auto => json!({"mode": "AUTO"}),
                    ToolChoice::Required => json!({"mode": "ANY"}),
                    ToolChoice::None => json!({"mode": "NONE"}),
                    ToolChoice::Tool(name) => {
                        json!({"mode": "ANY", "allowedFunctionNames": [name]})
                    }
                };
                body["toolConfig"] = json!({"functionCallingConfig": calling});
            }
        }

        let (top_level, generation_settings): (Map<String, Value>, Map<String, Value>) = config
            .provider_config
            .settings
            .clone()
            .into_iter()
            .partition(|(key, _)| TOP_LEVEL_SETTINGS.contains(&key.as_str()));

        let mut generation = json!({});
        let mut generation_reserved: &[&str] = &[];
        if let Some(max_tokens) = config.max_tokens {
            generation["maxOutputTokens"] = json!(max_tokens);
            generation_reserved = &["maxOutputTokens"];
        }
        contract::merge_settings(
            self.name(),
            &mut generation,
            &generation_settings,
            generation_reserved,
        );
        if generation.as_object().is_some_and(|g| !g.is_empty()) {
            body["generationConfig"] = generation;
        }
        contract::merge_settings(self.name(), &mut body, &top_level, RESERVED_KEYS);

        Ok(body)
    }

    fn convert_messages(&self, messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        self.convert_turns(&normalize::normalize_for(
            messages,
            normalize::carries_unredacted,
        ))
    }

    fn convert_tools(&self, tools: &[Tool]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": schema::lower(&t.params, Dialect::OpenApi),
                })
            })
            .collect();
        Some(json!([{"functionDeclarations": declarations}]))
    }

    fn convert_stop_reason(&self, reason: &str) -> StopReason {
        match reason {
            "STOP" => StopReason::Natural,
            "MAX_TOKENS" => StopReason::MaxTokens,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII"
            | "IMAGE_SAFETY" => StopReason::ContentFilter,
            "LANGUAGE" | "MALFORMED_FUNCTION_CALL" => StopReason::Unsupported,
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

fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED")
}

#[derive(Debug, Default)]
struct StreamState {
    started: bool,
    next_index: usize,
    text: Option<usize>,
    reasoning: Option<usize>,
}

impl StreamState {
    fn open_slot(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

// -- Google wire types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    usage_metadata: Option<GoogleUsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
    #[serde(default)]
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    #[serde(default)]
    content: Option<GoogleContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    thought_signature: Option<String>,
    #[serde(default)]
    function_call: Option<GoogleFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GoogleFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
    #[serde(default)]
    cached_content_token_count: u64,
}

impl From<GoogleUsageMetadata> for Usage {
    fn from(u: GoogleUsageMetadata) -> Self {
        Usage {
            input_tokens: u
                .prompt_token_count
                .saturating_sub(u.cached_content_token_count),
            output_tokens: u.candidates_token_count + u.thoughts_token_count,
            cache_write_tokens: 0,
            cache_read_tokens: u.cached_content_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GoogleError {
    fn into_error(self) -> ProviderError {
        if self.code == 429 || self.status == "RESOURCE_EXHAUSTED" {
            ProviderError::RateLimited(format!("{}: {}", self.status, self.message))
        } else {
            ProviderError::StreamError(format!("{} {}: {}", self.code, self.status, self.message))
        }
    }
}
