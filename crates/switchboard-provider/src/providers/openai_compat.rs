//! Generic OpenAI-compatible provider.
//!
//! Handles the chat completions format shared by OpenAI and Groq. The
//! differences between the two live in [`OpenAiCompatConfig`].

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
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Configuration for an OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub provider_name: String,
    /// Default endpoint, overridable per client handle.
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<ModelInfo>,
    /// Body field carrying the output limit.
    pub max_tokens_field: &'static str,
    /// Ask for a trailing usage chunk via `stream_options.include_usage`.
    pub stream_usage: bool,
}

/// A provider that speaks the OpenAI chat completions protocol.
#[derive(Debug)]
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    retry: RetryPolicy,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(config: OpenAiCompatConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn reserved_keys(&self) -> [&str; 7] {
        [
            "model",
            "messages",
            "tools",
            "tool_choice",
            "stream",
            "stream_options",
            self.config.max_tokens_field,
        ]
    }

    fn unsupported(&self, role: Role, block: &ContentBlock) -> ProviderError {
        ProviderError::UnsupportedContent(format!(
            "{} cannot send a {} block in a {role} message",
            self.config.provider_name,
            block.kind()
        ))
    }

    /// A user turn becomes one `tool` message per result, then the user
    /// message itself if anything else is left.
    fn convert_user(&self, msg: &Message, out: &mut Vec<Value>) -> Result<(), ProviderError> {
        let mut parts = Vec::new();
        for block in &msg.blocks {
            match block {
                ContentBlock::ToolResult { id, result, .. } => out.push(json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": result.to_text(),
                })),
                ContentBlock::Text { text } if text.is_empty() => {}
                ContentBlock::Text { text } => parts.push(json!({"type": "text", "text": text})),
                ContentBlock::Image {
                    source_kind,
                    mime_type,
                    data,
                } => {
                    let url = match source_kind {
                        ImageSource::Url => data.clone(),
                        ImageSource::Base64 => format!("data:{mime_type};base64,{data}"),
                    };
                    parts.push(json!({"type": "image_url", "image_url": {"url": url}}));
                }
                other => return Err(self.unsupported(Role::User, other)),
            }
        }

        if parts.is_empty() {
            return Ok(());
        }
        let text_only = parts.iter().all(|p| p["type"] == "text");
        let content = if text_only {
            json!(parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n"))
        } else {
            json!(parts)
        };
        out.push(json!({"role": "user", "content": content}));
        Ok(())
    }

    fn convert_assistant(&self, msg: &Message) -> Result<Option<Value>, ProviderError> {
        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        for block in &msg.blocks {
            match block {
                ContentBlock::Text { text: t } => {
                    if !t.is_empty() {
                        text.push(t.clone());
                    }
                }
                ContentBlock::Reasoning {
                    redacted: true, ..
                } => {
                    tracing::debug!(
                        provider = %self.config.provider_name,
                        "dropping redacted reasoning"
                    );
                }
                ContentBlock::Reasoning { reasoning, .. } => {
                    text.push(normalize::reasoning_markup(reasoning));
                }
                ContentBlock::ToolCall {
                    id,
                    fn_name,
                    fn_args,
                    ..
                } => tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": fn_name,
                        "arguments": fn_args.to_string(),
                    }
                })),
                other => return Err(self.unsupported(Role::Assistant, other)),
            }
        }

        if text.is_empty() && tool_calls.is_empty() {
            return Ok(None);
        }
        let mut value = json!({"role": "assistant"});
        value["content"] = if text.is_empty() {
            Value::Null
        } else {
            json!(text.join("\n"))
        };
        if !tool_calls.is_empty() {
            value["tool_calls"] = json!(tool_calls);
        }
        Ok(Some(value))
    }

    fn convert_turns(&self, conversation: &Conversation) -> Result<Vec<Value>, ProviderError> {
        let mut native = Vec::with_capacity(conversation.turns.len());
        for turn in &conversation.turns {
            match turn.role {
                Role::User => self.convert_user(turn, &mut native)?,
                Role::Assistant => native.extend(self.convert_assistant(turn)?),
                Role::System => {}
            }
        }
        Ok(native)
    }

    /// Translate one SSE chunk into stream events.
    ///
    /// The wire format has no block indices: text, reasoning and every tool
    /// call get their own slot the first time they appear.
    fn parse_chunk(
        &self,
        chunk: OpenAiChunk,
        state: &mut StreamState,
        seen: &Usage,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if !state.started {
            state.started = true;
            events.push(StreamEvent::MessageStart {
                id: chunk.id.clone(),
                model: chunk.model.clone(),
                usage: None,
            });
        }

        for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
            let delta = choice.delta;

            if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
                let index = *state.reasoning.get_or_insert_with(|| state.next_index.next());
                events.push(StreamEvent::BlockDelta {
                    index,
                    delta: BlockDelta::Reasoning(reasoning),
                });
            }

            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                let index = *state.text.get_or_insert_with(|| state.next_index.next());
                events.push(StreamEvent::BlockDelta {
                    index,
                    delta: BlockDelta::Text(content),
                });
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or_default();
                let index = match state.tools.get(&call.index) {
                    Some(index) => *index,
                    None => {
                        let index = state.next_index.next();
                        state.tools.insert(call.index, index);
                        events.push(StreamEvent::BlockStart {
                            index,
                            block: ContentBlock::tool_call(
                                call.id.unwrap_or_else(|| ulid::Ulid::new().to_string()),
                                function.name.clone().unwrap_or_default(),
                                String::new(),
                            ),
                        });
                        index
                    }
                };
                if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
                    events.push(StreamEvent::BlockDelta {
                        index,
                        delta: BlockDelta::Json(args),
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::MessageDelta {
                    usage: None,
                    stop_reason: Some(self.convert_stop_reason(&reason)),
                });
            }
        }

        let usage = chunk
            .usage
            .or_else(|| chunk.x_groq.and_then(|x| x.usage));
        if let Some(usage) = usage {
            events.push(StreamEvent::MessageDelta {
                usage: Some(Usage::from(usage).since(seen)),
                stop_reason: None,
            });
        }

        events
    }

    fn request(
        &self,
        config: &CompletionConfig,
        body: &Value,
    ) -> Result<reqwest::RequestBuilder, ProviderError> {
        let client = contract::require_client(self.name(), config)?;
        Ok(client
            .http
            .post(format!(
                "{}/chat/completions",
                client.base_url_or(&self.config.base_url)
            ))
            .bearer_auth(&client.api_key)
            .header("Content-Type", "application/json")
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
        if self.config.stream_usage {
            body["stream_options"] = json!({"include_usage": true});
        }
        let request = self.request(config, &body)?;
        let mut events = SseStream::open(self.name(), request, http::is_http_429)?;
        let mut acc = StreamAccumulator::new(self.name(), &config.model);
        let mut state = StreamState::default();
        let mut finished = false;

        while let Some(message) = events.next(cancel).await? {
            let data = message.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                finished = true;
                events.close();
                break;
            }
            let chunk: OpenAiChunk = serde_json::from_str(data)?;
            if let Some(error) = chunk.error {
                return Err(stream_error(&error));
            }
            let seen = *acc.usage();
            for event in self.parse_chunk(chunk, &mut state, &seen) {
                let chunk = acc.apply(event)?;
                if let Some(sink) = on_chunk {
                    sink(chunk);
                }
            }
        }

        if !finished {
            tracing::warn!(
                provider = %self.config.provider_name,
                "stream ended without [DONE]"
            );
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
        let resp: OpenAiResponse =
            http::send_json(self.name(), request, http::is_http_429, cancel).await?;

        let usage = resp
            .usage
            .or_else(|| resp.x_groq.and_then(|x| x.usage))
            .map(Usage::from)
            .unwrap_or_default();

        let Some(choice) = resp.choices.into_iter().next() else {
            return stream::finalize(
                self.name().to_string(),
                config.model.clone(),
                Vec::new(),
                usage,
                None,
            );
        };

        let mut blocks = Vec::new();
        if let Some(reasoning) = choice.message.reasoning.filter(|r| !r.is_empty()) {
            blocks.push(ContentBlock::reasoning(reasoning));
        }
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            let function = call.function.unwrap_or_default();
            blocks.push(ContentBlock::tool_call(
                call.id.unwrap_or_else(|| ulid::Ulid::new().to_string()),
                function.name.unwrap_or_default(),
                function.arguments.unwrap_or_default(),
            ));
        }

        stream::finalize(
            self.name().to_string(),
            resp.model.unwrap_or_else(|| config.model.clone()),
            blocks,
            usage,
            choice.finish_reason.map(|r| self.convert_stop_reason(&r)),
        )
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    fn models(&self) -> Vec<ModelInfo> {
        self.config.models.clone()
    }

    fn convert_config(&self, config: &CompletionConfig) -> Result<Value, ProviderError> {
        let conversation =
            normalize::normalize_for(&config.messages, normalize::carries_unredacted);
        let mut messages = Vec::with_capacity(conversation.turns.len() + 1);
        if let Some(system) = &conversation.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.extend(self.convert_turns(&conversation)?);

        let mut body = json!({
            "model": config.model,
            "messages": messages,
        });

        if let Some(max_tokens) = config.max_tokens {
            body[self.config.max_tokens_field] = json!(max_tokens);
        }

        // tool_choice without tools is rejected by the API.
        if let Some(tools) = self.convert_tools(&config.tools) {
            body["tools"] = tools;
            if let Some(choice) = &config.tool_choice {
                body["tool_choice"] = match choice {
                    ToolChoice::Auto => json!("auto"),
                    ToolChoice::Required => json!("required"),
                    ToolChoice::None => json!("none"),
                    ToolChoice::Tool(name) => {
                        json!({"type": "function", "function": {"name": name}})
                    }
                };
            }
        }

        contract::merge_settings(
            self.name(),
            &mut body,
            &config.provider_config.settings,
            &self.reserved_keys(),
        );
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
        Some(json!(tools
            .iter()
            .map(|t| json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": schema::lower(&t.params, Dialect::JsonSchema),
                }
            }))
            .collect::<Vec<_>>()))
    }

    fn convert_stop_reason(&self, reason: &str) -> StopReason {
        match reason {
            "stop" => StopReason::Natural,
            "length" => StopReason::MaxTokens,
            "tool_calls" | "function_call" => StopReason::ToolCall,
            "content_filter" => StopReason::ContentFilter,
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

/// Slot bookkeeping for one streaming response.
#[derive(Debug, Default)]
struct StreamState {
    started: bool,
    next_index: SlotCounter,
    text: Option<usize>,
    reasoning: Option<usize>,
    tools: HashMap<u32, usize>,
}

#[derive(Debug, Default)]
struct SlotCounter(usize);

impl SlotCounter {
    fn next(&mut self) -> usize {
        let index = self.0;
        self.0 += 1;
        index
    }
}

/// An `{"error": ...}` payload delivered inside the stream. Rate limits
/// arrive this way too once the response has started.
fn stream_error(error: &Value) -> ProviderError {
    let field = |key: &str| error.get(key).and_then(Value::as_str).unwrap_or_default();
    let message = match field("message") {
        "" => error.to_string(),
        message => message.to_string(),
    };
    if field("code") == "rate_limit_exceeded" || field("type") == "rate_limit_exceeded" {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::StreamError(message)
    }
}

// -- OpenAI wire types --

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChunkChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    x_groq: Option<GroqExtension>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunkChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content")]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

/// Tool call as it appears in both stream deltas and full responses.
#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqExtension {
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

impl From<OpenAiUsage> for Usage {
    /// Cached prompt tokens are reported inside `prompt_tokens`; they are
    /// split out so the counters never overlap.
    fn from(u: OpenAiUsage) -> Self {
        let cached = u.prompt_tokens_details.map_or(0, |d| d.cached_tokens);
        Usage {
            input_tokens: u.prompt_tokens.saturating_sub(cached),
            output_tokens: u.completion_tokens,
            cache_write_tokens: 0,
            cache_read_tokens: cached,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    x_groq: Option<GroqExtension>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "reasoning_content")]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Param, ParamSchema};

    fn test_config() -> OpenAiCompatConfig {
        OpenAiCompatConfig {
            provider_name: "test".to_string(),
            base_url: "https://api.example.com/v1".to_string(),
            default_model: "test-model".to_string(),
            models: vec![ModelInfo {
                id: "test-model".to_string(),
                name: "Test Model".to_string(),
                context_window: 8192,
                max_output_tokens: 4096,
                supports_reasoning: false,
                supports_tools: true,
            }],
            max_tokens_field: "max_tokens",
            stream_usage: false,
        }
    }

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(test_config())
    }

    fn parse(p: &OpenAiCompatProvider, state: &mut StreamState, data: &str) -> Vec<StreamEvent> {
        let chunk: OpenAiChunk = serde_json::from_str(data).unwrap();
        p.parse_chunk(chunk, state, &Usage::default())
    }

    fn read_tool() -> Tool {
        Tool {
            name: "read".to_string(),
            description: "Read a file".to_string(),
            params: ParamSchema::object(vec![Param::required("path", ParamSchema::string())]),
            cache: None,
        }
    }

    #[test]
    fn test_provider_name() {
        let p = provider();
        assert_eq!(p.name(), "test");
        assert_eq!(p.default_model(), "test-model");
        assert_eq!(p.models().len(), 1);
    }

    #[test]
    fn test_build_request_body() {
        let p = provider();
        let mut config = CompletionConfig::new(
            "test-model",
            vec![Message::system("Be helpful"), Message::user("Hello")],
        );
        config.max_tokens = Some(1024);

        let body = p.convert_config(&config).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("stream").is_none());
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[0]["content"], "Be helpful");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_with_tools() {
        let p = provider();
        let mut config = CompletionConfig::new("test-model", vec![Message::user("go")]);
        config.tools = vec![read_tool()];
        config.tool_choice = Some(ToolChoice::Tool("read".to_string()));

        let body = p.convert_config(&config).unwrap();
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "read");
        assert_eq!(tools[0]["function"]["parameters"]["required"][0], "path");
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "function": {"name": "read"}})
        );
    }

    #[test]
    fn test_tool_choice_dropped_without_tools() {
        let p = provider();
        let mut config = CompletionConfig::new("test-model", vec![Message::user("go")]);
        config.tool_choice = Some(ToolChoice::Required);
        let body = p.convert_config(&config).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_choice_mapping() {
        let p = provider();
        let mut config = CompletionConfig::new("test-model", vec![Message::user("go")]);
        config.tools = vec![read_tool()];

        let cases = [
            (ToolChoice::Auto, json!("auto")),
            (ToolChoice::Required, json!("required")),
            (ToolChoice::None, json!("none")),
        ];
        for (choice, expected) in cases {
            config.tool_choice = Some(choice);
            let body = p.convert_config(&config).unwrap();
            assert!(body["tools"].is_array());
            assert_eq!(body["tool_choice"], expected);
        }

        config.tool_choice = None;
        let body = p.convert_config(&config).unwrap();
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_turns_with_no_content_do_not_break_turn_order() {
        let p = provider();
        let native = p
            .convert_messages(&[Message::user(""), Message::assistant("hi")])
            .unwrap();
        let roles: Vec<&str> = native.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert_eq!(native[0]["content"], "begin");

        let redacted = Message::new(
            Role::Assistant,
            vec![ContentBlock::Reasoning {
                reasoning: "opaque".to_string(),
                signature: None,
                redacted: true,
            }],
        );
        let native = p
            .convert_messages(&[
                Message::user("q"),
                Message::assistant("a"),
                Message::user(""),
                redacted,
                Message::assistant("b"),
            ])
            .unwrap();
        let roles: Vec<&str> = native.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
        assert_eq!(native[2]["content"], "Continue.");
        assert_eq!(native[3]["content"], "b");
    }

    #[test]
    fn test_convert_tool_round() {
        let p = provider();
        let messages = vec![
            Message::user("read it"),
            Message::new(
                Role::Assistant,
                vec![
                    ContentBlock::text("Reading."),
                    ContentBlock::tool_call("call_1", "read", r#"{"path":"a.rs"}"#),
                ],
            ),
            Message::new(
                Role::User,
                vec![
                    ContentBlock::tool_result("call_1", "fn main() {}", false),
                    ContentBlock::text("thanks"),
                ],
            ),
        ];
        let native = p.convert_messages(&messages).unwrap();
        assert_eq!(native.len(), 4);
        assert_eq!(native[1]["content"], "Reading.");
        assert_eq!(native[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            native[1]["tool_calls"][0]["function"]["arguments"],
            r#"{"path":"a.rs"}"#
        );
        assert_eq!(native[2]["role"], "tool");
        assert_eq!(native[2]["tool_call_id"], "call_1");
        assert_eq!(native[3]["role"], "user");
        assert_eq!(native[3]["content"], "thanks");
    }

    #[test]
    fn test_image_parts() {
        let p = provider();
        let messages = vec![Message::new(
            Role::User,
            vec![
                ContentBlock::text("what is this"),
                ContentBlock::Image {
                    source_kind: ImageSource::Base64,
                    mime_type: "image/png".to_string(),
                    data: "aGVsbG8=".to_string(),
                },
            ],
        )];
        let native = p.convert_messages(&messages).unwrap();
        assert_eq!(native[0]["content"][1]["type"], "image_url");
        assert_eq!(
            native[0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn test_reasoning_sent_as_markup() {
        let p = provider();
        let messages = vec![
            Message::user("hi"),
            Message::new(
                Role::Assistant,
                vec![ContentBlock::reasoning("hmm"), ContentBlock::text("hello")],
            ),
        ];
        let native = p.convert_messages(&messages).unwrap();
        assert_eq!(native[1]["content"], "<thinking>\nhmm\n</thinking>\nhello");
    }

    #[test]
    fn test_assistant_image_is_unsupported() {
        let p = provider();
        let messages = vec![
            Message::user("hi"),
            Message::new(
                Role::Assistant,
                vec![ContentBlock::Image {
                    source_kind: ImageSource::Url,
                    mime_type: "image/png".to_string(),
                    data: "https://example.com/a.png".to_string(),
                }],
            ),
        ];
        let err = p.convert_messages(&messages).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedContent(_)));
    }

    #[test]
    fn test_parse_text_delta() {
        let p = provider();
        let mut state = StreamState::default();
        let events = parse(
            &p,
            &mut state,
            r#"{"id":"chatcmpl-1","model":"test-model","choices":[{"delta":{"content":"Hello"},"index":0}]}"#,
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::MessageStart { id: Some(id), .. } if id == "chatcmpl-1"));
        assert_eq!(
            events[1],
            StreamEvent::BlockDelta {
                index: 0,
                delta: BlockDelta::Text("Hello".to_string())
            }
        );
    }

    #[test]
    fn test_parse_tool_call_slots() {
        let p = provider();
        let mut state = StreamState::default();
        parse(&p, &mut state, r#"{"choices":[{"delta":{"content":"Let me look."},"index":0}]}"#);
        let events = parse(
            &p,
            &mut state,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read","arguments":"{\"pa"}}]},"index":0}]}"#,
        );
        assert!(matches!(
            &events[0],
            StreamEvent::BlockStart { index: 1, block: ContentBlock::ToolCall { fn_name, .. } } if fn_name == "read"
        ));
        assert_eq!(
            events[1],
            StreamEvent::BlockDelta {
                index: 1,
                delta: BlockDelta::Json("{\"pa".to_string())
            }
        );

        let events = parse(
            &p,
            &mut state,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"th\":1}"}}]},"index":0}]}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::BlockDelta {
                index: 1,
                delta: BlockDelta::Json("th\":1}".to_string())
            }]
        );
    }

    #[test]
    fn test_parse_reasoning_delta() {
        let p = provider();
        let mut state = StreamState::default();
        let events = parse(
            &p,
            &mut state,
            r#"{"choices":[{"delta":{"reasoning":"thinking"},"index":0}]}"#,
        );
        assert_eq!(
            events[1],
            StreamEvent::BlockDelta {
                index: 0,
                delta: BlockDelta::Reasoning("thinking".to_string())
            }
        );
    }

    #[test]
    fn test_parse_finish_and_usage() {
        let p = provider();
        let mut state = StreamState {
            started: true,
            ..Default::default()
        };
        let events = parse(
            &p,
            &mut state,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls","index":0}]}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::MessageDelta {
                usage: None,
                stop_reason: Some(StopReason::ToolCall)
            }]
        );

        let events = parse(
            &p,
            &mut state,
            r#"{"choices":[],"x_groq":{"usage":{"prompt_tokens":12,"completion_tokens":5,"prompt_tokens_details":{"cached_tokens":2}}}}"#,
        );
        match &events[0] {
            StreamEvent::MessageDelta {
                usage: Some(usage), ..
            } => {
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 5);
                assert_eq!(usage.cache_read_tokens, 2);
            }
            other => panic!("Expected usage delta, got {other:?}"),
        }
    }

    #[test]
    fn test_in_stream_error_kinds() {
        let err = stream_error(&json!({
            "message": "Rate limit reached for model",
            "type": "tokens",
            "code": "rate_limit_exceeded",
        }));
        assert!(matches!(&err, ProviderError::RateLimited(m) if m == "Rate limit reached for model"));
        assert!(err.is_rate_limited());

        let err = stream_error(&json!({"type": "rate_limit_exceeded", "message": "slow down"}));
        assert!(err.is_rate_limited());

        let err = stream_error(&json!({"type": "server_error", "message": "boom"}));
        assert!(matches!(&err, ProviderError::StreamError(m) if m == "boom"));

        let err = stream_error(&json!("bare"));
        assert!(matches!(err, ProviderError::StreamError(_)));
    }

    #[test]
    fn test_stop_reason_mapping() {
        let p = provider();
        assert_eq!(p.convert_stop_reason("stop"), StopReason::Natural);
        assert_eq!(p.convert_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(p.convert_stop_reason("function_call"), StopReason::ToolCall);
        assert_eq!(p.convert_stop_reason("content_filter"), StopReason::ContentFilter);
        assert_eq!(p.convert_stop_reason("whatever"), StopReason::Unknown);
    }
}
