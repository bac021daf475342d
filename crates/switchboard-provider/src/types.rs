//! Canonical content model shared by every adapter.

use crate::json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// User input (including tool results)
    User,
    /// AI assistant response
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Where an image's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// `data` is a URL the backend fetches itself.
    Url,
    /// `data` is base64-encoded image bytes.
    Base64,
}

/// Payload of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// Plain text output.
    Text(String),
    /// Structured output.
    Json(Value),
}

impl ToolOutput {
    /// Render the output as a string, serializing structured values.
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
        }
    }

    /// Render the output as a JSON value, wrapping plain text.
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutput::Text(text) => Value::String(text.clone()),
            ToolOutput::Json(value) => value.clone(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

/// A block of content within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "WireBlock")]
pub enum ContentBlock {
    /// Plain text content.
    Text { text: String },

    /// An image, either by URL or inline base64.
    Image {
        source_kind: ImageSource,
        mime_type: String,
        data: String,
    },

    /// A tool invocation by the assistant.
    ///
    /// `fn_args_buffer` is the raw argument text as received; `fn_args` is
    /// always a parse of it (or `{}`), never set independently.
    ToolCall {
        id: String,
        fn_name: String,
        fn_args: Value,
        fn_args_buffer: String,
    },

    /// The result of a tool invocation, keyed by the call id.
    ToolResult {
        id: String,
        result: ToolOutput,
        error: bool,
    },

    /// Model reasoning.
    Reasoning {
        reasoning: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        redacted: bool,
    },
}

/// Deserialization shape of [`ContentBlock`]. A tool call may arrive with
/// only one of `fn_args` and `fn_args_buffer`; the other is rebuilt from it.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    Image {
        source_kind: ImageSource,
        mime_type: String,
        data: String,
    },
    ToolCall {
        id: String,
        fn_name: String,
        #[serde(default)]
        fn_args: Option<Value>,
        #[serde(default)]
        fn_args_buffer: Option<String>,
    },
    ToolResult {
        id: String,
        result: ToolOutput,
        #[serde(default)]
        error: bool,
    },
    Reasoning {
        reasoning: String,
        #[serde(default)]
        signature: Option<String>,
        #[serde(default)]
        redacted: bool,
    },
}

impl From<WireBlock> for ContentBlock {
    fn from(wire: WireBlock) -> Self {
        match wire {
            WireBlock::Text { text } => ContentBlock::Text { text },
            WireBlock::Image {
                source_kind,
                mime_type,
                data,
            } => ContentBlock::Image {
                source_kind,
                mime_type,
                data,
            },
            WireBlock::ToolCall {
                id,
                fn_name,
                fn_args,
                fn_args_buffer,
            } => {
                // The buffer wins when both are present.
                let buffer = fn_args_buffer.unwrap_or_else(|| {
                    fn_args.unwrap_or_else(|| Value::Object(Map::new())).to_string()
                });
                ContentBlock::tool_call(id, fn_name, buffer)
            }
            WireBlock::ToolResult { id, result, error } => {
                ContentBlock::ToolResult { id, result, error }
            }
            WireBlock::Reasoning {
                reasoning,
                signature,
                redacted,
            } => ContentBlock::Reasoning {
                reasoning,
                signature,
                redacted,
            },
        }
    }
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create a tool call from a complete argument string.
    pub fn tool_call(
        id: impl Into<String>,
        fn_name: impl Into<String>,
        fn_args_buffer: impl Into<String>,
    ) -> Self {
        let fn_args_buffer = fn_args_buffer.into();
        ContentBlock::ToolCall {
            id: id.into(),
            fn_name: fn_name.into(),
            fn_args: json::parse_strict(&fn_args_buffer),
            fn_args_buffer,
        }
    }

    /// Create a tool call from already-structured arguments.
    pub fn tool_call_with_args(
        id: impl Into<String>,
        fn_name: impl Into<String>,
        fn_args: Value,
    ) -> Self {
        Self::tool_call(id, fn_name, fn_args.to_string())
    }

    /// Create a tool result block.
    pub fn tool_result(id: impl Into<String>, result: impl Into<ToolOutput>, error: bool) -> Self {
        ContentBlock::ToolResult {
            id: id.into(),
            result: result.into(),
            error,
        }
    }

    /// Create a reasoning block without signature.
    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        ContentBlock::Reasoning {
            reasoning: reasoning.into(),
            signature: None,
            redacted: false,
        }
    }

    /// Whether this is a tool call.
    pub fn is_tool_call(&self) -> bool {
        matches!(self, ContentBlock::ToolCall { .. })
    }

    /// Whether the block carries anything a caller could use.
    pub fn is_usable(&self) -> bool {
        match self {
            ContentBlock::Text { text } => !text.is_empty(),
            ContentBlock::Reasoning {
                reasoning,
                signature,
                redacted,
            } => !reasoning.is_empty() || signature.is_some() || *redacted,
            _ => true,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Image { .. } => "image",
            ContentBlock::ToolCall { .. } => "tool_call",
            ContentBlock::ToolResult { .. } => "tool_result",
            ContentBlock::Reasoning { .. } => "reasoning",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Content blocks, in rendering order.
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    /// Create a message from blocks.
    pub fn new(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self { role, blocks }
    }

    /// Create a user message from text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message from text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Create a system message from text.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the message contains at least one tool call.
    pub fn has_tool_call(&self) -> bool {
        self.blocks.iter().any(ContentBlock::is_tool_call)
    }
}

/// Recursive parameter schema for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamSchema {
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        properties: Vec<Param>,
    },
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<ParamSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<f64>>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl ParamSchema {
    /// An object schema with the given members.
    pub fn object(properties: Vec<Param>) -> Self {
        ParamSchema::Object {
            description: None,
            properties,
        }
    }

    /// A plain string schema.
    pub fn string() -> Self {
        ParamSchema::String {
            description: None,
            enum_values: None,
        }
    }

    /// A plain number schema.
    pub fn number() -> Self {
        ParamSchema::Number {
            description: None,
            enum_values: None,
        }
    }

    /// A boolean schema.
    pub fn boolean() -> Self {
        ParamSchema::Boolean { description: None }
    }

    /// An array of `items`.
    pub fn array(items: ParamSchema) -> Self {
        ParamSchema::Array {
            description: None,
            items: Box::new(items),
            limit: None,
        }
    }

    /// Attach a description.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            ParamSchema::Object { description, .. }
            | ParamSchema::Array { description, .. }
            | ParamSchema::String { description, .. }
            | ParamSchema::Number { description, .. }
            | ParamSchema::Boolean { description } => *description = text,
        }
        self
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            ParamSchema::Object { description, .. }
            | ParamSchema::Array { description, .. }
            | ParamSchema::String { description, .. }
            | ParamSchema::Number { description, .. }
            | ParamSchema::Boolean { description } => description.as_deref(),
        }
    }
}

/// A named member of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub schema: ParamSchema,
}

impl Param {
    /// A required member.
    pub fn required(key: impl Into<String>, schema: ParamSchema) -> Self {
        Self {
            key: key.into(),
            required: true,
            schema,
        }
    }

    /// An optional member.
    pub fn optional(key: impl Into<String>, schema: ParamSchema) -> Self {
        Self {
            key: key.into(),
            required: false,
            schema,
        }
    }
}

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter schema, normally an object.
    pub params: ParamSchema,
    /// Ask the backend to cache the tool list up to this tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

/// Whether, and which, tool the model must call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolChoice {
    /// The model decides.
    Auto,
    /// The model must call some tool.
    Required,
    /// The model must not call tools.
    None,
    /// The model must call exactly this tool.
    Tool(String),
}

impl From<String> for ToolChoice {
    fn from(value: String) -> Self {
        match value.as_str() {
            "auto" => ToolChoice::Auto,
            "required" => ToolChoice::Required,
            "none" => ToolChoice::None,
            _ => ToolChoice::Tool(value),
        }
    }
}

impl From<&str> for ToolChoice {
    fn from(value: &str) -> Self {
        ToolChoice::from(value.to_string())
    }
}

impl From<ToolChoice> for String {
    fn from(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Auto => "auto".to_string(),
            ToolChoice::Required => "required".to_string(),
            ToolChoice::None => "none".to_string(),
            ToolChoice::Tool(name) => name,
        }
    }
}

/// Backend client handle: HTTP client, credentials and endpoint override.
#[derive(Clone)]
pub struct ProviderClient {
    pub http: reqwest::Client,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl ProviderClient {
    /// Create a client handle with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: None,
        }
    }

    /// Point the handle at a custom base URL (for testing/proxy).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Resolve the base URL, falling back to the backend default.
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Backend-specific part of a completion request.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Client handle; a request without one fails with a configuration error.
    pub client: Option<ProviderClient>,
    /// Extra options merged into the native request body.
    ///
    /// Recognized options vary by backend. Keys the adapter itself manages
    /// (model, messages, tools...) are never overwritten.
    pub settings: Map<String, Value>,
}

impl ProviderConfig {
    /// A config with just a client handle.
    pub fn with_client(client: ProviderClient) -> Self {
        Self {
            client: Some(client),
            settings: Map::new(),
        }
    }

    /// Add a setting.
    pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// One logical completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model identifier.
    pub model: String,
    /// Conversation messages, system messages included.
    pub messages: Vec<Message>,
    /// Available tools.
    pub tools: Vec<Tool>,
    /// Tool forcing directive; `None` means no forcing.
    pub tool_choice: Option<ToolChoice>,
    /// Maximum output tokens; adapters that need one compute a default.
    pub max_tokens: Option<u32>,
    /// Whether to stream.
    pub stream: bool,
    /// Client handle and settings bag.
    pub provider_config: ProviderConfig,
}

impl CompletionConfig {
    /// Create a config for `model` with the given messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
            stream: false,
            provider_config: ProviderConfig::default(),
        }
    }
}

/// Token usage information. All four counters are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_write_tokens: u64,
    pub cache_read_tokens: u64,
}

impl Usage {
    /// Add another usage report to this one.
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
    }

    /// Convert a cumulative report into the increment since `seen`.
    pub fn since(&self, seen: &Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.saturating_sub(seen.input_tokens),
            output_tokens: self.output_tokens.saturating_sub(seen.output_tokens),
            cache_write_tokens: self
                .cache_write_tokens
                .saturating_sub(seen.cache_write_tokens),
            cache_read_tokens: self
                .cache_read_tokens
                .saturating_sub(seen.cache_read_tokens),
        }
    }
}

/// Usage as reported in a stream chunk: `None` means "not updated here".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_write_tokens: Option<u64>,
    pub cache_read_tokens: Option<u64>,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal end of response.
    Natural,
    /// Output token limit reached.
    MaxTokens,
    /// Model wants to use a tool.
    ToolCall,
    /// Output withheld by the backend's filters.
    ContentFilter,
    /// A backend condition the canonical model has no counterpart for.
    Unsupported,
    /// Unrecognized or never reported.
    Unknown,
}

/// The normalized result of one completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub provider: String,
    pub model: String,
    pub message: Message,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

/// One incremental update of a streaming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Backend request/message id.
    pub id: String,
    pub provider: String,
    pub model: String,
    /// Only what this event added.
    pub delta: Message,
    /// Everything accumulated so far.
    pub buffer: Message,
    /// Counters updated by this event.
    pub usage: PartialUsage,
    /// Set only by the event that announced it.
    pub stop_reason: Option<StopReason>,
}

/// Callback receiving stream chunks in arrival order.
pub type ChunkSink<'a> = &'a (dyn Fn(StreamChunk) + Send + Sync);

/// Information about a model supported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier (e.g., "claude-sonnet-4-20250514").
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Maximum context window in tokens.
    pub context_window: u32,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
    /// Whether the model supports reasoning output.
    pub supports_reasoning: bool,
    /// Whether the model supports tool use.
    pub supports_tools: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_choice_from_string() {
        assert_eq!(ToolChoice::from("auto"), ToolChoice::Auto);
        assert_eq!(ToolChoice::from("required"), ToolChoice::Required);
        assert_eq!(ToolChoice::from("none"), ToolChoice::None);
        assert_eq!(
            ToolChoice::from("my_tool"),
            ToolChoice::Tool("my_tool".to_string())
        );
    }

    #[test]
    fn test_tool_choice_serde() {
        let choice: ToolChoice = serde_json::from_str("\"read_file\"").unwrap();
        assert_eq!(choice, ToolChoice::Tool("read_file".to_string()));
        assert_eq!(serde_json::to_string(&ToolChoice::Required).unwrap(), "\"required\"");
    }

    #[test]
    fn test_tool_call_args_derived_from_buffer() {
        let block = ContentBlock::tool_call("tc_1", "read", r#"{"path":"a.rs"}"#);
        match block {
            ContentBlock::ToolCall {
                fn_args,
                fn_args_buffer,
                ..
            } => {
                assert_eq!(fn_args, json!({"path": "a.rs"}));
                assert_eq!(fn_args_buffer, r#"{"path":"a.rs"}"#);
            }
            other => panic!("Expected ToolCall, got {other:?}"),
        }

        let broken = ContentBlock::tool_call("tc_2", "read", "{\"path\":");
        match broken {
            ContentBlock::ToolCall { fn_args, .. } => assert_eq!(fn_args, json!({})),
            other => panic!("Expected ToolCall, got {other:?}"),
        }
    }

    #[test]
    fn test_content_block_serde_tags() {
        let block = ContentBlock::Reasoning {
            reasoning: "hmm".to_string(),
            signature: None,
            redacted: false,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value, json!({"type": "reasoning", "reasoning": "hmm"}));

        let image: ContentBlock = serde_json::from_value(json!({
            "type": "image",
            "source_kind": "url",
            "mime_type": "image/png",
            "data": "https://example.com/cat.png"
        }))
        .unwrap();
        assert!(matches!(
            image,
            ContentBlock::Image {
                source_kind: ImageSource::Url,
                ..
            }
        ));
    }

    #[test]
    fn test_deserialized_tool_call_keeps_args_and_buffer_in_step() {
        let block: ContentBlock = serde_json::from_value(json!({
            "type": "tool_call",
            "id": "tc_1",
            "fn_name": "read",
            "fn_args": {"path": "a.rs"}
        }))
        .unwrap();
        assert_eq!(
            block,
            ContentBlock::tool_call_with_args("tc_1", "read", json!({"path": "a.rs"}))
        );

        let block: ContentBlock = serde_json::from_value(json!({
            "type": "tool_call",
            "id": "tc_2",
            "fn_name": "read",
            "fn_args": {"path": "stale.rs"},
            "fn_args_buffer": "{\"path\":\"b.rs\"}"
        }))
        .unwrap();
        match block {
            ContentBlock::ToolCall { fn_args, .. } => assert_eq!(fn_args, json!({"path": "b.rs"})),
            other => panic!("Expected ToolCall, got {other:?}"),
        }

        let bare: ContentBlock = serde_json::from_value(json!({
            "type": "tool_call",
            "id": "tc_3",
            "fn_name": "list"
        }))
        .unwrap();
        assert_eq!(bare, ContentBlock::tool_call("tc_3", "list", "{}"));

        let original = ContentBlock::tool_call("tc_4", "read", "");
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(serde_json::from_value::<ContentBlock>(value).unwrap(), original);
    }

    #[test]
    fn test_param_schema_serde() {
        let schema: ParamSchema = serde_json::from_value(json!({
            "type": "object",
            "properties": [
                {"key": "path", "required": true, "type": "string", "description": "File path"},
                {"key": "limit", "type": "number"}
            ]
        }))
        .unwrap();
        match schema {
            ParamSchema::Object { properties, .. } => {
                assert_eq!(properties.len(), 2);
                assert!(properties[0].required);
                assert_eq!(properties[0].schema.description(), Some("File path"));
                assert!(!properties[1].required);
            }
            other => panic!("Expected object schema, got {other:?}"),
        }
    }

    #[test]
    fn test_usage_since_saturates() {
        let seen = Usage {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        };
        let now = Usage {
            input_tokens: 10,
            output_tokens: 12,
            ..Default::default()
        };
        let delta = now.since(&seen);
        assert_eq!(delta.input_tokens, 0);
        assert_eq!(delta.output_tokens, 7);
        assert_eq!(seen.since(&now).output_tokens, 0);
    }

    #[test]
    fn test_provider_client_debug_redacts_key() {
        let client = ProviderClient::new("sk-secret");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret"));
        assert_eq!(client.base_url_or("https://api.example.com/"), "https://api.example.com");
    }
}
