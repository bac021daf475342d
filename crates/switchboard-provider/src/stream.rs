//! Stream reassembly engine.
//!
//! Every adapter translates its backend's wire events into [`StreamEvent`]s
//! and feeds them to a [`StreamAccumulator`], which owns the indexed block
//! buffer for exactly one request. Each non-terminal event yields one
//! [`StreamChunk`]; [`StreamAccumulator::finish`] produces the final
//! [`CompletionResult`].

use crate::error::ProviderError;
use crate::json;
use crate::types::{
    CompletionResult, ContentBlock, Message, PartialUsage, Role, StopReason, StreamChunk, Usage,
};
use std::collections::BTreeMap;

/// A fragment appended to an open block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    /// Text appended to a text block.
    Text(String),
    /// Raw JSON appended to a tool call's argument buffer.
    Json(String),
    /// Text appended to a reasoning block.
    Reasoning(String),
    /// Fragment of a reasoning block's signature.
    Signature(String),
    /// A delta kind the adapter could not classify.
    Unknown(String),
}

impl BlockDelta {
    fn kind(&self) -> &'static str {
        match self {
            BlockDelta::Text(_) => "text",
            BlockDelta::Json(_) => "json",
            BlockDelta::Reasoning(_) => "reasoning",
            BlockDelta::Signature(_) => "signature",
            BlockDelta::Unknown(_) => "unknown",
        }
    }
}

/// Backend-agnostic stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The backend announced the message; `usage` seeds the running totals.
    MessageStart {
        id: Option<String>,
        model: Option<String>,
        usage: Option<Usage>,
    },
    /// A new block opens at `index`.
    BlockStart { index: usize, block: ContentBlock },
    /// A fragment for the block at `index`.
    BlockDelta { index: usize, delta: BlockDelta },
    /// Usage increment and/or finish reason.
    MessageDelta {
        usage: Option<Usage>,
        stop_reason: Option<StopReason>,
    },
}

/// Incremental message reconstruction for one streaming request.
#[derive(Debug)]
pub struct StreamAccumulator {
    id: String,
    provider: String,
    model: String,
    blocks: BTreeMap<usize, ContentBlock>,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

impl StreamAccumulator {
    /// Start accumulating a response from `provider` for `model`.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            provider: provider.into(),
            model: model.into(),
            blocks: BTreeMap::new(),
            usage: Usage::default(),
            stop_reason: None,
        }
    }

    /// Running usage totals.
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Apply one non-terminal event and build the chunk describing it.
    pub fn apply(&mut self, event: StreamEvent) -> Result<StreamChunk, ProviderError> {
        match event {
            StreamEvent::MessageStart { id, model, usage } => {
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    self.id = id;
                }
                if let Some(model) = model.filter(|m| !m.is_empty()) {
                    self.model = model;
                }
                let reported = usage.map(|usage| {
                    self.usage = usage;
                    self.partial_usage()
                });
                Ok(self.chunk(Vec::new(), reported.unwrap_or_default(), None))
            }
            StreamEvent::BlockStart { index, block } => {
                let block = match block {
                    ContentBlock::ToolCall {
                        id,
                        fn_name,
                        fn_args_buffer,
                        ..
                    } => ContentBlock::ToolCall {
                        id,
                        fn_name,
                        fn_args: json::parse_lenient(&fn_args_buffer),
                        fn_args_buffer,
                    },
                    other => other,
                };
                self.blocks.insert(index, block.clone());
                Ok(self.chunk(vec![block], PartialUsage::default(), None))
            }
            StreamEvent::BlockDelta { index, delta } => {
                let delta_block = self.append(index, delta)?;
                Ok(self.chunk(vec![delta_block], PartialUsage::default(), None))
            }
            StreamEvent::MessageDelta { usage, stop_reason } => {
                let reported = usage.map(|usage| {
                    self.usage.add(&usage);
                    self.partial_usage()
                });
                let announced = stop_reason.map(|reason| {
                    let reason = if self.has_tool_call() {
                        StopReason::ToolCall
                    } else {
                        reason
                    };
                    self.stop_reason = Some(reason);
                    reason
                });
                Ok(self.chunk(Vec::new(), reported.unwrap_or_default(), announced))
            }
        }
    }

    /// Terminal transition: strict-parse tool arguments and build the result.
    pub fn finish(self) -> Result<CompletionResult, ProviderError> {
        let blocks: Vec<ContentBlock> = self
            .blocks
            .into_values()
            .map(|block| match block {
                ContentBlock::ToolCall {
                    id,
                    fn_name,
                    fn_args_buffer,
                    ..
                } => ContentBlock::ToolCall {
                    id,
                    fn_name,
                    fn_args: json::parse_strict(&fn_args_buffer),
                    fn_args_buffer,
                },
                other => other,
            })
            .collect();

        finalize(self.provider, self.model, blocks, self.usage, self.stop_reason)
    }

    /// Append `delta` to the block at `index`, returning the delta block.
    fn append(&mut self, index: usize, delta: BlockDelta) -> Result<ContentBlock, ProviderError> {
        if let BlockDelta::Unknown(kind) = &delta {
            return Err(ProviderError::UnknownDelta(format!(
                "{kind} at block index {index}"
            )));
        }

        let block = self
            .blocks
            .entry(index)
            .or_insert_with(|| empty_block_for(&delta));

        match (block, delta) {
            (ContentBlock::Text { text }, BlockDelta::Text(fragment)) => {
                text.push_str(&fragment);
                Ok(ContentBlock::text(fragment))
            }
            (
                ContentBlock::ToolCall {
                    id,
                    fn_name,
                    fn_args,
                    fn_args_buffer,
                },
                BlockDelta::Json(fragment),
            ) => {
                fn_args_buffer.push_str(&fragment);
                *fn_args = json::parse_lenient(fn_args_buffer);
                Ok(ContentBlock::ToolCall {
                    id: id.clone(),
                    fn_name: fn_name.clone(),
                    fn_args: json::parse_lenient(&fragment),
                    fn_args_buffer: fragment,
                })
            }
            (ContentBlock::Reasoning { reasoning, .. }, BlockDelta::Reasoning(fragment)) => {
                reasoning.push_str(&fragment);
                Ok(ContentBlock::reasoning(fragment))
            }
            (ContentBlock::Reasoning { signature, .. }, BlockDelta::Signature(fragment)) => {
                signature.get_or_insert_with(String::new).push_str(&fragment);
                Ok(ContentBlock::Reasoning {
                    reasoning: String::new(),
                    signature: Some(fragment),
                    redacted: false,
                })
            }
            (block, delta) => Err(ProviderError::UnknownDelta(format!(
                "{} delta for {} block at index {index}",
                delta.kind(),
                block.kind()
            ))),
        }
    }

    fn has_tool_call(&self) -> bool {
        self.blocks.values().any(ContentBlock::is_tool_call)
    }

    fn partial_usage(&self) -> PartialUsage {
        PartialUsage {
            input_tokens: Some(self.usage.input_tokens),
            output_tokens: Some(self.usage.output_tokens),
            cache_write_tokens: Some(self.usage.cache_write_tokens),
            cache_read_tokens: Some(self.usage.cache_read_tokens),
        }
    }

    fn chunk(
        &self,
        delta: Vec<ContentBlock>,
        usage: PartialUsage,
        stop_reason: Option<StopReason>,
    ) -> StreamChunk {
        StreamChunk {
            id: self.id.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            delta: Message::new(Role::Assistant, delta),
            buffer: Message::new(Role::Assistant, self.blocks.values().cloned().collect()),
            usage,
            stop_reason,
        }
    }
}

/// Build the terminal result shared by streaming and non-streaming paths.
///
/// Fails with `EmptyCompletion` when no block carries usable content, and
/// reports `ToolCall` whenever the message contains a tool call.
pub fn finalize(
    provider: String,
    model: String,
    blocks: Vec<ContentBlock>,
    usage: Usage,
    stop_reason: Option<StopReason>,
) -> Result<CompletionResult, ProviderError> {
    if !blocks.iter().any(ContentBlock::is_usable) {
        return Err(ProviderError::EmptyCompletion(provider));
    }

    let message = Message::new(Role::Assistant, blocks);
    let stop_reason = if message.has_tool_call() {
        StopReason::ToolCall
    } else {
        stop_reason.unwrap_or(StopReason::Unknown)
    };

    Ok(CompletionResult {
        provider,
        model,
        message,
        usage,
        stop_reason,
    })
}

/// Block allocated when a delta arrives for an index that was never opened.
fn empty_block_for(delta: &BlockDelta) -> ContentBlock {
    match delta {
        BlockDelta::Json(_) => ContentBlock::tool_call(String::new(), String::new(), ""),
        BlockDelta::Reasoning(_) | BlockDelta::Signature(_) => ContentBlock::reasoning(""),
        BlockDelta::Text(_) | BlockDelta::Unknown(_) => ContentBlock::text(""),
    }
}
