//! switchboard-provider: one completion contract over several LLM backends.
//!
//! Callers build a [`CompletionConfig`], pick an adapter with
//! [`provider_for`], and call [`Provider::make_completion_request`]. Streaming
//! requests deliver [`StreamChunk`]s to a sink while the response is being
//! reassembled by [`StreamAccumulator`].

mod error;
pub mod factory;
mod http;
pub mod json;
pub mod normalize;
pub mod providers;
pub mod retry;
pub mod schema;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::ProviderError;
pub use factory::{provider_for, Backend};
pub use retry::RetryPolicy;
pub use stream::{BlockDelta, StreamAccumulator, StreamEvent};
pub use traits::Provider;
pub use types::{
    ChunkSink, CompletionConfig, CompletionResult, ContentBlock, ImageSource, Message, ModelInfo,
    Param, ParamSchema, PartialUsage, ProviderClient, ProviderConfig, Role, StopReason,
    StreamChunk, Tool, ToolChoice, ToolOutput, Usage,
};
