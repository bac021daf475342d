//! Groq provider built on the OpenAI-compatible transport.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Create a new Groq provider.
///
/// Groq reports streaming usage under `x_groq.usage` and reasoning under
/// `delta.reasoning`.
pub fn new_groq_provider() -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(OpenAiCompatConfig {
        provider_name: "groq".to_string(),
        base_url: GROQ_BASE_URL.to_string(),
        default_model: "llama-3.3-70b-versatile".to_string(),
        models: vec![
            ModelInfo {
                id: "llama-3.3-70b-versatile".to_string(),
                name: "Llama 3.3 70B".to_string(),
                context_window: 128_000,
                max_output_tokens: 32_768,
                supports_reasoning: false,
                supports_tools: true,
            },
            ModelInfo {
                id: "llama-3.1-8b-instant".to_string(),
                name: "Llama 3.1 8B".to_string(),
                context_window: 128_000,
                max_output_tokens: 8_192,
                supports_reasoning: false,
                supports_tools: true,
            },
            ModelInfo {
                id: "deepseek-r1-distill-llama-70b".to_string(),
                name: "DeepSeek R1 Distill 70B".to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_reasoning: true,
                supports_tools: true,
            },
        ],
        max_tokens_field: "max_tokens",
        stream_usage: false,
    })
}
