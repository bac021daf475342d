//! OpenAI provider built on the OpenAI-compatible transport.

use crate::providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
use crate::types::ModelInfo;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Create a new OpenAI provider.
///
/// Uses `max_completion_tokens` and requests a trailing usage chunk when
/// streaming.
pub fn new_openai_provider() -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(OpenAiCompatConfig {
        provider_name: "openai".to_string(),
        base_url: OPENAI_BASE_URL.to_string(),
        default_model: "gpt-4o".to_string(),
        models: vec![
            ModelInfo {
                id: "gpt-4o".to_string(),
                name: "GPT-4o".to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_reasoning: false,
                supports_tools: true,
            },
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                name: "GPT-4o mini".to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_reasoning: false,
                supports_tools: true,
            },
            ModelInfo {
                id: "o3-mini".to_string(),
                name: "o3-mini".to_string(),
                context_window: 200_000,
                max_output_tokens: 100_000,
                supports_reasoning: true,
                supports_tools: true,
            },
        ],
        max_tokens_field: "max_completion_tokens",
        stream_usage: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Provider;
    use crate::types::{CompletionConfig, Message};

    #[test]
    fn test_openai_provider_name() {
        let p = new_openai_provider();
        assert_eq!(p.name(), "openai");
        assert_eq!(p.default_model(), "gpt-4o");
    }

    #[test]
    fn test_openai_models() {
        let p = new_openai_provider();
        let models = p.models();
        assert!(models.iter().any(|m| m.id == "gpt-4o"));
        assert!(models.iter().any(|m| m.supports_reasoning));
    }

    #[test]
    fn test_openai_max_tokens_field() {
        let p = new_openai_provider();
        let mut config = CompletionConfig::new("gpt-4o", vec![Message::user("hi")]);
        config.max_tokens = Some(256);
        let body = p.convert_config(&config).unwrap();
        assert_eq!(body["max_completion_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
    }
}
