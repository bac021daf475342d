//! Provider trait definition.

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::types::{
    ChunkSink, CompletionConfig, CompletionResult, Message, ModelInfo, ProviderClient, StopReason,
    Tool,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Trait for LLM backend adapters.
///
/// Adapters convert the canonical request into their backend's wire format,
/// perform the call, and normalize the answer into a [`CompletionResult`].
/// Native values are plain JSON; only the backend-specific shape differs.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Model used when the caller has no preference.
    fn default_model(&self) -> &str;

    /// List of models known to this provider.
    fn models(&self) -> Vec<ModelInfo>;

    /// Build the native request body, without the `stream` flag.
    ///
    /// Applies the tool-choice mapping, the default output limit if the
    /// backend requires one, and the system-instruction channel.
    fn convert_config(&self, config: &CompletionConfig) -> Result<Value, ProviderError>;

    /// Convert canonical messages into native turns.
    ///
    /// The history is normalized first; system messages never appear in the
    /// output since each backend carries them through its own channel.
    fn convert_messages(&self, messages: &[Message]) -> Result<Vec<Value>, ProviderError>;

    /// Convert tool definitions; `None` is this backend's "no tools" form.
    fn convert_tools(&self, tools: &[Tool]) -> Option<Value>;

    /// Map a native finish reason. Unrecognized values become `Unknown`.
    fn convert_stop_reason(&self, reason: &str) -> StopReason;

    /// Retry policy applied by [`Provider::make_completion_request`].
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Issue exactly one network attempt.
    ///
    /// Streaming requests send every chunk to `on_chunk` before returning.
    async fn send_completion(
        &self,
        config: &CompletionConfig,
        on_chunk: Option<ChunkSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError>;

    /// Run a completion under the retry and cancellation policy.
    ///
    /// `attempt` is the number of attempts already spent on this logical call
    /// (normally 0). Cancellation surfaces as [`ProviderError::Aborted`].
    async fn make_completion_request(
        &self,
        config: &CompletionConfig,
        on_chunk: Option<ChunkSink<'_>>,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, ProviderError> {
        tracing::debug!(
            provider = self.name(),
            model = %config.model,
            stream = config.stream,
            attempt,
            "dispatching completion"
        );
        self.retry_policy()
            .run(attempt, cancel, move |_| {
                self.send_completion(config, on_chunk, cancel)
            })
            .await
    }
}

// Compile-time check: Provider must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn Provider) {}
};

/// Resolve the client handle or fail with a configuration error.
pub(crate) fn require_client<'a>(
    provider: &str,
    config: &'a CompletionConfig,
) -> Result<&'a ProviderClient, ProviderError> {
    config
        .provider_config
        .client
        .as_ref()
        .ok_or_else(|| ProviderError::Configuration(format!("no {provider} client configured")))
}

/// Merge the settings bag into `body`, never overwriting `reserved` keys.
pub(crate) fn merge_settings(
    provider: &str,
    body: &mut Value,
    settings: &serde_json::Map<String, Value>,
    reserved: &[&str],
) {
    let Some(target) = body.as_object_mut() else {
        return;
    };
    for (key, value) in settings {
        if reserved.contains(&key.as_str()) {
            tracing::warn!(provider, key = %key, "ignoring setting that overrides a managed field");
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_settings_respects_reserved() {
        let mut body = json!({"model": "a", "messages": []});
        let settings = json!({"model": "b", "temperature": 0.2})
            .as_object()
            .cloned()
            .unwrap();
        merge_settings("test", &mut body, &settings, &["model", "messages"]);
        assert_eq!(body["model"], "a");
        assert_eq!(body["temperature"], 0.2);
    }

    #[test]
    fn test_require_client() {
        let config = CompletionConfig::new("m", vec![]);
        let err = require_client("openai", &config).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
