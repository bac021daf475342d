//! `switchboard complete`: a single completion request.

use anyhow::Context;
use std::io::Write;
use switchboard_provider::{
    provider_for, Backend, ChunkSink, CompletionConfig, CompletionResult, ContentBlock, Message,
    ProviderClient, ProviderConfig, ProviderError, StreamChunk,
};
use tokio_util::sync::CancellationToken;

/// Options of one `complete` invocation.
#[derive(Debug, Clone)]
pub struct CompleteOptions {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub json: bool,
}

/// Build the canonical request for `options`.
pub fn build_config(
    model: String,
    client: ProviderClient,
    options: &CompleteOptions,
) -> CompletionConfig {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &options.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(options.prompt.clone()));

    let mut config = CompletionConfig::new(model, messages);
    config.max_tokens = options.max_tokens;
    config.stream = options.stream;
    config.provider_config = ProviderConfig::with_client(client);
    config
}

/// Run the completion, printing text (or JSON) to stdout.
pub async fn run(
    backend: Backend,
    model: Option<&str>,
    options: CompleteOptions,
) -> anyhow::Result<()> {
    let provider = provider_for(backend);
    let client = ProviderClient::from_env(backend).with_context(|| {
        format!(
            "set {} or add a \"{backend}\" key to ~/.switchboard/config.json",
            backend.api_key_var()
        )
    })?;
    let model = model.unwrap_or(provider.default_model()).to_string();
    let config = build_config(model, client, &options);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling request");
                cancel.cancel();
            }
        })
    };

    let print_text = |chunk: StreamChunk| {
        let mut stdout = std::io::stdout().lock();
        for block in &chunk.delta.blocks {
            if let ContentBlock::Text { text } = block {
                let _ = write!(stdout, "{text}");
            }
        }
        let _ = stdout.flush();
    };
    let live = options.stream && !options.json;
    let sink: ChunkSink<'_> = &print_text;
    let on_chunk = live.then_some(sink);

    let result = provider
        .make_completion_request(&config, on_chunk, 0, &cancel)
        .await;
    ctrl_c.abort();

    let result = match result {
        Ok(result) => result,
        Err(ProviderError::Aborted) => {
            if live {
                println!();
            }
            anyhow::bail!("request cancelled");
        }
        Err(err) => return Err(err).context(format!("{backend} completion failed")),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if live {
        println!();
    } else {
        println!("{}", result.message.text());
    }
    print_tool_calls(&result);
    eprintln!("{}", summary_line(&result));
    Ok(())
}

fn print_tool_calls(result: &CompletionResult) {
    for block in &result.message.blocks {
        if let ContentBlock::ToolCall {
            fn_name, fn_args, ..
        } = block
        {
            println!("-> {fn_name}({fn_args})");
        }
    }
}

/// One-line usage report, written to stderr.
pub fn summary_line(result: &CompletionResult) -> String {
    let usage = &result.usage;
    let mut line = format!(
        "[{}/{}] stop={:?} in={} out={}",
        result.provider, result.model, result.stop_reason, usage.input_tokens, usage.output_tokens
    );
    if usage.cache_read_tokens > 0 || usage.cache_write_tokens > 0 {
        line.push_str(&format!(
            " cache_read={} cache_write={}",
            usage.cache_read_tokens, usage.cache_write_tokens
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_provider::{Role, StopReason, Usage};

    fn options() -> CompleteOptions {
        CompleteOptions {
            prompt: "hello".to_string(),
            system: Some("be brief".to_string()),
            max_tokens: Some(32),
            stream: true,
            json: false,
        }
    }

    #[test]
    fn test_build_config() {
        let config = build_config("gpt-4o".to_string(), ProviderClient::new("k"), &options());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.messages.len(), 2);
        assert_eq!(config.messages[0].role, Role::System);
        assert_eq!(config.messages[1].text(), "hello");
        assert_eq!(config.max_tokens, Some(32));
        assert!(config.stream);
        assert!(config.provider_config.client.is_some());
    }

    #[test]
    fn test_summary_line() {
        let result = CompletionResult {
            provider: "groq".to_string(),
            model: "llama".to_string(),
            message: Message::assistant("hi"),
            usage: Usage {
                input_tokens: 3,
                output_tokens: 1,
                cache_write_tokens: 0,
                cache_read_tokens: 2,
            },
            stop_reason: StopReason::Natural,
        };
        assert_eq!(
            summary_line(&result),
            "[groq/llama] stop=Natural in=3 out=1 cache_read=2 cache_write=0"
        );
    }
}
