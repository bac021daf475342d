//! Backend selection.

use crate::error::ProviderError;
use crate::providers::{new_groq_provider, new_openai_provider, AnthropicProvider, GoogleProvider};
use crate::traits::Provider;
use crate::types::ProviderClient;
use std::fmt;
use std::str::FromStr;

/// The supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Anthropic,
    OpenAi,
    Google,
    Groq,
}

impl Backend {
    /// Every backend, in display order.
    pub const ALL: [Backend; 4] = [
        Backend::Anthropic,
        Backend::OpenAi,
        Backend::Google,
        Backend::Groq,
    ];

    /// Lowercase identifier, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Anthropic => "anthropic",
            Backend::OpenAi => "openai",
            Backend::Google => "google",
            Backend::Groq => "groq",
        }
    }

    /// Prefix of the environment variables read by [`ProviderClient::from_env`].
    pub fn env_prefix(self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC",
            Backend::OpenAi => "OPENAI",
            Backend::Google => "GOOGLE",
            Backend::Groq => "GROQ",
        }
    }

    /// Name of the API key variable, e.g. `GROQ_API_KEY`.
    pub fn api_key_var(self) -> String {
        format!("{}_API_KEY", self.env_prefix())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Backend::Anthropic),
            "openai" => Ok(Backend::OpenAi),
            "google" | "gemini" => Ok(Backend::Google),
            "groq" => Ok(Backend::Groq),
            other => Err(ProviderError::Configuration(format!(
                "unknown provider '{other}'; expected one of anthropic, openai, google, groq"
            ))),
        }
    }
}

/// Build the adapter for `backend`.
pub fn provider_for(backend: Backend) -> Box<dyn Provider> {
    tracing::debug!(provider = backend.as_str(), "selecting adapter");
    match backend {
        Backend::Anthropic => Box::new(AnthropicProvider::new()),
        Backend::OpenAi => Box::new(new_openai_provider()),
        Backend::Google => Box::new(GoogleProvider::new()),
        Backend::Groq => Box::new(new_groq_provider()),
    }
}

impl ProviderClient {
    /// Build a client handle from `<BACKEND>_API_KEY` and the optional
    /// `<BACKEND>_BASE_URL`.
    pub fn from_env(backend: Backend) -> Result<Self, ProviderError> {
        let var = backend.api_key_var();
        let api_key = std::env::var(&var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration(format!("{var} is not set")))?;

        let client = ProviderClient::new(api_key);
        Ok(
            match std::env::var(format!("{}_BASE_URL", backend.env_prefix())) {
                Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
                _ => client,
            },
        )
    }
}
