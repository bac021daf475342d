//! `switchboard providers`: list backends and their models.

use switchboard_provider::{provider_for, Backend};

pub fn run() {
    for backend in Backend::ALL {
        let provider = provider_for(backend);
        let key = if std::env::var(backend.api_key_var()).is_ok() {
            "key set"
        } else {
            "no key"
        };
        println!(
            "{} (default: {}, {} {})",
            backend,
            provider.default_model(),
            backend.api_key_var(),
            key
        );
        for model in provider.models() {
            let mut traits = Vec::new();
            if model.supports_tools {
                traits.push("tools");
            }
            if model.supports_reasoning {
                traits.push("reasoning");
            }
            println!(
                "  {:<32} {:<24} ctx {:>9}  out {:>7}  {}",
                model.id,
                model.name,
                model.context_window,
                model.max_output_tokens,
                traits.join(",")
            );
        }
    }
}
