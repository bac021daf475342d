//! switchboard: send one prompt to any supported LLM backend.

mod cli;
mod commands;
mod config;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use config::ConfigStore;
use switchboard_provider::Backend;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_store = ConfigStore::new();
    let config = config_store.load();
    config_store.hydrate_env(&config);

    match cli.command {
        Commands::Complete {
            prompt,
            system,
            max_tokens,
            stream,
            json,
        } => {
            let provider_name = cli.provider.as_deref().unwrap_or(&config.provider);
            let backend: Backend = provider_name
                .parse()
                .with_context(|| format!("cannot use provider '{provider_name}'"))?;
            let model = cli
                .model
                .as_deref()
                .or_else(|| config.model_for(backend.as_str()));
            let options = commands::complete::CompleteOptions {
                prompt,
                system,
                max_tokens,
                stream,
                json,
            };
            commands::complete::run(backend, model, options).await?;
        }
        Commands::Providers => commands::providers::run(),
    }

    Ok(())
}

/// Logs go to stderr so stdout carries only the completion.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("switchboard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
