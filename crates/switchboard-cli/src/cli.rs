//! CLI argument and command definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "One completion API over several LLM backends")]
pub struct Cli {
    /// Backend to use (anthropic, openai, google, groq). Defaults to the
    /// configured provider.
    #[arg(long, global = true, env = "SWITCHBOARD_PROVIDER")]
    pub provider: Option<String>,

    /// Model to use (defaults to the configured or the backend's default model).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single completion and print the answer.
    Complete {
        /// The user prompt.
        prompt: String,

        /// System instruction.
        #[arg(long)]
        system: Option<String>,

        /// Maximum output tokens.
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print text as it streams in.
        #[arg(long)]
        stream: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List backends and their known models.
    Providers,
}
