//! Backend adapters.

pub mod anthropic;
pub mod google;
pub mod groq;
pub mod openai;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use groq::new_groq_provider;
pub use openai::new_openai_provider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
