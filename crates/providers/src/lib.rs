//! LLM provider implementations for Nimbus.
//!
//! The only backend shape in production is an OpenAI-compatible chat
//! completions endpoint (vLLM serves one); everything else mocks the
//! `Provider` trait in tests.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use nimbus_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
pub fn build_from_config(config: &nimbus_config::AppConfig) -> Arc<dyn Provider> {
    Arc::new(OpenAiCompatProvider::from_config(&config.llm))
}
