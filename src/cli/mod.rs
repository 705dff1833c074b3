//! CLI module: argument parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, CompletionShell, Commands};

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::engine::Engine;
use crate::llm::{HttpLlmClient, LlmClient};

/// Builds an `Engine` from resolved config. Embedding is always wired up
/// (a down endpoint degrades gracefully to BM25-only retrieval); the LLM
/// client is only wired up when an API key is present, since a query
/// against a misconfigured LLM is a hard failure rather than a silent
/// degradation.
pub fn build_engine(config: EngineConfig) -> Engine {
    let embedder: Arc<dyn Embedder> = Arc::new(
        HttpEmbedder::new(config.embedding.url.clone(), config.embedding.model.clone(), config.embedding.dimension)
            .with_batch_size(config.embedding.batch_size),
    );

    let llm: Option<Arc<dyn LlmClient>> = if config.llm.api_key.is_empty() {
        None
    } else {
        Some(Arc::new(HttpLlmClient::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        )))
    };

    Engine::new(config, Some(embedder), llm)
}
