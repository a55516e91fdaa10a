//! Generative-text abstraction and the Gemini client.
//!
//! Callers only need "prompt in, text out"; the trait keeps the reply chain testable without a network.

mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiClient;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
    #[error("model returned an empty response")]
    EmptyGeneration,
}

/// One synchronous prompt-completion call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
