//! Collaborator seams consumed by the guarded pipeline.
//!
//! Both traits are object-safe so the controller can hold them as
//! `Arc<dyn ...>` handles shared across requests.

use anyhow::Result;
use async_trait::async_trait;

/// Single-turn, stateless text completion.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Translates a natural-language question into SQL, runs it and answers in text.
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn run(&self, question: &str) -> Result<String>;
}
