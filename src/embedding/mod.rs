//! Embedding generation for semantic search and course-name resolution.

mod openai;
mod trigram;

pub use openai::OpenAIEmbedder;
pub use trigram::TrigramEmbedder;

use crate::config::{EmbeddingProvider, Settings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in the settings.
pub fn create_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.embedding.dimensions as usize;
    let embedder: Arc<dyn Embedder> = match settings.embedding.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            dimensions,
            Duration::from_secs(settings.general.request_timeout_secs),
        )?),
        EmbeddingProvider::Trigram => Arc::new(TrigramEmbedder::new(dimensions)),
    };
    Ok(embedder)
}
