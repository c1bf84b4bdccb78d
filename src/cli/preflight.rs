//! Pre-flight checks before operations that call external services.
//!
//! Fails fast with a clear message instead of midway through a request.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{Result, SyllabusError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion needs an API key only for remote embeddings.
    Ingest,
    /// Answering questions always calls the chat model.
    Query,
    /// Listing courses is local.
    Courses,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    let remote_embeddings = settings.embedding.provider == EmbeddingProvider::OpenAI;
    match operation {
        Operation::Ingest => {
            if remote_embeddings {
                check_api_key()?;
            }
        }
        Operation::Query => {
            check_api_key()?;
        }
        Operation::Courses => {}
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SyllabusError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(SyllabusError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
