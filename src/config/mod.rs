//! Configuration module for Syllabus.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    DocumentSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, PromptSettings,
    RagSettings, ServerSettings, Settings, SourceAggregation, VectorStoreSettings,
};
