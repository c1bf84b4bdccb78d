//! Syllabus - Course Materials Q&A
//!
//! A local-first service that answers questions about structured course
//! materials, grounded in the course content and outlines it has indexed.
//!
//! # Overview
//!
//! Syllabus allows you to:
//! - Ingest course documents (title, instructor, lessons) into a vector index
//! - Ask questions and get answers with the lessons they came from
//! - Hold multi-turn conversations with bounded history
//! - Serve the same over a small HTTP API
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `documents` - Course document parsing and sentence chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Course catalog and content index, course-name resolution
//! - `llm` - Provider-neutral chat model interface
//! - `agent` - Tools, the tool registry and the bounded tool-calling loop
//! - `session` - Conversation memory
//! - `rag` - The query service tying these together
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus::config::Settings;
//! use syllabus::rag::RagSystem;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let rag = RagSystem::new(&settings)?;
//!
//!     rag.add_course_folder(&settings.docs_dir(), false).await?;
//!     let response = rag.query("What is covered in lesson 1?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod models;
pub mod openai;
pub mod rag;
pub mod session;
pub mod vector_store;

pub use error::{Result, SyllabusError};
