//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::RagSystem;
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command on a folder or a single document.
pub async fn run_ingest(path: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(path);
    if !path.exists() {
        Output::error(&format!("Path not found: {}", path.display()));
        anyhow::bail!("Path not found: {}", path.display());
    }

    let rag = RagSystem::new(&settings)?;

    if path.is_dir() {
        ingest_folder(&rag, path, clear).await
    } else {
        if clear {
            rag.store().clear_all_data().await?;
        }
        ingest_file(&rag, path).await
    }
}

async fn ingest_folder(rag: &RagSystem, path: PathBuf, clear: bool) -> Result<()> {
    let spinner = Output::spinner(&format!("Indexing courses in {}...", path.display()));

    match rag.add_course_folder(&path, clear).await {
        Ok((courses, chunks)) => {
            spinner.finish_and_clear();
            if courses == 0 {
                Output::info("No new courses found.");
            } else {
                Output::success(&format!("Indexed {} courses ({} chunks)", courses, chunks));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    let analytics = rag.course_analytics().await?;
    Output::kv("Total courses", &analytics.total_courses.to_string());

    Ok(())
}

async fn ingest_file(rag: &RagSystem, path: PathBuf) -> Result<()> {
    let spinner = Output::spinner(&format!("Indexing {}...", path.display()));

    match rag.add_course_document(&path).await {
        Ok((course, chunks)) => {
            spinner.finish_and_clear();
            Output::success(&format!("Indexed '{}'", course.title));
            Output::kv("Lessons", &course.lessons.len().to_string());
            Output::kv("Chunks", &chunks.to_string());
            if let Some(instructor) = &course.instructor {
                Output::kv("Instructor", instructor);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to index {}: {}", path.display(), e));
            return Err(e.into());
        }
    }

    Ok(())
}
