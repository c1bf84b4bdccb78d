//! Courses command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::vector_store::VectorStore;
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    preflight::check(Operation::Courses, &settings)?;

    let embedder = create_embedder(&settings)?;
    let store = VectorStore::from_settings(&settings, embedder)?;

    let titles = match store.existing_course_titles().await {
        Ok(titles) => titles,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if titles.is_empty() {
        Output::info("No courses indexed yet. Use 'syllabus ingest <folder>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", titles.len()));
    println!();

    for title in &titles {
        let lessons = match store.get_catalog_entry(title).await? {
            Some(entry) => entry.lessons()?.len(),
            None => 0,
        };
        Output::list_item(&format!("{} ({} lessons)", title, lessons));
    }

    println!();
    Output::kv("Total courses", &titles.len().to_string());

    Ok(())
}
