//! Course outline lookup.

use super::tools::{SourceTracker, Tool};
use crate::error::{Result, SyllabusError};
use crate::llm::ToolDefinition;
use crate::models::Source;
use crate::vector_store::{CatalogEntry, VectorStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Name the model uses to call [`CourseOutlineTool`].
pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_name: String,
}

/// Returns a course's title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<VectorStore>,
    sources: SourceTracker,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            sources: SourceTracker::default(),
        }
    }

    /// Render the outline of the course best matching `course_name`.
    #[instrument(skip(self))]
    pub async fn outline(&self, course_name: &str) -> String {
        self.sources.clear();

        let Some(title) = self.store.resolve_course_name(course_name).await else {
            return format!("No course found matching '{}'", course_name);
        };

        match self.store.get_catalog_entry(&title).await {
            Ok(Some(entry)) => match self.render(&entry) {
                Ok(outline) => outline,
                Err(e) => {
                    warn!("Could not render outline for '{}': {}", title, e);
                    format!("Error retrieving course outline: {}", e)
                }
            },
            Ok(None) => format!("Could not retrieve outline for course '{}'", course_name),
            Err(e) => format!("Error retrieving course outline: {}", e),
        }
    }

    fn render(&self, entry: &CatalogEntry) -> Result<String> {
        let lessons = entry.lessons()?;
        let course_link = entry.course_link.clone().filter(|l| !l.is_empty());

        let mut lines = vec![format!("**Course Title:** {}", entry.title)];
        if let Some(link) = &course_link {
            lines.push(format!("**Course Link:** {}", link));
        }
        if let Some(instructor) = entry.instructor.as_ref().filter(|i| !i.is_empty()) {
            lines.push(format!("**Instructor:** {}", instructor));
        }
        lines.push(format!("**Total Lessons:** {}", lessons.len()));
        lines.push("\n**Lessons:**".to_string());
        for lesson in &lessons {
            lines.push(format!(
                "  - Lesson {}: {}",
                lesson.lesson_number, lesson.lesson_title
            ));
        }

        self.sources.replace(vec![Source::new(
            format!("{} - Course Outline", entry.title),
            course_link,
        )]);

        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description:
                "Get the complete outline of a course including course title, link, and all lessons"
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    async fn execute(&self, input: &Value) -> Result<String> {
        let args: OutlineArgs = serde_json::from_value(input.clone()).map_err(|e| {
            SyllabusError::InvalidInput(format!("Invalid arguments for {}: {}", OUTLINE_TOOL_NAME, e))
        })?;
        Ok(self.outline(&args.course_name).await)
    }

    fn sources(&self) -> Vec<Source> {
        self.sources.get()
    }

    fn clear_sources(&self) {
        self.sources.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TrigramEmbedder;
    use crate::models::{Course, CourseChunk, Lesson};
    use crate::vector_store::{
        CatalogMatch, ContentFilter, ContentHit, CourseIndex, MemoryCourseIndex,
    };

    fn store() -> Arc<VectorStore> {
        Arc::new(VectorStore::new(
            Arc::new(MemoryCourseIndex::new()),
            Arc::new(TrigramEmbedder::new(512)),
            5,
        ))
    }

    #[tokio::test]
    async fn test_full_outline() {
        let store = store();
        let course = Course::new("MCP: Build Rich-Context AI Apps")
            .with_link("https://example.com/mcp")
            .with_instructor("Elie Schoppik")
            .with_lesson(Lesson::new(0, "Introduction"))
            .with_lesson(Lesson::new(1, "Why MCP"));
        store.add_course_metadata(&course).await.unwrap();

        let tool = CourseOutlineTool::new(store);
        let out = tool.execute(&json!({"course_name": "MCP"})).await.unwrap();

        assert_eq!(
            out,
            "**Course Title:** MCP: Build Rich-Context AI Apps\n\
             **Course Link:** https://example.com/mcp\n\
             **Instructor:** Elie Schoppik\n\
             **Total Lessons:** 2\n\
             \n**Lessons:**\n  - Lesson 0: Introduction\n  - Lesson 1: Why MCP"
        );
        assert_eq!(
            tool.sources(),
            vec![Source::new(
                "MCP: Build Rich-Context AI Apps - Course Outline",
                Some("https://example.com/mcp".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_course_without_lessons() {
        let store = store();
        store
            .add_course_metadata(&Course::new("Empty Course"))
            .await
            .unwrap();

        let tool = CourseOutlineTool::new(store);
        let out = tool.outline("Empty Course").await;

        assert_eq!(
            out,
            "**Course Title:** Empty Course\n**Total Lessons:** 0\n\n**Lessons:**"
        );
        assert!(!out.contains("  - Lesson"));
        assert_eq!(tool.sources()[0].link, None);
    }

    #[tokio::test]
    async fn test_unknown_course() {
        let store = store();
        store
            .add_course_metadata(&Course::new("Python Programming Basics"))
            .await
            .unwrap();

        let tool = CourseOutlineTool::new(store);
        assert_eq!(
            tool.outline("Nonexistent Course ZZZ").await,
            "No course found matching 'Nonexistent Course ZZZ'"
        );
        assert!(tool.sources().is_empty());
    }

    /// Catalog resolves but the entry has vanished or is corrupt.
    struct StaleIndex {
        entry: Option<CatalogEntry>,
    }

    #[async_trait]
    impl CourseIndex for StaleIndex {
        async fn upsert_catalog(&self, _: &CatalogEntry, _: &[f32]) -> Result<()> {
            Ok(())
        }
        async fn add_chunks(&self, _: &[CourseChunk], _: &[Vec<f32>]) -> Result<usize> {
            Ok(0)
        }
        async fn query_catalog(&self, _: &[f32], _: usize) -> Result<Vec<CatalogMatch>> {
            Ok(vec![CatalogMatch {
                title: "Ghost".to_string(),
                distance: 0.1,
            }])
        }
        async fn query_content(&self, _: &[f32], _: &ContentFilter, _: usize) -> Result<Vec<ContentHit>> {
            Ok(Vec::new())
        }
        async fn get_catalog_entry(&self, _: &str) -> Result<Option<CatalogEntry>> {
            Ok(self.entry.clone())
        }
        async fn course_titles(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    fn stale_tool(entry: Option<CatalogEntry>) -> CourseOutlineTool {
        CourseOutlineTool::new(Arc::new(VectorStore::new(
            Arc::new(StaleIndex { entry }),
            Arc::new(TrigramEmbedder::new(64)),
            5,
        )))
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let tool = stale_tool(None);
        assert_eq!(
            tool.outline("gho").await,
            "Could not retrieve outline for course 'gho'"
        );
    }

    #[tokio::test]
    async fn test_corrupt_lessons() {
        let tool = stale_tool(Some(CatalogEntry {
            title: "Ghost".to_string(),
            instructor: None,
            course_link: None,
            lessons_json: "not json".to_string(),
        }));
        let out = tool.outline("Ghost").await;
        assert!(out.starts_with("Error retrieving course outline: "));
        assert!(tool.sources().is_empty());
    }
}
