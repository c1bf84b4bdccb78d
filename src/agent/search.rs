//! Semantic search over course content.

use super::tools::{SourceTracker, Tool};
use crate::error::{Result, SyllabusError};
use crate::llm::ToolDefinition;
use crate::models::Source;
use crate::vector_store::{SearchResults, VectorStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// Name the model uses to call [`CourseSearchTool`].
pub const SEARCH_TOOL_NAME: &str = "search_course_content";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches lesson content, optionally within one course and lesson.
pub struct CourseSearchTool {
    store: Arc<VectorStore>,
    sources: SourceTracker,
}

impl CourseSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            sources: SourceTracker::default(),
        }
    }

    /// Run a search and render the results for the model.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> String {
        let results = self.store.search(query, course_name, lesson_number).await;

        if let Some(error) = results.error() {
            self.sources.clear();
            return error.to_string();
        }

        if results.is_empty() {
            self.sources.clear();
            let mut filter_info = String::new();
            if let Some(name) = course_name.filter(|n| !n.trim().is_empty()) {
                filter_info.push_str(&format!(" in course '{}'", name));
            }
            if let Some(n) = lesson_number {
                filter_info.push_str(&format!(" in lesson {}", n));
            }
            return format!("No relevant content found{}.", filter_info);
        }

        self.format_results(&results).await
    }

    async fn format_results(&self, results: &SearchResults) -> String {
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (document, meta, _) in results.iter() {
            let label = match meta.lesson_number {
                Some(n) => format!("{} - Lesson {}", meta.course_title, n),
                None => meta.course_title.clone(),
            };

            let link = match meta.lesson_number {
                Some(n) => self.store.get_lesson_link(&meta.course_title, n).await,
                None => self.store.get_course_link(&meta.course_title).await,
            };

            blocks.push(format!("[{}]\n{}", label, document));
            sources.push(Source::new(label, link));
        }

        self.sources.replace(sources);
        blocks.join("\n\n")
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: &Value) -> Result<String> {
        let args: SearchArgs = serde_json::from_value(input.clone()).map_err(|e| {
            SyllabusError::InvalidInput(format!("Invalid arguments for {}: {}", SEARCH_TOOL_NAME, e))
        })?;

        Ok(self
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await)
    }

    fn sources(&self) -> Vec<Source> {
        self.sources.get()
    }

    fn clear_sources(&self) {
        self.sources.clear()
    }
}
