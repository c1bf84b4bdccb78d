//! Query service tying together ingestion, tools, the agent and sessions.

use crate::agent::{Agent, CourseOutlineTool, CourseSearchTool, ToolCallRecord, ToolManager};
use crate::config::{Prompts, Settings};
use crate::documents::{DocumentProcessor, ParsedCourse};
use crate::embedding::create_embedder;
use crate::error::Result;
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::models::{Course, Source};
use crate::session::SessionManager;
use crate::vector_store::VectorStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Answer to a query with the sources behind it.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    /// Tool calls the agent made while answering.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Catalog summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// The course question-answering service.
pub struct RagSystem {
    store: Arc<VectorStore>,
    processor: DocumentProcessor,
    tools: ToolManager,
    agent: Agent,
    prompts: Prompts,
    sessions: SessionManager,
}

impl RagSystem {
    /// Build the service from settings, using OpenAI for chat.
    pub fn new(settings: &Settings) -> Result<Self> {
        let embedder = create_embedder(settings)?;
        let store = Arc::new(VectorStore::from_settings(settings, embedder)?);

        let model = OpenAIChatModel::new(
            &settings.rag.model,
            Duration::from_secs(settings.general.request_timeout_secs),
        )?
        .with_max_tokens(settings.rag.max_tokens)
        .with_temperature(settings.rag.temperature);
        info!("Using chat model {}", model.model());

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        Self::with_components(settings, store, Arc::new(model), prompts)
    }

    /// Build the service with custom components.
    pub fn with_components(
        settings: &Settings,
        store: Arc<VectorStore>,
        model: Arc<dyn ChatModel>,
        prompts: Prompts,
    ) -> Result<Self> {
        let mut tools = ToolManager::new().with_aggregation(settings.rag.source_aggregation);
        tools.register(Arc::new(CourseSearchTool::new(store.clone())))?;
        tools.register(Arc::new(CourseOutlineTool::new(store.clone())))?;

        let agent = Agent::new(model, prompts.system_prompt()).with_max_rounds(settings.rag.max_rounds);

        Ok(Self {
            store,
            processor: DocumentProcessor::from_settings(&settings.documents)?,
            tools,
            agent,
            prompts,
            sessions: SessionManager::new(settings.rag.max_history),
        })
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer a question, optionally within a conversation.
    ///
    /// Tool provenance is cleared before the run and collected after it. The
    /// exchange is added to the session only once an answer exists.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<RagResponse> {
        info!("Processing query: {}", query);
        self.tools.clear_sources();

        let prompt = self.prompts.query_prompt(query);
        let history = match session_id {
            Some(id) => self.sessions.conversation_history(id)?,
            None => None,
        };

        let outcome = self
            .agent
            .run(&prompt, history.as_deref(), Some(&self.tools))
            .await?;

        let sources = self.tools.collect_sources();
        self.tools.clear_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &outcome.answer)?;
        }

        debug!(
            "Answered with {} model calls, {} tool calls, {} sources",
            outcome.model_calls,
            outcome.tool_calls.len(),
            sources.len()
        );

        Ok(RagResponse {
            answer: outcome.answer,
            sources,
            tool_calls: outcome.tool_calls,
        })
    }

    /// Index one course document. Returns the course and its chunk count.
    #[instrument(skip(self))]
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize)> {
        let parsed = self.processor.process_file(path).await?;
        let added = self.index_course(&parsed).await?;
        Ok((parsed.course, added))
    }

    async fn index_course(&self, parsed: &ParsedCourse) -> Result<usize> {
        self.store.add_course_metadata(&parsed.course).await?;
        self.store.add_course_content(&parsed.chunks).await
    }

    /// Index every course document in a folder.
    ///
    /// Courses already in the catalog are skipped. Files that fail are logged
    /// and skipped. Returns (courses added, chunks added).
    #[instrument(skip(self))]
    pub async fn add_course_folder(&self, folder: &Path, clear_existing: bool) -> Result<(usize, usize)> {
        if clear_existing {
            info!("Clearing existing course data");
            self.store.clear_all_data().await?;
        }

        if !folder.is_dir() {
            warn!("Course folder {} does not exist", folder.display());
            return Ok((0, 0));
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && DocumentProcessor::is_supported(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut existing: HashSet<String> =
            self.store.existing_course_titles().await?.into_iter().collect();
        let mut courses = 0;
        let mut chunks = 0;

        for path in paths {
            let parsed = match self.processor.process_file(&path).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if existing.contains(&parsed.course.title) {
                debug!("Course already indexed: {}", parsed.course.title);
                continue;
            }

            match self.index_course(&parsed).await {
                Ok(added) => {
                    info!("Added course '{}' ({} chunks)", parsed.course.title, added);
                    existing.insert(parsed.course.title.clone());
                    courses += 1;
                    chunks += added;
                }
                Err(e) => warn!("Failed to index {}: {}", path.display(), e),
            }
        }

        Ok((courses, chunks))
    }

    /// Number and titles of indexed courses.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.store.existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{tool_use, ScriptedModel};
    use crate::embedding::TrigramEmbedder;
    use crate::llm::{ContentBlock, ModelResponse};
    use crate::vector_store::MemoryCourseIndex;
    use serde_json::json;

    const COURSE: &str = "Course Title: Python Programming Basics
Course Link: https://example.com/python
Course Instructor: Ada

Lesson 1: Getting Started
Lesson Link: https://example.com/python/1
Install the python interpreter. Run your first script.

Lesson 2: Variables
Variables hold python values. Names point at objects.
";

    fn system(model: Arc<ScriptedModel>) -> RagSystem {
        let settings = Settings::default();
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryCourseIndex::new()),
            Arc::new(TrigramEmbedder::new(512)),
            5,
        ));
        RagSystem::with_components(&settings, store, model, Prompts::default()).unwrap()
    }

    fn write_course(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_add_course_folder_skips_known_titles() {
        let dir = tempfile::tempdir().unwrap();
        write_course(dir.path(), "python.txt", COURSE);
        write_course(dir.path(), "ignored.pdf", "binary");

        let rag = system(Arc::new(ScriptedModel::new()));
        let (courses, chunks) = rag.add_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(courses, 1);
        assert_eq!(chunks, 2);

        let (courses, chunks) = rag.add_course_folder(dir.path(), false).await.unwrap();
        assert_eq!((courses, chunks), (0, 0));

        let (courses, _) = rag.add_course_folder(dir.path(), true).await.unwrap();
        assert_eq!(courses, 1);

        let analytics = rag.course_analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 1);
        assert_eq!(analytics.course_titles, vec!["Python Programming Basics"]);
    }

    #[tokio::test]
    async fn test_missing_folder_adds_nothing() {
        let rag = system(Arc::new(ScriptedModel::new()));
        let result = rag
            .add_course_folder(Path::new("/definitely/not/here"), false)
            .await
            .unwrap();
        assert_eq!(result, (0, 0));
    }

    #[tokio::test]
    async fn test_query_returns_sources_and_records_session() {
        let dir = tempfile::tempdir().unwrap();
        write_course(dir.path(), "python.txt", COURSE);

        let model = Arc::new(
            ScriptedModel::new()
                .then(tool_use(&[(
                    "get_course_outline",
                    json!({"course_name": "Python"}),
                )]))
                .then(ModelResponse::text("It has two lessons.")),
        );
        let rag = system(model.clone());
        rag.add_course_folder(dir.path(), false).await.unwrap();

        let session = rag.sessions().create_session().unwrap();
        let response = rag.query("What is in the python course?", Some(&session)).await.unwrap();

        assert_eq!(response.answer, "It has two lessons.");
        assert_eq!(
            response.sources,
            vec![Source::new(
                "Python Programming Basics - Course Outline",
                Some("https://example.com/python".to_string())
            )]
        );
        assert!(rag.tools().collect_sources().is_empty());

        let first = &model.requests()[0];
        assert_eq!(
            first.messages[0].content[0],
            ContentBlock::text("Answer this question about course materials: What is in the python course?")
        );

        assert_eq!(
            rag.sessions().conversation_history(&session).unwrap().as_deref(),
            Some("User: What is in the python course?\nAssistant: It has two lessons.")
        );
    }

    #[tokio::test]
    async fn test_history_reaches_system_prompt() {
        let model = Arc::new(
            ScriptedModel::new()
                .then(ModelResponse::text("first"))
                .then(ModelResponse::text("second")),
        );
        let rag = system(model.clone());
        let session = rag.sessions().create_session().unwrap();

        rag.query("one", Some(&session)).await.unwrap();
        rag.query("two", Some(&session)).await.unwrap();

        let second = &model.requests()[1];
        assert!(second
            .system
            .ends_with("\n\nPrevious conversation:\nUser: one\nAssistant: first"));
    }

    #[tokio::test]
    async fn test_model_failure_leaves_session_untouched() {
        let model = Arc::new(ScriptedModel::new().then_fail("down"));
        let rag = system(model);
        let session = rag.sessions().create_session().unwrap();

        assert!(rag.query("hello", Some(&session)).await.is_err());
        assert_eq!(rag.sessions().conversation_history(&session).unwrap(), None);
    }
}
