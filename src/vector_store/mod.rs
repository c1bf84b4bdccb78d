//! Vector storage for course catalog and course content.
//!
//! Two indexes live side by side: the catalog (one entry per course, keyed by
//! title) used to resolve fuzzy course names, and the content index holding
//! lesson chunks. Backends implement [`CourseIndex`]; [`VectorStore`] layers
//! embedding, name resolution and filtering on top.

mod memory;
mod resolver;
mod sqlite;

pub use memory::MemoryCourseIndex;
pub use resolver::CourseResolver;
pub use sqlite::SqliteCourseIndex;

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::models::{Course, CourseChunk};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Lesson record as serialized into a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonEntry {
    pub lesson_number: u32,
    pub lesson_title: String,
    pub lesson_link: Option<String>,
}

/// Course metadata stored in the catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub instructor: Option<String>,
    pub course_link: Option<String>,
    /// JSON array of [`LessonEntry`].
    pub lessons_json: String,
}

impl CatalogEntry {
    /// Build the catalog entry for a course.
    pub fn from_course(course: &Course) -> Result<Self> {
        let lessons: Vec<LessonEntry> = course
            .lessons
            .iter()
            .map(|l| LessonEntry {
                lesson_number: l.lesson_number,
                lesson_title: l.title.clone(),
                lesson_link: l.lesson_link.clone(),
            })
            .collect();

        Ok(Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            course_link: course.course_link.clone(),
            lessons_json: serde_json::to_string(&lessons)?,
        })
    }

    /// Decode the stored lesson list.
    pub fn lessons(&self) -> Result<Vec<LessonEntry>> {
        Ok(serde_json::from_str(&self.lessons_json)?)
    }
}

/// A catalog hit with its distance from the query.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub title: String,
    pub distance: f32,
}

/// A content hit with its distance from the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHit {
    pub chunk: CourseChunk,
    pub distance: f32,
}

/// Exact-match metadata filter for content queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter {
    /// Whether a chunk passes the filter.
    pub fn matches(&self, chunk: &CourseChunk) -> bool {
        let course_ok = self
            .course_title
            .as_ref()
            .map_or(true, |t| &chunk.course_title == t);
        let lesson_ok = self
            .lesson_number
            .map_or(true, |n| chunk.lesson_number == Some(n));
        course_ok && lesson_ok
    }
}

/// Metadata returned alongside each matched document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: usize,
}

/// Outcome of a content search.
///
/// Either three equal-length parallel sequences (documents, metadata,
/// distances) or an error with no documents. The constructors are the only
/// way to build one, so the two shapes cannot mix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    documents: Vec<String>,
    metadata: Vec<ChunkMetadata>,
    distances: Vec<f32>,
    error: Option<String>,
}

impl SearchResults {
    /// Results from index hits, in ranking order.
    pub fn from_hits(hits: Vec<ContentHit>) -> Self {
        let mut results = Self::default();
        for hit in hits {
            results.documents.push(hit.chunk.content);
            results.metadata.push(ChunkMetadata {
                course_title: hit.chunk.course_title,
                lesson_number: hit.chunk.lesson_number,
                chunk_index: hit.chunk.chunk_index,
            });
            results.distances.push(hit.distance);
        }
        results
    }

    /// No documents and no error.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A failed search.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Zero documents and no error.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Iterate over (document, metadata, distance) triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(self.metadata.iter())
            .zip(self.distances.iter())
            .map(|((doc, meta), dist)| (doc.as_str(), meta, *dist))
    }
}

/// Trait for course index backends.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    /// Insert or replace a catalog entry.
    async fn upsert_catalog(&self, entry: &CatalogEntry, embedding: &[f32]) -> Result<()>;

    /// Append content chunks with their embeddings.
    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Nearest catalog entries, closest first.
    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>>;

    /// Nearest content chunks passing the filter, closest first.
    async fn query_content(
        &self,
        embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>>;

    /// Get a catalog entry by exact title.
    async fn get_catalog_entry(&self, title: &str) -> Result<Option<CatalogEntry>>;

    /// All course titles in the catalog.
    async fn course_titles(&self) -> Result<Vec<String>>;

    /// Remove everything from both indexes.
    async fn clear(&self) -> Result<()>;
}

/// Squared Euclidean distance between two vectors.
///
/// For unit vectors this is `2 - 2 * cosine`, ranging over `0..=4`.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Storage layer used by the tools: text in, filtered results out.
pub struct VectorStore {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
    resolver: CourseResolver,
    max_results: usize,
}

impl VectorStore {
    /// Create a store over an index and embedder.
    pub fn new(index: Arc<dyn CourseIndex>, embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        Self {
            index,
            embedder,
            resolver: CourseResolver::default(),
            max_results,
        }
    }

    /// Open the backend selected in the settings.
    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index: Arc<dyn CourseIndex> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteCourseIndex::new(&settings.sqlite_path())?),
            "memory" => Arc::new(MemoryCourseIndex::new()),
            other => {
                return Err(SyllabusError::Config(format!(
                    "Unknown vector store provider: {}",
                    other
                )))
            }
        };

        Ok(Self::new(index, embedder, settings.vector_store.max_results)
            .with_resolver(CourseResolver::new(settings.rag.course_match_threshold)))
    }

    /// Replace the course-name resolver.
    pub fn with_resolver(mut self, resolver: CourseResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Search course content, optionally restricted to a course and lesson.
    ///
    /// A course name that does not resolve fails the search instead of
    /// widening it to every course.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        let course_title = match course_name.filter(|name| !name.trim().is_empty()) {
            Some(name) => match self.resolve_course_name(name).await {
                Some(title) => Some(title),
                None => return SearchResults::from_error(format!("No course found matching '{}'", name)),
            },
            None => None,
        };

        let filter = ContentFilter {
            course_title,
            lesson_number,
        };

        match self.query_content(query, &filter).await {
            Ok(hits) => {
                debug!("Content search returned {} hits", hits.len());
                SearchResults::from_hits(hits)
            }
            Err(e) => {
                warn!("Content search failed: {}", e);
                SearchResults::from_error(format!("Search error: {}", e))
            }
        }
    }

    async fn query_content(&self, query: &str, filter: &ContentFilter) -> Result<Vec<ContentHit>> {
        let embedding = self.embedder.embed(query).await?;
        self.index
            .query_content(&embedding, filter, self.max_results)
            .await
    }

    /// Map a fuzzy course name to a catalog title. Never fails; see [`CourseResolver`].
    pub async fn resolve_course_name(&self, course_name: &str) -> Option<String> {
        self.resolver.resolve(self, course_name).await
    }

    /// Nearest catalog entries for free text.
    ///
    /// Text that embeds to the zero vector is equidistant from every entry
    /// and matches nothing.
    pub async fn query_catalog(&self, text: &str, top_k: usize) -> Result<Vec<CatalogMatch>> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.iter().all(|v| *v == 0.0) {
            debug!("'{}' has no catalog signal", text);
            return Ok(Vec::new());
        }
        self.index.query_catalog(&embedding, top_k).await
    }

    /// Catalog entry for an exact course title.
    pub async fn get_catalog_entry(&self, course_title: &str) -> Result<Option<CatalogEntry>> {
        self.index.get_catalog_entry(course_title).await
    }

    /// Link of a lesson, if the course and lesson are known and linked.
    pub async fn get_lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
        let entry = self.catalog_entry_or_warn(course_title).await?;
        match entry.lessons() {
            Ok(lessons) => lessons
                .into_iter()
                .find(|l| l.lesson_number == lesson_number)
                .and_then(|l| l.lesson_link)
                .filter(|link| !link.is_empty()),
            Err(e) => {
                warn!("Malformed lesson list for '{}': {}", course_title, e);
                None
            }
        }
    }

    /// Link of a course, if known.
    pub async fn get_course_link(&self, course_title: &str) -> Option<String> {
        self.catalog_entry_or_warn(course_title)
            .await?
            .course_link
            .filter(|link| !link.is_empty())
    }

    async fn catalog_entry_or_warn(&self, course_title: &str) -> Option<CatalogEntry> {
        match self.index.get_catalog_entry(course_title).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Catalog lookup for '{}' failed: {}", course_title, e);
                None
            }
        }
    }

    /// Add or replace a course in the catalog.
    #[instrument(skip(self, course), fields(course = %course.title))]
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let entry = CatalogEntry::from_course(course)?;
        let embedding = self.embedder.embed(&course.title).await?;
        self.index.upsert_catalog(&entry, &embedding).await?;
        info!("Added course '{}' to catalog", course.title);
        Ok(())
    }

    /// Embed and store content chunks.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(SyllabusError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        self.index.add_chunks(chunks, &embeddings).await
    }

    /// Titles of every indexed course.
    pub async fn existing_course_titles(&self) -> Result<Vec<String>> {
        self.index.course_titles().await
    }

    /// Number of indexed courses.
    pub async fn course_count(&self) -> Result<usize> {
        Ok(self.index.course_titles().await?.len())
    }

    /// Drop all catalog and content data.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.index.clear().await?;
        info!("Cleared all course data");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic embedder for store and tool tests.

    use super::*;
    use std::collections::HashMap;

    /// Maps known texts to fixed vectors; unknown texts get `fallback`.
    pub struct StubEmbedder {
        pub vectors: HashMap<String, Vec<f32>>,
        pub fallback: Vec<f32>,
    }

    impl StubEmbedder {
        pub fn new(fallback: Vec<f32>) -> Self {
            Self {
                vectors: HashMap::new(),
                fallback,
            }
        }

        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            self.fallback.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubEmbedder;
    use super::*;
    use crate::embedding::TrigramEmbedder;
    use crate::models::Lesson;

    fn chunk(course: &str, lesson: Option<u32>, index: usize, content: &str) -> CourseChunk {
        CourseChunk {
            content: content.to_string(),
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    async fn python_store() -> VectorStore {
        let store = VectorStore::new(
            Arc::new(MemoryCourseIndex::new()),
            Arc::new(TrigramEmbedder::new(512)),
            5,
        );
        let course = Course::new("Python Programming Basics")
            .with_link("https://example.com/python")
            .with_lesson(Lesson::new(1, "Getting Started").with_link("https://example.com/python/1"))
            .with_lesson(Lesson::new(2, "Variables"));
        store.add_course_metadata(&course).await.unwrap();
        store
            .add_course_content(&[
                chunk("Python Programming Basics", Some(1), 0, "Install the python interpreter"),
                chunk("Python Programming Basics", Some(2), 1, "Variables hold python values"),
            ])
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_squared_distance() {
        assert_eq!(squared_distance(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((squared_distance(&[1.0, 0.0], &[0.0, 1.0]) - 2.0).abs() < 1e-6);
        assert!((squared_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 4.0).abs() < 1e-6);
        assert!(squared_distance(&[1.0], &[1.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_search_results_shapes() {
        let hits = vec![
            ContentHit {
                chunk: chunk("A", Some(1), 0, "one"),
                distance: 0.1,
            },
            ContentHit {
                chunk: chunk("A", None, 1, "two"),
                distance: 0.4,
            },
        ];
        let results = SearchResults::from_hits(hits);
        assert_eq!(results.documents().len(), results.metadata().len());
        assert_eq!(results.metadata().len(), results.distances().len());
        assert!(results.error().is_none());
        assert!(!results.is_empty());

        let failed = SearchResults::from_error("boom");
        assert_eq!(failed.error(), Some("boom"));
        assert!(failed.documents().is_empty());
        assert!(!failed.is_empty());

        assert!(SearchResults::empty().is_empty());
        assert!(SearchResults::from_hits(Vec::new()).is_empty());
    }

    #[test]
    fn test_content_filter() {
        let c = chunk("A", Some(2), 0, "x");
        assert!(ContentFilter::default().matches(&c));
        assert!(ContentFilter {
            course_title: Some("A".into()),
            lesson_number: Some(2)
        }
        .matches(&c));
        assert!(!ContentFilter {
            course_title: Some("B".into()),
            lesson_number: None
        }
        .matches(&c));
        assert!(!ContentFilter {
            course_title: None,
            lesson_number: Some(3)
        }
        .matches(&c));
    }

    #[tokio::test]
    async fn test_search_unknown_course_is_an_error() {
        let embedder = StubEmbedder::new(vec![0.0, 1.0])
            .with("Python Programming Basics", vec![1.0, 0.0]);
        let store = VectorStore::new(Arc::new(MemoryCourseIndex::new()), Arc::new(embedder), 5);
        store
            .add_course_metadata(&Course::new("Python Programming Basics"))
            .await
            .unwrap();

        // Fallback vector is orthogonal: distance 2.0 is above the threshold.
        let results = store
            .search("anything", Some("Nonexistent Course ZZZ"), None)
            .await;
        assert_eq!(
            results.error(),
            Some("No course found matching 'Nonexistent Course ZZZ'")
        );
        assert!(results.documents().is_empty());
    }

    #[tokio::test]
    async fn test_search_filters_by_lesson() {
        let store = python_store().await;
        let results = store.search("python", Some("Python"), Some(2)).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results.metadata()[0].lesson_number, Some(2));
        assert_eq!(results.metadata()[0].course_title, "Python Programming Basics");
    }

    #[tokio::test]
    async fn test_blank_course_name_is_no_filter() {
        let store = python_store().await;
        for name in ["", "   "] {
            let results = store.search("python", Some(name), None).await;
            assert!(results.error().is_none(), "name {:?}", name);
            assert_eq!(results.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_links() {
        let store = python_store().await;
        assert_eq!(
            store.get_lesson_link("Python Programming Basics", 1).await.as_deref(),
            Some("https://example.com/python/1")
        );
        assert_eq!(store.get_lesson_link("Python Programming Basics", 2).await, None);
        assert_eq!(
            store.get_course_link("Python Programming Basics").await.as_deref(),
            Some("https://example.com/python")
        );
        assert_eq!(store.get_course_link("Unknown").await, None);
    }

    #[tokio::test]
    async fn test_course_count_and_clear() {
        let store = python_store().await;
        assert_eq!(store.course_count().await.unwrap(), 1);
        store.clear_all_data().await.unwrap();
        assert_eq!(store.course_count().await.unwrap(), 0);
        assert!(store.search("python", None, None).await.is_empty());
    }
}
