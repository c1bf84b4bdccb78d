//! In-memory course index.
//!
//! Useful for testing and small course sets.

use super::{
    squared_distance, CatalogEntry, CatalogMatch, ContentFilter, ContentHit, CourseIndex,
};
use crate::error::{Result, SyllabusError};
use crate::models::CourseChunk;
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    /// Catalog in insertion order; titles are unique.
    catalog: Vec<(CatalogEntry, Vec<f32>)>,
    content: Vec<(CourseChunk, Vec<f32>)>,
}

/// In-memory course index.
#[derive(Default)]
pub struct MemoryCourseIndex {
    inner: RwLock<Inner>,
}

impl MemoryCourseIndex {
    /// Create an empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

fn by_distance<T>(items: &mut [(T, f32)]) {
    items.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
}

#[async_trait]
impl CourseIndex for MemoryCourseIndex {
    async fn upsert_catalog(&self, entry: &CatalogEntry, embedding: &[f32]) -> Result<()> {
        let mut inner = self.write()?;
        match inner.catalog.iter_mut().find(|(e, _)| e.title == entry.title) {
            Some(slot) => *slot = (entry.clone(), embedding.to_vec()),
            None => inner.catalog.push((entry.clone(), embedding.to_vec())),
        }
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut inner = self.write()?;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            inner.content.push((chunk.clone(), embedding.clone()));
        }
        Ok(chunks.len().min(embeddings.len()))
    }

    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let inner = self.read()?;
        let mut scored: Vec<(String, f32)> = inner
            .catalog
            .iter()
            .map(|(entry, vector)| (entry.title.clone(), squared_distance(embedding, vector)))
            .collect();
        by_distance(&mut scored);
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(title, distance)| CatalogMatch { title, distance })
            .collect())
    }

    async fn query_content(
        &self,
        embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>> {
        let inner = self.read()?;
        let mut scored: Vec<(CourseChunk, f32)> = inner
            .content
            .iter()
            .filter(|(chunk, _)| filter.matches(chunk))
            .map(|(chunk, vector)| (chunk.clone(), squared_distance(embedding, vector)))
            .collect();
        by_distance(&mut scored);
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(chunk, distance)| ContentHit { chunk, distance })
            .collect())
    }

    async fn get_catalog_entry(&self, title: &str) -> Result<Option<CatalogEntry>> {
        let inner = self.read()?;
        Ok(inner
            .catalog
            .iter()
            .find(|(e, _)| e.title == title)
            .map(|(e, _)| e.clone()))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.catalog.iter().map(|(e, _)| e.title.clone()).collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.catalog.clear();
        inner.content.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            instructor: None,
            course_link: None,
            lessons_json: "[]".to_string(),
        }
    }

    fn chunk(course: &str, lesson: u32, content: &str) -> CourseChunk {
        CourseChunk {
            content: content.to_string(),
            course_title: course.to_string(),
            lesson_number: Some(lesson),
            chunk_index: 0,
        }
    }

    #[tokio::test]
    async fn test_catalog_upsert_replaces_by_title() {
        let index = MemoryCourseIndex::new();
        index.upsert_catalog(&entry("A"), &[1.0, 0.0]).await.unwrap();
        index.upsert_catalog(&entry("B"), &[0.0, 1.0]).await.unwrap();

        let mut replacement = entry("A");
        replacement.instructor = Some("Ada".to_string());
        index.upsert_catalog(&replacement, &[1.0, 0.0]).await.unwrap();

        assert_eq!(index.course_titles().await.unwrap(), vec!["A", "B"]);
        let stored = index.get_catalog_entry("A").await.unwrap().unwrap();
        assert_eq!(stored.instructor.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_query_catalog_orders_by_distance() {
        let index = MemoryCourseIndex::new();
        index.upsert_catalog(&entry("Far"), &[0.0, 1.0]).await.unwrap();
        index.upsert_catalog(&entry("Near"), &[1.0, 0.0]).await.unwrap();

        let matches = index.query_catalog(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].title, "Near");
        assert_eq!(matches[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_query_content_applies_filter_and_limit() {
        let index = MemoryCourseIndex::new();
        index
            .add_chunks(
                &[chunk("A", 1, "a1"), chunk("A", 2, "a2"), chunk("B", 1, "b1")],
                &[vec![1.0, 0.0], vec![0.9, 0.1], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let filter = ContentFilter {
            course_title: Some("A".to_string()),
            lesson_number: None,
        };
        let hits = index.query_content(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "a1");

        let hits = index
            .query_content(&[1.0, 0.0], &ContentFilter::default(), 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
