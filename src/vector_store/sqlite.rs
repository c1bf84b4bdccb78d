//! SQLite-based course index.
//!
//! Stores embeddings as little-endian f32 blobs and computes distances in
//! Rust. Course sets are small, so a full scan per query is acceptable.

use super::{
    squared_distance, CatalogEntry, CatalogMatch, ContentFilter, ContentHit, CourseIndex,
};
use crate::error::{Result, SyllabusError};
use crate::models::CourseChunk;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS course_catalog (
        title TEXT PRIMARY KEY,
        instructor TEXT,
        course_link TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS course_content (
        id TEXT PRIMARY KEY,
        course_title TEXT NOT NULL,
        lesson_number INTEGER,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_content_course ON course_content(course_title);
    CREATE INDEX IF NOT EXISTS idx_content_lesson ON course_content(course_title, lesson_number);
"#;

/// SQLite-based course index.
pub struct SqliteCourseIndex {
    conn: Mutex<Connection>,
}

impl SqliteCourseIndex {
    /// Open (or create) an index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SyllabusError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl CourseIndex for SqliteCourseIndex {
    #[instrument(skip(self, entry, embedding), fields(title = %entry.title))]
    async fn upsert_catalog(&self, entry: &CatalogEntry, embedding: &[f32]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO course_catalog
            (title, instructor, course_link, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.title,
                entry.instructor,
                entry.course_link,
                entry.lessons_json,
                Self::embedding_to_bytes(embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!("Upserted catalog entry");
        Ok(())
    }

    #[instrument(skip(self, chunks, embeddings))]
    async fn add_chunks(&self, chunks: &[CourseChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            tx.execute(
                r#"
                INSERT INTO course_content
                (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index as i64,
                    chunk.content,
                    Self::embedding_to_bytes(embedding),
                ],
            )?;
            inserted += 1;
        }

        tx.commit()?;
        info!("Inserted {} content chunks", inserted);
        Ok(inserted)
    }

    #[instrument(skip(self, embedding))]
    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title, embedding FROM course_catalog")?;

        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((title, bytes))
        })?;

        let mut matches: Vec<CatalogMatch> = Vec::new();
        for row in rows {
            let (title, bytes) = row?;
            matches.push(CatalogMatch {
                title,
                distance: squared_distance(embedding, &Self::bytes_to_embedding(&bytes)),
            });
        }

        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    #[instrument(skip(self, embedding))]
    async fn query_content(
        &self,
        embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ContentHit>> {
        let mut sql = String::from(
            "SELECT course_title, lesson_number, chunk_index, content, embedding FROM course_content",
        );
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &filter.course_title {
            values.push(Value::Text(title.clone()));
            clauses.push(format!("course_title = ?{}", values.len()));
        }
        if let Some(lesson) = filter.lesson_number {
            values.push(Value::Integer(lesson as i64));
            clauses.push(format!("lesson_number = ?{}", values.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let chunk_index: i64 = row.get(2)?;
            let bytes: Vec<u8> = row.get(4)?;
            Ok((
                CourseChunk {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: chunk_index as usize,
                    content: row.get(3)?,
                },
                bytes,
            ))
        })?;

        let mut hits: Vec<ContentHit> = Vec::new();
        for row in rows {
            let (chunk, bytes) = row?;
            hits.push(ContentHit {
                distance: squared_distance(embedding, &Self::bytes_to_embedding(&bytes)),
                chunk,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    async fn get_catalog_entry(&self, title: &str) -> Result<Option<CatalogEntry>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT title, instructor, course_link, lessons_json FROM course_catalog WHERE title = ?1",
            params![title],
            |row| {
                Ok(CatalogEntry {
                    title: row.get(0)?,
                    instructor: row.get(1)?,
                    course_link: row.get(2)?,
                    lessons_json: row.get(3)?,
                })
            },
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title FROM course_catalog ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let titles = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(titles)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM course_catalog; DELETE FROM course_content;")?;
        Ok(())
    }
}
