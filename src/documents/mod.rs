//! Course document parsing and chunking.
//!
//! A course document is plain text with a short header followed by lessons:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/course/0
//! Welcome to the course...
//! ```

mod chunker;

pub use chunker::SentenceChunker;

use crate::config::DocumentSettings;
use crate::error::{Result, SyllabusError};
use crate::models::{Course, CourseChunk, Lesson};
use regex::Regex;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// File extensions treated as course documents.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// A parsed course and its content chunks.
#[derive(Debug, Clone)]
pub struct ParsedCourse {
    pub course: Course,
    pub chunks: Vec<CourseChunk>,
}

/// Turns course documents into a [`Course`] and its chunks.
pub struct DocumentProcessor {
    chunker: SentenceChunker,
    header: Regex,
    lesson: Regex,
    lesson_link: Regex,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let pattern = |p: &str| {
            Regex::new(p).map_err(|e| SyllabusError::Config(format!("Invalid pattern: {}", e)))
        };

        Ok(Self {
            chunker: SentenceChunker::new(chunk_size, chunk_overlap)?,
            header: pattern(r"(?i)^Course\s+(Title|Link|Instructor):\s*(.*)$")?,
            lesson: pattern(r"(?i)^Lesson\s+(\d+):\s*(.*)$")?,
            lesson_link: pattern(r"(?i)^Lesson\s+Link:\s*(.*)$")?,
        })
    }

    pub fn from_settings(settings: &DocumentSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Whether a path looks like a course document.
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
    }

    /// Read and parse a course document. The file stem is the title fallback.
    #[instrument(skip(self))]
    pub async fn process_file(&self, path: &Path) -> Result<ParsedCourse> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyllabusError::Document(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let fallback = path.file_stem().and_then(|s| s.to_str());
        self.parse(&text, fallback)
    }

    /// Parse document text.
    pub fn parse(&self, text: &str, fallback_title: Option<&str>) -> Result<ParsedCourse> {
        let mut lines = text.lines().peekable();

        let mut title = None;
        let mut course_link = None;
        let mut instructor = None;

        while let Some(&line) = lines.peek() {
            let line = line.trim();
            if line.is_empty() {
                lines.next();
                continue;
            }
            let Some(caps) = self.header.captures(line) else {
                break;
            };
            let value = caps[2].trim().to_string();
            match caps[1].to_lowercase().as_str() {
                "title" => title = Some(value).filter(|v| !v.is_empty()),
                "link" => course_link = valid_link(&value),
                _ => instructor = Some(value).filter(|v| !v.is_empty()),
            }
            lines.next();
        }

        let title = title
            .or_else(|| fallback_title.map(str::to_string))
            .ok_or_else(|| SyllabusError::Document("Missing course title".to_string()))?;

        let mut course = Course::new(title);
        course.course_link = course_link;
        course.instructor = instructor;

        let mut chunks = Vec::new();
        let mut current: Option<u32> = None;
        let mut body = String::new();

        while let Some(line) = lines.next() {
            let trimmed = line.trim();
            let Some(caps) = self.lesson.captures(trimmed) else {
                body.push_str(line);
                body.push('\n');
                continue;
            };
            let Ok(number) = caps[1].parse::<u32>() else {
                body.push_str(line);
                body.push('\n');
                continue;
            };

            self.flush(&course.title, current, &body, &mut chunks);
            body.clear();
            current = Some(number);

            let link = match lines.peek().copied().and_then(|l| self.lesson_link.captures(l.trim())) {
                Some(link_caps) => {
                    let link = valid_link(link_caps[1].trim());
                    lines.next();
                    link
                }
                None => None,
            };

            if course.lesson(number).is_some() {
                warn!(
                    "Duplicate lesson {} in '{}'; appending to the earlier one",
                    number, course.title
                );
                continue;
            }

            let mut lesson = Lesson::new(number, caps[2].trim());
            lesson.lesson_link = link;
            course.lessons.push(lesson);
        }
        self.flush(&course.title, current, &body, &mut chunks);

        debug!(
            "Parsed '{}': {} lessons, {} chunks",
            course.title,
            course.lessons.len(),
            chunks.len()
        );

        Ok(ParsedCourse { course, chunks })
    }

    fn flush(
        &self,
        course_title: &str,
        lesson_number: Option<u32>,
        body: &str,
        chunks: &mut Vec<CourseChunk>,
    ) {
        for (i, text) in self.chunker.chunk(body).into_iter().enumerate() {
            let content = match lesson_number {
                Some(n) if i == 0 => format!("Lesson {} content: {}", n, text),
                _ => text,
            };
            chunks.push(CourseChunk {
                content,
                course_title: course_title.to_string(),
                lesson_number,
                chunk_index: chunks.len(),
            });
        }
    }
}

fn valid_link(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    match url::Url::parse(value) {
        Ok(_) => Some(value.to_string()),
        Err(e) => {
            warn!("Ignoring invalid link '{}': {}", value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Course Title: Building Towards Computer Use
Course Link: https://example.com/computer-use
Course Instructor: Colt Steele

Lesson 0: Introduction
Lesson Link: https://example.com/computer-use/0
Welcome to the course. You will build an agent.

Lesson 1: Prompt Caching
Caching saves tokens. It also cuts latency.
";

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(800, 100).unwrap()
    }

    #[test]
    fn test_parse_header_and_lessons() {
        let parsed = processor().parse(DOC, None).unwrap();
        let course = &parsed.course;

        assert_eq!(course.title, "Building Towards Computer Use");
        assert_eq!(course.course_link.as_deref(), Some("https://example.com/computer-use"));
        assert_eq!(course.instructor.as_deref(), Some("Colt Steele"));
        assert_eq!(course.lessons.len(), 2);
        assert_eq!(course.lessons[0].title, "Introduction");
        assert_eq!(
            course.lessons[0].lesson_link.as_deref(),
            Some("https://example.com/computer-use/0")
        );
        assert_eq!(course.lessons[1].lesson_link, None);
    }

    #[test]
    fn test_chunks_are_prefixed_and_indexed() {
        let parsed = processor().parse(DOC, None).unwrap();

        assert_eq!(parsed.chunks.len(), 2);
        assert_eq!(
            parsed.chunks[0].content,
            "Lesson 0 content: Welcome to the course. You will build an agent."
        );
        assert_eq!(parsed.chunks[0].lesson_number, Some(0));
        assert_eq!(parsed.chunks[1].lesson_number, Some(1));
        assert_eq!(parsed.chunks[1].chunk_index, 1);
        assert!(parsed
            .chunks
            .iter()
            .all(|c| c.course_title == "Building Towards Computer Use"));
    }

    #[test]
    fn test_only_first_lesson_chunk_is_prefixed() {
        let processor = DocumentProcessor::new(40, 0).unwrap();
        let parsed = processor
            .parse(
                "Course Title: T\nLesson 3: Long\nFirst sentence is here. Second sentence is here. Third one.",
                None,
            )
            .unwrap();

        assert!(parsed.chunks.len() > 1);
        assert!(parsed.chunks[0].content.starts_with("Lesson 3 content: "));
        assert!(parsed.chunks[1..]
            .iter()
            .all(|c| !c.content.starts_with("Lesson")));
    }

    #[test]
    fn test_document_without_lessons() {
        let parsed = processor()
            .parse("Just some notes. Nothing structured.", Some("notes"))
            .unwrap();

        assert_eq!(parsed.course.title, "notes");
        assert!(parsed.course.lessons.is_empty());
        assert_eq!(parsed.chunks.len(), 1);
        assert_eq!(parsed.chunks[0].lesson_number, None);
        assert_eq!(parsed.chunks[0].content, "Just some notes. Nothing structured.");
    }

    #[test]
    fn test_missing_title_without_fallback() {
        assert!(matches!(
            processor().parse("Lesson 1: A\nbody", None),
            Err(SyllabusError::Document(_))
        ));
    }

    #[test]
    fn test_invalid_links_are_dropped() {
        let parsed = processor()
            .parse("Course Title: T\nCourse Link: not a url\n", None)
            .unwrap();
        assert_eq!(parsed.course.course_link, None);
    }

    #[test]
    fn test_supported_extensions() {
        assert!(DocumentProcessor::is_supported(Path::new("course1_script.txt")));
        assert!(DocumentProcessor::is_supported(Path::new("notes.MD")));
        assert!(!DocumentProcessor::is_supported(Path::new("slides.pdf")));
        assert!(!DocumentProcessor::is_supported(Path::new("README")));
    }

    #[tokio::test]
    async fn test_process_file_uses_stem_as_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intro_course.txt");
        std::fs::write(&path, "Lesson 1: Start\nHello there. General Kenobi.").unwrap();

        let parsed = processor().process_file(&path).await.unwrap();
        assert_eq!(parsed.course.title, "intro_course");
        assert_eq!(parsed.course.lessons.len(), 1);
    }

    #[test]
    fn test_missing_file_is_a_document_error() {
        let result = tokio_test::block_on(processor().process_file(Path::new("/no/such/course.txt")));
        assert!(matches!(result, Err(SyllabusError::Document(_))));
    }
}
