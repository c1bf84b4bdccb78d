//! Sentence-window text chunking.

use crate::error::{Result, SyllabusError};
use regex::Regex;

/// Packs sentences into chunks of bounded size with trailing overlap.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    boundary: Regex,
}

impl SentenceChunker {
    /// Create a chunker. `chunk_size` and `chunk_overlap` are in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SyllabusError::Config(
                "documents.chunk_size must be greater than zero".to_string(),
            ));
        }

        let boundary = Regex::new(r"[.!?]+\s+")
            .map_err(|e| SyllabusError::Config(format!("Invalid sentence pattern: {}", e)))?;

        Ok(Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size),
            boundary,
        })
    }

    /// Split text into sentences after collapsing whitespace.
    ///
    /// A sentence ends at `.`, `!` or `?` followed by whitespace and an
    /// uppercase letter, so abbreviations like "e.g. this" stay intact.
    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.boundary.find_iter(&normalized) {
            let next_is_upper = normalized[m.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase());
            if !next_is_upper {
                continue;
            }
            let sentence = normalized[start..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }

        let rest = normalized[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
        sentences
    }

    /// Chunk text. A sentence longer than the chunk size becomes its own chunk.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let sentences = self.split_sentences(text);
        let mut chunks = Vec::new();
        let mut i = 0;

        while i < sentences.len() {
            let mut size = 0;
            let mut taken = 0;
            for sentence in &sentences[i..] {
                let len = sentence.chars().count() + usize::from(taken > 0);
                if taken > 0 && size + len > self.chunk_size {
                    break;
                }
                size += len;
                taken += 1;
            }

            let window = &sentences[i..i + taken];
            chunks.push(window.join(" "));

            if i + taken >= sentences.len() {
                break;
            }

            let mut overlap_size = 0;
            let mut overlap_count = 0;
            for sentence in window.iter().rev() {
                let len = sentence.chars().count() + 1;
                if overlap_size + len > self.chunk_overlap {
                    break;
                }
                overlap_size += len;
                overlap_count += 1;
            }

            // Always advance by at least one sentence.
            i += (taken - overlap_count).max(1);
        }

        chunks
    }
}
