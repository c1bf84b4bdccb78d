//! Offline embeddings from hashed character trigrams.
//!
//! Not semantically aware, but deterministic and content dependent: strings
//! sharing word fragments land close together. Useful without network access
//! and for tests. Vectors are unit length, so squared distances fall in 0..=4
//! like the OpenAI embeddings.

use super::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "were", "have", "has",
    "had", "its", "their", "they", "them", "which", "but",
];

/// Trigram-based embedder for local, offline operation.
#[derive(Debug, Clone)]
pub struct TrigramEmbedder {
    dimensions: usize,
}

impl TrigramEmbedder {
    /// Create a trigram embedder producing vectors of the given size.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, gram: &str, seed: u64) -> usize {
        // FNV-1a
        let hash = gram.bytes().fold(0xcbf2_9ce4_8422_2325_u64 ^ seed, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let weight = (*freq as f32).sqrt();
            let chars: Vec<char> = word.chars().collect();
            if chars.len() < 3 {
                embedding[self.bucket(word, 0)] += weight;
            } else {
                for window in chars.windows(3) {
                    let trigram: String = window.iter().collect();
                    embedding[self.bucket(&trigram, 0)] += weight;
                }
            }
            embedding[self.bucket(word, 1)] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl Embedder for TrigramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
