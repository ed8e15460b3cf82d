//! Deduplication pass.
//!
//! A chunk duplicates an already-accepted one when their normalized
//! content hashes match exactly, or their word-set Jaccard similarity
//! exceeds [`DUPLICATE_SIMILARITY`]. The survivor is always the chunk
//! with the higher importance rank; ties keep the earlier-seen chunk.

use crate::types::DocumentChunk;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Jaccard similarity above which two chunks count as duplicates
pub const DUPLICATE_SIMILARITY: f64 = 0.9;

/// Case-fold, strip punctuation, collapse whitespace
pub fn normalize_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last_was_space = true;

    for c in content.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }

    out.trim_end().to_string()
}

/// Digest of the normalized content
pub fn normalized_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_content(content).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lower-cased alphanumeric word set
pub fn word_set(content: &str) -> HashSet<String> {
    normalize_content(content)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Word-set intersection over union; 1.0 for two empty sets
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

struct Accepted {
    chunk: DocumentChunk,
    hash: String,
    words: HashSet<String>,
}

pub fn deduplicate(chunks: Vec<DocumentChunk>) -> Vec<DocumentChunk> {
    let mut accepted: Vec<Accepted> = Vec::with_capacity(chunks.len());
    let mut dropped = 0usize;

    for chunk in chunks {
        let hash = normalized_hash(&chunk.content);
        let words = word_set(&chunk.content);

        let duplicate_of = accepted
            .iter()
            .position(|a| a.hash == hash || jaccard(&a.words, &words) > DUPLICATE_SIMILARITY);

        match duplicate_of {
            Some(idx) => {
                dropped += 1;
                // keep whichever side ranks higher; the earlier chunk's
                // position in the output is preserved either way
                if chunk.metadata.importance > accepted[idx].chunk.metadata.importance {
                    tracing::debug!(
                        "Duplicate pair ({}, {}): keeping later, higher-importance chunk",
                        accepted[idx].chunk.id,
                        chunk.id
                    );
                    accepted[idx] = Accepted { chunk, hash, words };
                } else {
                    tracing::debug!(
                        "Duplicate pair ({}, {}): keeping earlier chunk",
                        accepted[idx].chunk.id,
                        chunk.id
                    );
                }
            }
            None => accepted.push(Accepted { chunk, hash, words }),
        }
    }

    if dropped > 0 {
        tracing::info!("Deduplication dropped {} chunks", dropped);
    }
    accepted.into_iter().map(|a| a.chunk).collect()
}
