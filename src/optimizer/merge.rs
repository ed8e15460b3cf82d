//! Related-chunk merge pass.
//!
//! Chunks under [`MERGE_SIZE_FACTOR`] of the maximum size are combined
//! with related small chunks: same namespace and class, mutual
//! related-method references, two or more shared tags, or word-set
//! Jaccard similarity above [`RELATED_SIMILARITY`]. Contents join with a
//! `---` separator and metadata sets union. A merge only happens when the
//! combined length stays within the maximum, and each chunk participates
//! in at most one merge per pass.

use super::dedup::{jaccard, word_set};
use crate::types::DocumentChunk;

pub const MERGE_SIZE_FACTOR: f64 = 0.6;
pub const RELATED_SIMILARITY: f64 = 0.3;

const SEPARATOR: &str = "\n\n---\n\n";

pub fn merge_related(chunks: Vec<DocumentChunk>, max_chunk_size: usize) -> Vec<DocumentChunk> {
    let threshold = (max_chunk_size as f64 * MERGE_SIZE_FACTOR) as usize;
    let n = chunks.len();
    let mut absorbed = vec![false; n];
    let mut out = Vec::with_capacity(n);
    let mut merges = 0usize;

    for i in 0..n {
        if absorbed[i] {
            continue;
        }
        if chunks[i].content.len() >= threshold {
            out.push(chunks[i].clone());
            continue;
        }

        let mut base = chunks[i].clone();
        let mut base_words = word_set(&base.content);
        let mut merged_any = false;

        for j in (i + 1)..n {
            if absorbed[j] {
                continue;
            }
            let candidate = &chunks[j];
            if candidate.content.len() >= threshold {
                continue;
            }
            if !related(&base, &base_words, candidate) {
                continue;
            }
            if base.content.len() + SEPARATOR.len() + candidate.content.len() > max_chunk_size {
                continue;
            }

            base.content.push_str(SEPARATOR);
            base.content.push_str(&candidate.content);
            union_metadata(&mut base, candidate);
            base_words = word_set(&base.content);
            absorbed[j] = true;
            merged_any = true;
        }

        if merged_any {
            base.metadata.tags.insert("merged".to_string());
            merges += 1;
        }
        out.push(base);
    }

    if merges > 0 {
        tracing::info!(
            "Merge pass combined {} groups ({} -> {} chunks)",
            merges,
            n,
            out.len()
        );
    }
    out
}

fn related(
    base: &DocumentChunk,
    base_words: &std::collections::HashSet<String>,
    candidate: &DocumentChunk,
) -> bool {
    let a = &base.metadata;
    let b = &candidate.metadata;

    if a.namespace == b.namespace && a.class_name.is_some() && a.class_name == b.class_name {
        return true;
    }

    let mutual_reference = matches!(
        (&a.method_name, &b.method_name),
        (Some(am), Some(bm))
            if b.related_methods.contains(am) || a.related_methods.contains(bm)
    );
    if mutual_reference {
        return true;
    }

    let shared_tags = a.tags.intersection(&b.tags).count();
    if shared_tags >= 2 {
        return true;
    }

    jaccard(base_words, &word_set(&candidate.content)) > RELATED_SIMILARITY
}

fn union_metadata(base: &mut DocumentChunk, candidate: &DocumentChunk) {
    let meta = &mut base.metadata;
    let other = &candidate.metadata;

    meta.tags.extend(other.tags.iter().cloned());
    for list in [
        (&mut meta.related_methods, &other.related_methods),
        (&mut meta.dependencies, &other.dependencies),
        (&mut meta.common_mistakes, &other.common_mistakes),
        (&mut meta.use_cases, &other.use_cases),
    ] {
        let (dst, src) = list;
        for value in src {
            if !dst.contains(value) {
                dst.push(value.clone());
            }
        }
    }

    if other.importance > meta.importance {
        meta.importance = other.importance;
    }
}
