//! Corpus-wide chunk optimization.
//!
//! Five ordered passes: deduplication, oversized splitting, related-chunk
//! merging, quality scoring, and priority sorting. The order is fixed
//! because later passes assume earlier cleanup (splitting a duplicate
//! would mint sub-chunks nothing wants); configuration can only toggle
//! individual passes off.

mod dedup;
mod merge;
mod quality;
mod split;

pub use dedup::{jaccard, normalized_hash, word_set};
pub use quality::{overall_score, quality_of, quality_tag};

use crate::config::{ChunkingConfig, OptimizerConfig};
use crate::types::DocumentChunk;

pub struct ChunkOptimizer {
    passes: OptimizerConfig,
    max_chunk_size: usize,
    overlap_size: usize,
}

impl ChunkOptimizer {
    pub fn new(passes: OptimizerConfig, chunking: &ChunkingConfig) -> Self {
        Self {
            passes,
            max_chunk_size: chunking.max_chunk_size,
            overlap_size: chunking.overlap_size,
        }
    }

    /// Run the enabled passes in order over the full chunk set
    pub fn optimize(&self, mut chunks: Vec<DocumentChunk>) -> Vec<DocumentChunk> {
        let initial = chunks.len();

        if self.passes.deduplicate {
            chunks = dedup::deduplicate(chunks);
            tracing::debug!("Dedup pass: {} -> {} chunks", initial, chunks.len());
        }

        if self.passes.split_oversized {
            let before = chunks.len();
            chunks = split::split_oversized(chunks, self.max_chunk_size, self.overlap_size);
            tracing::debug!("Split pass: {} -> {} chunks", before, chunks.len());
        }

        if self.passes.merge_related {
            let before = chunks.len();
            chunks = merge::merge_related(chunks, self.max_chunk_size);
            tracing::debug!("Merge pass: {} -> {} chunks", before, chunks.len());
        }

        if self.passes.score_quality {
            quality::score_quality(&mut chunks);
        }

        if self.passes.priority_sort {
            priority_sort(&mut chunks);
        }

        tracing::info!("Optimized corpus: {} -> {} chunks", initial, chunks.len());
        chunks
    }
}

/// Stable sort by importance rank descending, quality score descending
fn priority_sort(chunks: &mut [DocumentChunk]) {
    chunks.sort_by(|a, b| {
        b.metadata
            .importance
            .cmp(&a.metadata.importance)
            .then_with(|| {
                let qa = quality::quality_of(a).unwrap_or(0.0);
                let qb = quality::quality_of(b).unwrap_or(0.0);
                qb.partial_cmp(&qa).unwrap_or(std::cmp::Ordering::Equal)
            })
    });
}
