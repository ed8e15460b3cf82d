//! Quality-scoring pass.
//!
//! Four sub-scores in [0,1] (completeness, specificity, usefulness,
//! clarity) averaged into an overall score and recorded as a
//! `quality:<score>` tag rather than a separate field, so persistence
//! stays schema-free.

use crate::types::{ChunkType, DocumentChunk, Importance};

const QUALITY_TAG_PREFIX: &str = "quality:";

/// Ideal rendered length band for readable chunks
const IDEAL_MIN: usize = 200;
const IDEAL_MAX: usize = 2000;

pub fn score_quality(chunks: &mut [DocumentChunk]) {
    for chunk in chunks.iter_mut() {
        let score = overall_score(chunk);
        chunk
            .metadata
            .tags
            .retain(|t| !t.starts_with(QUALITY_TAG_PREFIX));
        chunk.metadata.tags.insert(quality_tag(score));
    }
}

/// Arithmetic mean of the four sub-scores; always in [0,1]
pub fn overall_score(chunk: &DocumentChunk) -> f64 {
    let sum = completeness(chunk) + specificity(chunk) + usefulness(chunk) + clarity(chunk);
    (sum / 4.0).clamp(0.0, 1.0)
}

pub fn quality_tag(score: f64) -> String {
    format!("{}{:.2}", QUALITY_TAG_PREFIX, score)
}

/// Parse a chunk's recorded quality score back out of its tags
pub fn quality_of(chunk: &DocumentChunk) -> Option<f64> {
    chunk
        .metadata
        .tags
        .iter()
        .find_map(|t| t.strip_prefix(QUALITY_TAG_PREFIX))
        .and_then(|s| s.parse().ok())
}

/// Structural completeness: fenced code, headers, parameter/return
/// sections, troubleshooting coverage
fn completeness(chunk: &DocumentChunk) -> f64 {
    let content = &chunk.content;
    let mut score: f64 = 0.0;

    if content.contains("```") {
        score += 0.25;
    }
    if header_count(content) > 0 {
        score += 0.25;
    }
    if content.contains("## Parameters") || content.contains("## Returns") {
        score += 0.25;
    }
    if chunk.metadata.chunk_type == ChunkType::Troubleshooting
        || content.to_lowercase().contains("troubleshooting")
    {
        score += 0.25;
    }

    score.clamp(0.0, 1.0)
}

/// How concrete the chunk is: method docs, worked examples, recorded
/// use cases, enough sentences to say something
fn specificity(chunk: &DocumentChunk) -> f64 {
    let mut score = 0.0;

    if chunk.metadata.chunk_type == ChunkType::Method {
        score += 0.3;
    }
    if chunk.content.contains("## Examples") || chunk.content.contains("```") {
        score += 0.3;
    }
    score += (chunk.metadata.use_cases.len() as f64 * 0.1).min(0.2);
    if sentence_count(&chunk.content) >= 3 {
        score += 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// How much a reader gains: importance weighting, async/error coverage,
/// recorded common mistakes
fn usefulness(chunk: &DocumentChunk) -> f64 {
    let mut score: f64 = match chunk.metadata.importance {
        Importance::Critical => 0.4,
        Importance::High => 0.3,
        Importance::Medium => 0.2,
        Importance::Low => 0.1,
    };

    let lowered = chunk.content.to_lowercase();
    if ["async", "await", "error", "failure", "exception"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        score += 0.3;
    }
    if !chunk.metadata.common_mistakes.is_empty() {
        score += 0.3;
    }

    score.clamp(0.0, 1.0)
}

/// Readability: header density, ideal length band, explanatory phrasing
fn clarity(chunk: &DocumentChunk) -> f64 {
    let content = &chunk.content;
    let mut score = 0.0;

    score += (header_count(content) as f64 * 0.1).min(0.3);

    if (IDEAL_MIN..=IDEAL_MAX).contains(&content.len()) {
        score += 0.4;
    }

    let lowered = content.to_lowercase();
    if ["for example", "note that", "this means", "you can"]
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        score += 0.3;
    }

    score.clamp(0.0, 1.0)
}

fn header_count(content: &str) -> usize {
    content
        .lines()
        .filter(|line| line.starts_with('#'))
        .count()
}

fn sentence_count(content: &str) -> usize {
    content
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::tests::test_chunk;
    use crate::types::Importance;

    #[test]
    fn test_score_in_unit_interval_for_edge_cases() {
        let cases = [
            test_chunk("empty", "", Importance::Low),
            test_chunk("tiny", "x", Importance::Critical),
            test_chunk("huge", &"a".repeat(50_000), Importance::High),
            test_chunk("odd", "## \n```\n```\n...???!!!", Importance::Medium),
        ];
        for chunk in &cases {
            let score = overall_score(chunk);
            assert!(
                (0.0..=1.0).contains(&score),
                "score {} out of range for {}",
                score,
                chunk.id
            );
        }
    }

    #[test]
    fn test_rich_chunk_outscores_bare_chunk() {
        let rich_body = format!(
            "# Endpoint.connect\n\nConnect to the backend. Note that the call is async. \
             For example, you can retry on error.\n\n## Examples\n\n```\nconnect(url)\n```\n\n\
             ## Parameters\n\n- `url`: bridge URL\n\n## Returns\n\nA connected endpoint.\n{}",
            "Additional prose about the connection lifecycle. ".repeat(3)
        );
        let mut rich = test_chunk("rich", &rich_body, Importance::Critical);
        rich.metadata.common_mistakes = vec!["forgot to await".to_string()];
        rich.metadata.use_cases = vec!["bootstrap".to_string(), "reconnect".to_string()];

        let bare = test_chunk("bare", "short text", Importance::Low);

        assert!(overall_score(&rich) > overall_score(&bare));
        assert!(overall_score(&rich) > 0.7);
        assert!(overall_score(&bare) < 0.3);
    }

    #[test]
    fn test_quality_tag_roundtrip() {
        let mut chunks = vec![test_chunk("a", "Some body of text here.", Importance::Medium)];
        score_quality(&mut chunks);

        let recorded = quality_of(&chunks[0]).expect("quality tag recorded");
        assert!((0.0..=1.0).contains(&recorded));

        // Re-scoring replaces the tag instead of stacking a second one
        score_quality(&mut chunks);
        let tags: Vec<_> = chunks[0]
            .metadata
            .tags
            .iter()
            .filter(|t| t.starts_with("quality:"))
            .collect();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_importance_feeds_usefulness() {
        let critical = test_chunk("a", "Same body.", Importance::Critical);
        let low = test_chunk("b", "Same body.", Importance::Low);
        assert!(usefulness(&critical) > usefulness(&low));
    }

    #[test]
    fn test_ideal_length_band_feeds_clarity() {
        let in_band = test_chunk("a", &"prose ".repeat(60), Importance::Medium);
        let too_short = test_chunk("b", "prose", Importance::Medium);
        assert!(clarity(&in_band) > clarity(&too_short));
    }
}
