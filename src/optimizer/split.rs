//! Oversized-chunk splitting pass.
//!
//! Splits at logical boundaries, most-preferred first: markdown heading
//! lines, blank-line paragraph breaks, then sentence or newline breaks
//! when a single paragraph still exceeds the limit. A lone run of text
//! longer than the limit is hard-split at character boundaries rather
//! than left oversized. Every piece after the first is prefixed with an
//! overlap tail from the end of the previous piece so context survives
//! the cut.
//!
//! Blocks keep their original separators attached, so concatenating the
//! un-prefixed pieces reproduces the parent content byte for byte.

use crate::types::DocumentChunk;

pub fn split_oversized(
    chunks: Vec<DocumentChunk>,
    max_chunk_size: usize,
    overlap_size: usize,
) -> Vec<DocumentChunk> {
    let mut out = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.content.len() <= max_chunk_size {
            out.push(chunk);
            continue;
        }

        tracing::debug!(
            "Splitting oversized chunk {} ({} chars, max {})",
            chunk.id,
            chunk.content.len(),
            max_chunk_size
        );
        out.extend(split_chunk(chunk, max_chunk_size, overlap_size));
    }

    out
}

fn split_chunk(
    parent: DocumentChunk,
    max_chunk_size: usize,
    overlap_size: usize,
) -> Vec<DocumentChunk> {
    // Reserve room for the overlap prefix and its joining newlines so
    // every final piece stays within max_chunk_size.
    let (budget, overlap) = if overlap_size + 2 < max_chunk_size {
        (max_chunk_size - overlap_size - 2, overlap_size)
    } else {
        (max_chunk_size, 0)
    };

    let blocks = explode(&parent.content, budget);
    let pieces = pack(blocks, budget);

    if pieces.len() <= 1 {
        return vec![parent];
    }

    let mut result = Vec::with_capacity(pieces.len());
    let mut previous: Option<String> = None;

    for (idx, piece) in pieces.into_iter().enumerate() {
        let part = idx + 1;
        let content = match &previous {
            Some(prev) if overlap > 0 => {
                let tail = overlap_tail(prev, overlap);
                if tail.is_empty() {
                    piece.trim_end().to_string()
                } else {
                    format!("{}\n\n{}", tail.trim_end(), piece.trim_end())
                }
            }
            _ => piece.trim_end().to_string(),
        };
        previous = Some(piece);

        let mut metadata = parent.metadata.clone();
        metadata.tags.insert("sub-chunk".to_string());
        metadata.tags.insert(format!("part-{}", part));

        result.push(DocumentChunk {
            id: format!("{}:part-{}", parent.id, part),
            content,
            metadata,
            embedding: None,
        });
    }

    result
}

/// Break content into blocks no longer than `budget`, preferring heading
/// boundaries, then paragraphs, then sentences/newlines, then a hard
/// character split. Blocks retain their trailing separators.
fn explode(content: &str, budget: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    for segment in heading_segments(content) {
        if segment.len() <= budget {
            blocks.push(segment);
            continue;
        }
        for paragraph in segment.split_inclusive("\n\n") {
            if paragraph.len() <= budget {
                blocks.push(paragraph.to_string());
                continue;
            }
            blocks.extend(sentence_blocks(paragraph, budget));
        }
    }
    blocks.retain(|b| !b.trim().is_empty());
    blocks
}

/// Segments bounded by markdown heading lines
fn heading_segments(content: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in content.split_inclusive('\n') {
        if line.starts_with('#') && !current.trim().is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn sentence_blocks(paragraph: &str, budget: usize) -> Vec<String> {
    let mut blocks = Vec::new();
    for sentence in split_sentences(paragraph) {
        if sentence.len() <= budget {
            blocks.push(sentence);
            continue;
        }
        for line in sentence.split_inclusive('\n') {
            if line.len() <= budget {
                blocks.push(line.to_string());
            } else {
                blocks.extend(hard_split(line, budget));
            }
        }
    }
    blocks
}

/// Split on ". ", keeping the delimiter attached to the preceding sentence
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut rest = text;

    while let Some(pos) = rest.find(". ") {
        let (sentence, remainder) = rest.split_at(pos + 2);
        sentences.push(sentence.to_string());
        rest = remainder;
    }
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Last resort: character-boundary-safe fixed-width split
fn hard_split(text: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::with_capacity(budget);

    for c in text.chars() {
        if current.len() + c.len_utf8() > budget {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedily pack blocks into pieces no longer than `budget`
fn pack(blocks: Vec<String>, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for block in blocks {
        if !buf.is_empty() && buf.len() + block.len() > budget {
            pieces.push(std::mem::take(&mut buf));
        }
        buf.push_str(&block);
    }
    if !buf.trim().is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// The trailing `overlap` characters of `prev`, trimmed back to the
/// nearest sentence start when one falls inside the window
fn overlap_tail(prev: &str, overlap: usize) -> String {
    let trimmed = prev.trim_end();
    let mut start = trimmed.len().saturating_sub(overlap);
    while start < trimmed.len() && !trimmed.is_char_boundary(start) {
        start += 1;
    }

    let mut tail = &trimmed[start..];
    if let Some(pos) = tail.find(". ") {
        tail = &tail[pos + 2..];
    }
    tail.trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::tests::test_chunk;
    use crate::types::Importance;

    const MAX: usize = 600;
    const OVERLAP: usize = 100;

    fn long_prose(factor: f64) -> String {
        let mut out = String::new();
        let mut n = 0;
        while (out.len() as f64) < factor * MAX as f64 {
            n += 1;
            out.push_str(&format!("This is sentence number {} of the guide. ", n));
        }
        out
    }

    #[test]
    fn test_small_chunks_untouched() {
        let chunk = test_chunk("a", "Short body.", Importance::Medium);
        let out = split_oversized(vec![chunk.clone()], MAX, OVERLAP);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, chunk.content);
        assert!(!out[0].metadata.tags.contains("sub-chunk"));
    }

    #[test]
    fn test_split_bounds_and_overlap() {
        let content = long_prose(2.5);
        let chunk = test_chunk("guide", &content, Importance::Medium);
        let out = split_oversized(vec![chunk], MAX, OVERLAP);

        assert!(out.len() >= 3, "2.5x max should need at least 3 pieces");
        for piece in &out {
            assert!(
                piece.content.len() <= MAX,
                "piece {} has {} chars",
                piece.id,
                piece.content.len()
            );
        }

        // Piece N+1 starts with a tail of piece N (the overlap prefix,
        // which runs up to the first paragraph break)
        for pair in out.windows(2) {
            let prefix = pair[1].content.split("\n\n").next().unwrap();
            assert!(
                !prefix.is_empty() && pair[0].content.contains(prefix),
                "piece {} does not overlap its predecessor",
                pair[1].id
            );
            assert!(prefix.len() <= OVERLAP);
        }
    }

    #[test]
    fn test_split_metadata_and_ids() {
        let content = long_prose(2.2);
        let chunk = test_chunk("guide", &content, Importance::High);
        let out = split_oversized(vec![chunk], MAX, OVERLAP);

        for (i, piece) in out.iter().enumerate() {
            assert_eq!(piece.id, format!("guide:part-{}", i + 1));
            assert!(piece.metadata.tags.contains("sub-chunk"));
            assert!(piece.metadata.tags.contains(&format!("part-{}", i + 1)));
            assert_eq!(piece.metadata.importance, Importance::High);
        }
    }

    #[test]
    fn test_prefers_heading_boundaries() {
        let section = format!("Body text. {}", "More prose here. ".repeat(20));
        let content = format!(
            "## First\n\n{}\n\n## Second\n\n{}\n\n## Third\n\n{}\n",
            section, section, section
        );
        let out = split_oversized(
            vec![test_chunk("doc", &content, Importance::Medium)],
            section.len() + 60,
            0,
        );

        assert!(out.len() >= 3);
        // With zero overlap, every piece after the first starts on a heading
        for piece in &out[1..] {
            assert!(
                piece.content.starts_with("##"),
                "piece starts mid-section: {:?}",
                &piece.content[..40.min(piece.content.len())]
            );
        }
    }

    #[test]
    fn test_oversized_paragraph_hard_split() {
        // One unbroken run with no boundaries at all
        let content = "x".repeat(MAX * 2);
        let out = split_oversized(
            vec![test_chunk("wall", &content, Importance::Medium)],
            MAX,
            OVERLAP,
        );
        assert!(out.len() >= 2);
        assert!(out.iter().all(|c| c.content.len() <= MAX));
    }

    #[test]
    fn test_overlap_tail_trims_to_sentence() {
        let prev = "First sentence here. Second sentence follows. Tail fragment";
        // The 40-char window opens mid-sentence; the partial fragment
        // before the first boundary is dropped
        let tail = overlap_tail(prev, 40);
        assert_eq!(tail, "Second sentence follows. Tail fragment");

        // No sentence boundary inside the window: raw tail survives
        let raw = overlap_tail("abcdefghij", 4);
        assert_eq!(raw, "ghij");
    }
}
