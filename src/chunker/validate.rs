//! Post-build chunk validation.
//!
//! Violations are collected as warnings, never thrown: an empty chunk is
//! a data problem to report, not a reason to abort the corpus run.

use crate::types::DocumentChunk;

/// Minimum useful chunk length; below this retrieval quality drops off
const UNDERSIZED_THRESHOLD: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    EmptyContent,
    MissingId,
    MissingSourceFile,
    Oversized,
    Undersized,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub chunk_id: String,
    pub kind: WarningKind,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk '{}': {}", self.chunk_id, self.message)
    }
}

/// Check every chunk against the invariants and size expectations.
///
/// Returns warnings in input order; callers report them and carry on.
pub fn validate_chunks(chunks: &[DocumentChunk], max_chunk_size: usize) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for chunk in chunks {
        if chunk.id.trim().is_empty() {
            warnings.push(ValidationWarning {
                chunk_id: "<missing>".to_string(),
                kind: WarningKind::MissingId,
                message: "chunk has no id".to_string(),
            });
        }

        if chunk.content.trim().is_empty() {
            warnings.push(ValidationWarning {
                chunk_id: chunk.id.clone(),
                kind: WarningKind::EmptyContent,
                message: "content is empty".to_string(),
            });
        } else if chunk.content.len() > max_chunk_size {
            warnings.push(ValidationWarning {
                chunk_id: chunk.id.clone(),
                kind: WarningKind::Oversized,
                message: format!(
                    "content length {} exceeds max {}",
                    chunk.content.len(),
                    max_chunk_size
                ),
            });
        } else if chunk.content.trim().len() < UNDERSIZED_THRESHOLD {
            warnings.push(ValidationWarning {
                chunk_id: chunk.id.clone(),
                kind: WarningKind::Undersized,
                message: format!(
                    "content length {} is below {}",
                    chunk.content.trim().len(),
                    UNDERSIZED_THRESHOLD
                ),
            });
        }

        if chunk.metadata.source_file.trim().is_empty() {
            warnings.push(ValidationWarning {
                chunk_id: chunk.id.clone(),
                kind: WarningKind::MissingSourceFile,
                message: "metadata.source_file is not set".to_string(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ChunkType, Importance};
    use std::collections::BTreeSet;

    fn chunk(id: &str, content: &str, source_file: &str) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                chunk_type: ChunkType::Method,
                namespace: "core".to_string(),
                class_name: None,
                method_name: None,
                importance: Importance::Medium,
                tags: BTreeSet::new(),
                source_file: source_file.to_string(),
                line_number: None,
                related_methods: Vec::new(),
                dependencies: Vec::new(),
                common_mistakes: Vec::new(),
                use_cases: Vec::new(),
            },
            embedding: None,
        }
    }

    #[test]
    fn test_clean_chunk_passes() {
        let good = chunk(
            "method:core:x",
            &"A perfectly reasonable chunk body. ".repeat(5),
            "core.json",
        );
        assert!(validate_chunks(&[good], 1500).is_empty());
    }

    #[test]
    fn test_empty_content_flagged() {
        let bad = chunk("method:core:x", "   ", "core.json");
        let warnings = validate_chunks(&[bad], 1500);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::EmptyContent);
    }

    #[test]
    fn test_missing_source_file_flagged() {
        let bad = chunk(
            "method:core:x",
            &"Body text long enough to not be undersized. ".repeat(3),
            "",
        );
        let warnings = validate_chunks(&[bad], 1500);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MissingSourceFile);
    }

    #[test]
    fn test_size_bounds_flagged() {
        let over = chunk("a", &"x".repeat(2000), "f.json");
        let under = chunk("b", "tiny", "f.json");
        let warnings = validate_chunks(&[over, under], 1500);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::Oversized);
        assert_eq!(warnings[1].kind, WarningKind::Undersized);
    }

    #[test]
    fn test_warnings_do_not_block() {
        // validation returns data, callers decide; nothing panics
        let warnings = validate_chunks(&[chunk("", "", "")], 100);
        assert_eq!(warnings.len(), 3);
    }
}
