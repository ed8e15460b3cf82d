//! Built-in chunking strategies.
//!
//! Four interchangeable strategies cover the corpus shapes we see in
//! practice: flat method references, classes with many inline sections,
//! deep guide trees, and mixed corpora.

use super::{ChunkingStrategy, base_metadata, build_single_chunk, derive_chunk_id, slug};
use crate::types::{ChunkType, DocumentChunk, ParsedContent};
use std::sync::Arc;

/// One chunk per method/class. The baseline strategy: never splits.
pub struct MethodLevelStrategy;

impl ChunkingStrategy for MethodLevelStrategy {
    fn name(&self) -> &'static str {
        "method-level"
    }

    fn should_split(&self, _item: &ParsedContent) -> bool {
        false
    }

    fn split(&self, item: &ParsedContent) -> Vec<DocumentChunk> {
        vec![build_single_chunk(item)]
    }
}

/// Groups by shared namespace/class: class items with several inline
/// `###` member sections become one chunk per member, each carrying the
/// owning class and namespace as context.
pub struct ContextAwareStrategy;

impl ChunkingStrategy for ContextAwareStrategy {
    fn name(&self) -> &'static str {
        "context-aware"
    }

    fn should_split(&self, item: &ParsedContent) -> bool {
        item.content_type == ChunkType::Class && sections_at(&item.content, "### ").len() >= 2
    }

    fn split(&self, item: &ParsedContent) -> Vec<DocumentChunk> {
        let sections = sections_at(&item.content, "### ");
        if sections.len() < 2 {
            return vec![build_single_chunk(item)];
        }

        let context = format!(
            "Part of `{}` in the `{}` namespace.",
            item.name, item.metadata.namespace
        );

        sections
            .into_iter()
            .map(|(heading, text)| {
                let content = format!(
                    "# {}: {}\n\n{}\n\n{}\n",
                    item.name,
                    heading,
                    context,
                    text.trim()
                );
                DocumentChunk {
                    id: format!("{}:{}", derive_chunk_id(item), slug(&heading)),
                    content,
                    metadata: base_metadata(item),
                    embedding: None,
                }
            })
            .collect()
    }
}

/// Groups by documentation tree depth: guide items split at the
/// shallowest heading level their body contains.
pub struct HierarchicalStrategy;

impl HierarchicalStrategy {
    fn split_marker(item: &ParsedContent) -> Option<&'static str> {
        for marker in ["## ", "### "] {
            if sections_at(&item.content, marker).len() >= 2 {
                return Some(marker);
            }
        }
        None
    }
}

impl ChunkingStrategy for HierarchicalStrategy {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn should_split(&self, item: &ParsedContent) -> bool {
        matches!(
            item.content_type,
            ChunkType::Tutorial | ChunkType::Troubleshooting
        ) && Self::split_marker(item).is_some()
    }

    fn split(&self, item: &ParsedContent) -> Vec<DocumentChunk> {
        let Some(marker) = Self::split_marker(item) else {
            return vec![build_single_chunk(item)];
        };

        sections_at(&item.content, marker)
            .into_iter()
            .map(|(heading, text)| {
                let content = format!("# {} / {}\n\n{}\n", item.name, heading, text.trim());
                DocumentChunk {
                    id: format!("{}:{}", derive_chunk_id(item), slug(&heading)),
                    content,
                    metadata: base_metadata(item),
                    embedding: None,
                }
            })
            .collect()
    }
}

/// Delegates per item type to the most specific applicable strategy:
/// classes go context-aware, guides go hierarchical, everything else
/// stays method-level.
pub struct HybridStrategy {
    method_level: Arc<MethodLevelStrategy>,
    context_aware: Arc<ContextAwareStrategy>,
    hierarchical: Arc<HierarchicalStrategy>,
}

impl HybridStrategy {
    pub fn new(
        method_level: Arc<MethodLevelStrategy>,
        context_aware: Arc<ContextAwareStrategy>,
        hierarchical: Arc<HierarchicalStrategy>,
    ) -> Self {
        Self {
            method_level,
            context_aware,
            hierarchical,
        }
    }

    fn delegate(&self, item: &ParsedContent) -> &dyn ChunkingStrategy {
        match item.content_type {
            ChunkType::Class => &*self.context_aware,
            ChunkType::Tutorial | ChunkType::Troubleshooting => &*self.hierarchical,
            ChunkType::Method | ChunkType::Example => &*self.method_level,
        }
    }
}

impl ChunkingStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn should_split(&self, item: &ParsedContent) -> bool {
        self.delegate(item).should_split(item)
    }

    fn split(&self, item: &ParsedContent) -> Vec<DocumentChunk> {
        self.delegate(item).split(item)
    }
}

/// Collect `(heading, body)` pairs for every heading line starting with
/// `marker`. The body runs until the next same-level heading.
fn sections_at(content: &str, marker: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix(marker) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some((heading.trim().to_string(), String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }
    sections
}
