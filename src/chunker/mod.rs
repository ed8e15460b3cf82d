//! Chunk construction: pluggable strategies turn [`ParsedContent`] items
//! into one or more [`DocumentChunk`]s.
//!
//! Strategies are polymorphic over `{name, should_split, split}` and
//! register by name; adding a strategy never requires modifying the
//! builder itself.

pub mod strategies;
mod validate;

pub use validate::{ValidationWarning, WarningKind, validate_chunks};

use crate::error::ChunkError;
use crate::types::{ChunkMetadata, ChunkType, DocumentChunk, ParsedContent};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Capability set every chunking strategy implements
pub trait ChunkingStrategy: Send + Sync {
    /// Registry name, e.g. "method-level"
    fn name(&self) -> &'static str;

    /// Whether this item should be split into multiple chunks
    fn should_split(&self, item: &ParsedContent) -> bool;

    /// Produce the split chunks for an item where `should_split` was true
    fn split(&self, item: &ParsedContent) -> Vec<DocumentChunk>;
}

/// Applies a named strategy across a parsed corpus
pub struct ChunkBuilder {
    strategies: HashMap<&'static str, Arc<dyn ChunkingStrategy>>,
}

impl ChunkBuilder {
    /// Builder with the four built-in strategies registered
    pub fn new() -> Self {
        let mut builder = Self {
            strategies: HashMap::new(),
        };
        let method_level = Arc::new(strategies::MethodLevelStrategy);
        let context_aware = Arc::new(strategies::ContextAwareStrategy);
        let hierarchical = Arc::new(strategies::HierarchicalStrategy);
        let hybrid = Arc::new(strategies::HybridStrategy::new(
            method_level.clone(),
            context_aware.clone(),
            hierarchical.clone(),
        ));

        builder.register(method_level);
        builder.register(context_aware);
        builder.register(hierarchical);
        builder.register(hybrid);
        builder
    }

    /// Register a strategy under its own name
    pub fn register(&mut self, strategy: Arc<dyn ChunkingStrategy>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn strategy(&self, name: &str) -> Result<Arc<dyn ChunkingStrategy>, ChunkError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| ChunkError::UnknownStrategy(name.to_string()))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.strategies.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Build chunks for the whole corpus with the named strategy
    pub fn build(
        &self,
        items: &[ParsedContent],
        strategy_name: &str,
    ) -> Result<Vec<DocumentChunk>, ChunkError> {
        let strategy = self.strategy(strategy_name)?;
        let mut chunks = Vec::with_capacity(items.len());

        for item in items {
            if strategy.should_split(item) {
                chunks.extend(strategy.split(item));
            } else {
                chunks.push(build_single_chunk(item));
            }
        }

        tracing::info!(
            "Built {} chunks from {} items with '{}' strategy",
            chunks.len(),
            items.len(),
            strategy_name
        );

        if chunks.is_empty() && !items.is_empty() {
            return Err(ChunkError::NoChunksProduced(items.len()));
        }
        Ok(chunks)
    }
}

impl Default for ChunkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic chunk id: `type:namespace:name`, lowercased.
///
/// Ids must be stable across reprocessing runs so the tracker can
/// reconcile snapshots; everything identity-relevant is in the slug.
pub fn derive_chunk_id(item: &ParsedContent) -> String {
    format!(
        "{}:{}:{}",
        item.content_type.as_str(),
        slug(&item.metadata.namespace),
        slug(&item.name)
    )
}

pub fn slug(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Flatten an item into the fixed-order rendering: heading, prose,
/// `## Examples`, `## Parameters`, `## Returns`.
///
/// Downstream quality scoring keys off these section markers; the order
/// is part of the contract, not a presentation choice.
pub fn render_content(item: &ParsedContent) -> String {
    let mut out = String::new();

    out.push_str("# ");
    out.push_str(&item.name);
    out.push('\n');

    if !item.description.trim().is_empty() {
        out.push('\n');
        out.push_str(item.description.trim());
        out.push('\n');
    }

    if !item.content.trim().is_empty() {
        out.push('\n');
        out.push_str(item.content.trim());
        out.push('\n');
    }

    if !item.examples.is_empty() {
        out.push_str("\n## Examples\n");
        for example in &item.examples {
            out.push_str("\n```\n");
            out.push_str(example.trim());
            out.push_str("\n```\n");
        }
    }

    if !item.parameters.is_empty() {
        out.push_str("\n## Parameters\n\n");
        for param in &item.parameters {
            match &param.param_type {
                Some(t) => out.push_str(&format!(
                    "- `{}` ({}): {}\n",
                    param.name, t, param.description
                )),
                None => out.push_str(&format!("- `{}`: {}\n", param.name, param.description)),
            }
        }
    }

    if let Some(returns) = &item.returns {
        if !returns.trim().is_empty() {
            out.push_str("\n## Returns\n\n");
            out.push_str(returns.trim());
            out.push('\n');
        }
    }

    out
}

/// Chunk metadata derived from an item's source metadata
pub fn base_metadata(item: &ParsedContent) -> ChunkMetadata {
    let method_name = match item.content_type {
        ChunkType::Method => Some(
            item.name
                .rsplit('.')
                .next()
                .unwrap_or(&item.name)
                .to_string(),
        ),
        _ => None,
    };

    ChunkMetadata {
        chunk_type: item.content_type,
        namespace: item.metadata.namespace.clone(),
        class_name: item.metadata.class_name.clone(),
        method_name,
        importance: item.metadata.importance,
        tags: item.metadata.tags.iter().cloned().collect::<BTreeSet<_>>(),
        source_file: item.metadata.source_file.clone(),
        line_number: item.metadata.line_number,
        related_methods: Vec::new(),
        dependencies: Vec::new(),
        common_mistakes: Vec::new(),
        use_cases: Vec::new(),
    }
}

/// The no-split path: one chunk per item
pub fn build_single_chunk(item: &ParsedContent) -> DocumentChunk {
    DocumentChunk {
        id: derive_chunk_id(item),
        content: render_content(item),
        metadata: base_metadata(item),
        embedding: None,
    }
}
