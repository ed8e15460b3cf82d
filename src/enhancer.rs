//! Chunk enhancement: attaches derived context to chunks after building.
//!
//! Enhancement never changes a chunk's id. It fills cross-reference
//! metadata (related methods, dependencies) from what the rest of the
//! corpus says, and copies worked examples into method chunks that lack
//! their own. All derivations are deterministic so reprocessing an
//! unchanged corpus produces byte-identical chunks.

use crate::types::{ChunkType, DocumentChunk};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct ChunkEnhancer;

impl ChunkEnhancer {
    pub fn new() -> Self {
        Self
    }

    /// Enhance every chunk in place using corpus-wide context
    pub fn enhance(&self, chunks: &mut [DocumentChunk]) {
        let siblings = collect_class_members(chunks);
        let class_names = collect_class_names(chunks);
        let examples = collect_examples(chunks);

        for chunk in chunks.iter_mut() {
            self.attach_related_methods(chunk, &siblings);
            self.attach_dependencies(chunk, &class_names);
            self.attach_examples(chunk, &examples);
        }

        tracing::debug!("Enhanced {} chunks with derived context", chunks.len());
    }

    /// Methods of the same class become cross-references
    fn attach_related_methods(
        &self,
        chunk: &mut DocumentChunk,
        siblings: &BTreeMap<(String, String), BTreeSet<String>>,
    ) {
        let Some(class_name) = chunk.metadata.class_name.clone() else {
            return;
        };
        let key = (chunk.metadata.namespace.clone(), class_name);
        let Some(members) = siblings.get(&key) else {
            return;
        };

        let own = chunk.metadata.method_name.as_deref();
        let related: Vec<String> = members
            .iter()
            .filter(|m| Some(m.as_str()) != own)
            .cloned()
            .collect();

        if !related.is_empty() {
            chunk.metadata.related_methods = related;
        }
    }

    /// Mentions of other known classes become dependencies
    fn attach_dependencies(&self, chunk: &mut DocumentChunk, class_names: &BTreeSet<String>) {
        let own = chunk.metadata.class_name.as_deref();
        let deps: Vec<String> = class_names
            .iter()
            .filter(|name| Some(name.as_str()) != own && chunk.content.contains(name.as_str()))
            .cloned()
            .collect();

        if !deps.is_empty() {
            chunk.metadata.dependencies = deps;
        }
    }

    /// Copy a worked example into method chunks that have none of their own
    fn attach_examples(&self, chunk: &mut DocumentChunk, examples: &[(String, String)]) {
        if chunk.metadata.chunk_type != ChunkType::Method {
            return;
        }
        if chunk.content.contains("## Examples") {
            return;
        }
        let Some(method_name) = chunk.metadata.method_name.as_deref() else {
            return;
        };

        let reference = match chunk.metadata.class_name.as_deref() {
            Some(class) => format!("{}.{}", class, method_name),
            None => method_name.to_string(),
        };

        if let Some((_, example)) = examples.iter().find(|(_, body)| body.contains(&reference)) {
            chunk.content.push_str("\n## Examples\n\n```\n");
            chunk.content.push_str(example.trim());
            chunk.content.push_str("\n```\n");
        }
    }
}

fn collect_class_members(
    chunks: &[DocumentChunk],
) -> BTreeMap<(String, String), BTreeSet<String>> {
    let mut members: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for chunk in chunks {
        if let (Some(class), Some(method)) = (
            chunk.metadata.class_name.clone(),
            chunk.metadata.method_name.clone(),
        ) {
            members
                .entry((chunk.metadata.namespace.clone(), class))
                .or_default()
                .insert(method);
        }
    }
    members
}

fn collect_class_names(chunks: &[DocumentChunk]) -> BTreeSet<String> {
    chunks
        .iter()
        .filter_map(|c| c.metadata.class_name.clone())
        .collect()
}

/// (chunk id, example body) for every example-type chunk, in id order
fn collect_examples(chunks: &[DocumentChunk]) -> Vec<(String, String)> {
    let mut examples: Vec<(String, String)> = chunks
        .iter()
        .filter(|c| c.metadata.chunk_type == ChunkType::Example)
        .map(|c| (c.id.clone(), c.content.clone()))
        .collect();
    examples.sort();
    examples
}
