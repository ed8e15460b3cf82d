//! Lexical search over the optimized chunk corpus, independent of the
//! embedding path.
//!
//! Two interchangeable backends, selected by configuration: a Tantivy
//! BM25 index held in RAM, or a keyword-overlap postings fallback. Both
//! speak the same build/search surface. Language filtering is soft: a
//! chunk with no recorded language always passes, and a handful of
//! ecosystem pairs (TypeScript/JavaScript, Java/Kotlin, C#/.NET) count
//! as compatible. That pairing is a deliberate design decision carried
//! over intact, not incidental behavior.

mod bm25;
mod keyword;

use crate::config::LexicalConfig;
use crate::types::{ChunkType, DocumentChunk};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const SNIPPET_LEN: usize = 160;

/// Overfetch factor so the soft language filter has room to drop hits
const OVERFETCH: usize = 3;

pub const RRF_K_CONSTANT: f32 = 60.0;

#[derive(Debug, Clone)]
pub struct LexicalSearchResult {
    pub chunk_id: String,
    pub namespace: String,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct LexicalStats {
    pub namespaces: usize,
    pub documents: usize,
    pub methods: usize,
    pub classes: usize,
    pub by_type: Vec<(String, usize)>,
}

struct DocEntry {
    chunk_id: String,
    namespace: String,
    chunk_type: ChunkType,
    class_name: Option<String>,
    method_name: Option<String>,
    language: Option<String>,
    snippet: String,
}

enum Backend {
    Bm25(bm25::Bm25Index),
    Keyword(keyword::KeywordIndex),
}

pub struct LexicalSearchEngine {
    backend: Backend,
    docs: Vec<DocEntry>,
    namespaces: BTreeSet<String>,
    result_limit: usize,
    built: bool,
}

impl LexicalSearchEngine {
    pub fn new(config: &LexicalConfig) -> Result<Self> {
        let backend = match config.backend.as_str() {
            "keyword" => Backend::Keyword(keyword::KeywordIndex::new()),
            _ => Backend::Bm25(bm25::Bm25Index::new()?),
        };

        Ok(Self {
            backend,
            docs: Vec::new(),
            namespaces: BTreeSet::new(),
            result_limit: config.result_limit,
            built: false,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Bm25(_) => "bm25",
            Backend::Keyword(_) => "keyword",
        }
    }

    /// Queue a namespace's chunks for indexing. Search is unavailable
    /// until the next [`build_indices`].
    pub fn add_namespace(&mut self, namespace: &str, chunks: &[DocumentChunk]) -> Result<()> {
        self.namespaces.insert(namespace.to_string());
        self.built = false;

        let mut queued = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let ord = self.docs.len() as u64;
            self.docs.push(DocEntry {
                chunk_id: chunk.id.clone(),
                namespace: chunk.metadata.namespace.clone(),
                chunk_type: chunk.metadata.chunk_type,
                class_name: chunk.metadata.class_name.clone(),
                method_name: chunk.metadata.method_name.clone(),
                language: chunk_language(chunk),
                snippet: snippet_of(&chunk.content),
            });
            queued.push((ord, chunk.content.clone()));
        }

        match &mut self.backend {
            Backend::Bm25(index) => index.add_documents(&queued)?,
            Backend::Keyword(index) => {
                for (ord, content) in &queued {
                    index.add_document(*ord as usize, content);
                }
            }
        }

        tracing::debug!(
            "Queued {} chunks from namespace '{}' for lexical indexing",
            chunks.len(),
            namespace
        );
        Ok(())
    }

    /// Consolidate queued documents into the searchable index
    pub fn build_indices(&mut self) -> Result<()> {
        let indexed = match &mut self.backend {
            Backend::Bm25(index) => {
                index.commit()?;
                index.num_docs() as usize
            }
            Backend::Keyword(index) => index.num_docs(),
        };
        self.built = true;
        tracing::info!(
            "Lexical index built: {} documents across {} namespaces ({})",
            indexed,
            self.namespaces.len(),
            self.backend_name()
        );
        Ok(())
    }

    /// Drop everything; used before a full reindex
    pub fn clear(&mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Bm25(index) => index.clear()?,
            Backend::Keyword(index) => index.clear(),
        }
        self.docs.clear();
        self.namespaces.clear();
        self.built = false;
        Ok(())
    }

    /// Ranked search, at most `result_limit` hits, best first
    pub fn search(
        &self,
        query: &str,
        language_filter: Option<&str>,
    ) -> Result<Vec<LexicalSearchResult>> {
        if !self.built {
            bail!("Lexical indices not built; call build_indices first");
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let fetch = self.result_limit * OVERFETCH;
        let hits: Vec<(usize, f32)> = match &self.backend {
            Backend::Bm25(index) => index
                .search(query, fetch)?
                .into_iter()
                .map(|(ord, score)| (ord as usize, score))
                .collect(),
            Backend::Keyword(index) => index.search(query, fetch),
        };

        let results = hits
            .into_iter()
            .filter_map(|(ord, score)| {
                let entry = self.docs.get(ord)?;
                if let Some(wanted) = language_filter {
                    if let Some(lang) = &entry.language {
                        if !languages_compatible(wanted, lang) {
                            return None;
                        }
                    }
                }
                Some(LexicalSearchResult {
                    chunk_id: entry.chunk_id.clone(),
                    namespace: entry.namespace.clone(),
                    score,
                    snippet: entry.snippet.clone(),
                })
            })
            .take(self.result_limit)
            .collect();

        Ok(results)
    }

    pub fn get_stats(&self) -> LexicalStats {
        let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut classes: BTreeSet<&str> = BTreeSet::new();
        let mut methods = 0usize;

        for doc in &self.docs {
            *by_type.entry(doc.chunk_type.as_str()).or_insert(0) += 1;
            if doc.method_name.is_some() {
                methods += 1;
            }
            if let Some(class) = &doc.class_name {
                classes.insert(class);
            }
        }

        LexicalStats {
            namespaces: self.namespaces.len(),
            documents: self.docs.len(),
            methods,
            classes: classes.len(),
            by_type: by_type
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

/// Soft language relation: identical languages always match, and a few
/// ecosystem pairs are treated as interchangeable.
pub fn languages_compatible(a: &str, b: &str) -> bool {
    let a = normalize_language(a);
    let b = normalize_language(b);
    if a == b {
        return true;
    }
    matches!(
        (a.as_str(), b.as_str()),
        ("typescript", "javascript")
            | ("javascript", "typescript")
            | ("java", "kotlin")
            | ("kotlin", "java")
            | ("csharp", "dotnet")
            | ("dotnet", "csharp")
    )
}

fn normalize_language(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "ts" => "typescript".to_string(),
        "js" => "javascript".to_string(),
        "c#" | "cs" => "csharp".to_string(),
        ".net" => "dotnet".to_string(),
        other => other.to_string(),
    }
}

/// A chunk's language comes from a `lang:<name>` metadata tag
fn chunk_language(chunk: &DocumentChunk) -> Option<String> {
    chunk
        .metadata
        .tags
        .iter()
        .find_map(|t| t.strip_prefix("lang:"))
        .map(String::from)
}

fn snippet_of(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let trimmed = flat.trim();
    let mut end = SNIPPET_LEN.min(trimmed.len());
    while end < trimmed.len() && !trimmed.is_char_boundary(end) {
        end += 1;
    }
    trimmed[..end].to_string()
}

/// Reciprocal rank fusion over arbitrary ranked lists; used to combine
/// lexical and vector hits into one ordering
pub fn reciprocal_rank_fusion<T, I, L>(ranked_lists: I, limit: usize) -> Vec<(T, f32)>
where
    T: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = (T, f32)>,
{
    let mut score_map: HashMap<T, f32> = HashMap::new();

    for list in ranked_lists {
        for (rank, (id, _score)) in list.into_iter().enumerate() {
            let rrf_score = 1.0 / (RRF_K_CONSTANT + (rank + 1) as f32);
            *score_map.entry(id).or_insert(0.0) += rrf_score;
        }
    }

    let mut combined: Vec<(T, f32)> = score_map.into_iter().collect();
    combined.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    combined.truncate(limit);
    combined
}
