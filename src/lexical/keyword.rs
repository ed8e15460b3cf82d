//! Keyword-overlap fallback backend.
//!
//! A precomputed per-word postings list over lower-cased document text.
//! Queries split into words of three or more characters; a document's
//! score is the fraction of query words it matches. Cruder than BM25 but
//! dependency-light and fully deterministic.

use std::collections::{HashMap, HashSet};

/// Words shorter than this carry too little signal to index
pub const MIN_WORD_LEN: usize = 3;

#[derive(Debug, Default)]
pub struct KeywordIndex {
    postings: HashMap<String, HashSet<usize>>,
    doc_count: usize,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, ord: usize, text: &str) {
        for word in tokenize(text) {
            self.postings.entry(word).or_default().insert(ord);
        }
        self.doc_count = self.doc_count.max(ord + 1);
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_count = 0;
    }

    /// Score = matched query words / total query words, in (0, 1]
    pub fn search(&self, query: &str, limit: usize) -> Vec<(usize, f32)> {
        let query_words: Vec<String> = {
            let mut seen = HashSet::new();
            tokenize(query)
                .into_iter()
                .filter(|w| seen.insert(w.clone()))
                .collect()
        };
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut matched: HashMap<usize, usize> = HashMap::new();
        for word in &query_words {
            if let Some(docs) = self.postings.get(word) {
                for doc in docs {
                    *matched.entry(*doc).or_insert(0) += 1;
                }
            }
        }

        let total = query_words.len() as f32;
        let mut results: Vec<(usize, f32)> = matched
            .into_iter()
            .map(|(doc, count)| (doc, count as f32 / total))
            .collect();

        // score descending, document order as the deterministic tiebreak
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }

    pub fn num_docs(&self) -> usize {
        self.doc_count
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_WORD_LEN)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed() -> KeywordIndex {
        let mut index = KeywordIndex::new();
        index.add_document(0, "Connect to the backend bridge over websocket.");
        index.add_document(1, "Prepare platform resources before connecting.");
        index.add_document(2, "Create a new message thread for users.");
        index
    }

    #[test]
    fn test_fraction_scoring() {
        let index = indexed();
        let results = index.search("connect backend", 10);
        assert_eq!(results[0].0, 0);
        // both words match doc 0
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_words_dropped() {
        let index = indexed();
        // "to" is below the length floor; only "backend" counts
        let results = index.search("to backend", 10);
        assert_eq!(results.len(), 1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_match() {
        let index = indexed();
        assert!(index.search("zeppelin", 10).is_empty());
        assert!(index.search("a of", 10).is_empty());
    }

    #[test]
    fn test_deterministic_tiebreak() {
        let mut index = KeywordIndex::new();
        index.add_document(0, "shared term alpha");
        index.add_document(1, "shared term beta");
        let results = index.search("shared term", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
    }

    #[test]
    fn test_limit_respected() {
        let mut index = KeywordIndex::new();
        for i in 0..30 {
            index.add_document(i, "common keyword everywhere");
        }
        assert_eq!(index.search("common keyword", 10).len(), 10);
    }
}
