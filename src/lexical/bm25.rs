//! BM25 backend over an in-RAM Tantivy index.

use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{INDEXED, STORED, Schema, TEXT, Value as _};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, doc};

pub struct Bm25Index {
    index: Index,
    writer: IndexWriter<TantivyDocument>,
    reader: IndexReader,
    ord_field: tantivy::schema::Field,
    content_field: tantivy::schema::Field,
}

impl Bm25Index {
    pub fn new() -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let ord_field = schema_builder.add_u64_field("ord", STORED | INDEXED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let writer = index
            .writer(50_000_000)
            .context("Failed to create index writer")?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        Ok(Self {
            index,
            writer,
            reader,
            ord_field,
            content_field,
        })
    }

    /// Queue documents; visible to search only after [`commit`]
    pub fn add_documents(&mut self, documents: &[(u64, String)]) -> Result<()> {
        for (ord, content) in documents {
            self.writer
                .add_document(doc!(
                    self.ord_field => *ord,
                    self.content_field => content.as_str(),
                ))
                .context("Failed to add document")?;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit().context("Failed to commit documents")?;
        self.reader.reload().context("Failed to reload reader")?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.writer
            .delete_all_documents()
            .context("Failed to delete all documents")?;
        self.commit()
    }

    /// BM25-scored search returning document ordinals
    pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<(u64, f32)>> {
        let searcher = self.reader.searcher();

        // lenient mode tolerates special characters like :: in queries
        let query_parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let (query, _errors) = query_parser.parse_query_lenient(query_text);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit.max(1)))
            .context("Failed to execute search")?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            if let Some(ord) = retrieved
                .get_first(self.ord_field)
                .and_then(|value| value.as_u64())
            {
                results.push((ord, score));
            }
        }

        Ok(results)
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed() -> Bm25Index {
        let mut index = Bm25Index::new().unwrap();
        index
            .add_documents(&[
                (0, "Connect to the backend bridge over websocket.".to_string()),
                (1, "Prepare platform resources before connecting.".to_string()),
                (2, "Create a new message thread for users.".to_string()),
            ])
            .unwrap();
        index.commit().unwrap();
        index
    }

    #[test]
    fn test_ranked_search() {
        let index = indexed();
        let results = index.search("connect to backend", 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 0, "most specific document ranks first");
        // scores descend
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_no_match() {
        let index = indexed();
        let results = index.search("zeppelin", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_special_characters_tolerated() {
        let index = indexed();
        // ":" is a field separator in strict query syntax
        let results = index.search("Endpoint::connect backend", 10);
        assert!(results.is_ok());
    }

    #[test]
    fn test_clear() {
        let mut index = indexed();
        assert_eq!(index.num_docs(), 3);
        index.clear().unwrap();
        assert_eq!(index.num_docs(), 0);
    }
}
