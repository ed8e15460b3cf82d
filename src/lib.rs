//! # docs-rag - Documentation Knowledge Indexing and Retrieval
//!
//! A documentation knowledge-indexing pipeline: it converts structured
//! API specifications and prose documentation into uniformly-sized,
//! metadata-rich chunks, tracks which chunks have been embedded, stores
//! chunk vectors in a vector database, and supports both lexical and
//! semantic retrieval over the corpus.
//!
//! ## Key Features
//!
//! - **Content-addressed change detection**: a SQLite tracking ledger
//!   keyed by chunk id decides what is new, updated, unchanged, or
//!   removed between indexing runs, so embeddings are only regenerated
//!   when the hashed content actually changed
//! - **Pluggable chunking strategies**: method-level, context-aware,
//!   hierarchical, and hybrid, registered by name
//! - **Corpus optimizer**: deduplication, boundary-aware splitting with
//!   overlap, related-chunk merging, quality scoring, priority ordering
//! - **Semantic search**: FastEmbed local embeddings stored in Qdrant
//! - **Lexical search**: Tantivy BM25 in RAM, or a keyword-overlap
//!   fallback, selected by configuration
//! - **Hybrid retrieval**: reciprocal rank fusion of both paths
//!
//! ## Pipeline
//!
//! ```text
//! Parser -> Chunk Builder -> Enhancer -> Optimizer -> Tracker.sync
//!                                                        |
//!                           pending chunks only          v
//! Vector Store <- Tracker.mark_* <- Embedding Generator -+
//!
//! Lexical Search Engine <- optimized chunk set (independent path)
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use docs_rag::config::Config;
//! use docs_rag::pipeline::DocsRagPipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let pipeline = DocsRagPipeline::init(config).await?;
//!
//!     let report = pipeline
//!         .index_directory(std::path::Path::new("./docs"), &CancellationToken::new())
//!         .await?;
//!     println!("indexed: {}", report.sync);
//!
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Chunk construction with pluggable strategies and validation
pub mod chunker;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed, with batched concurrency
pub mod embedding;

/// Derived cross-references and example attachment
pub mod enhancer;

/// Error types and utilities
pub mod error;

/// Lexical (BM25/keyword) search over the chunk corpus
pub mod lexical;

/// Corpus-wide optimization passes
pub mod optimizer;

/// Specification and prose document parsing
pub mod parser;

/// Dependency-injected pipeline orchestration
pub mod pipeline;

/// Persistent embedding tracking ledger
pub mod tracker;

/// Core domain types shared across the pipeline
pub mod types;

/// Vector store abstraction backed by Qdrant
pub mod vector_db;
