use anyhow::Result;
use clap::{Parser, Subcommand};
use docs_rag::config::Config;
use docs_rag::pipeline::DocsRagPipeline;
use docs_rag::vector_db::SearchFilters;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "docs-rag", about = "Documentation knowledge indexing and retrieval")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a documentation directory
    Index {
        /// Directory containing .json specs and .md documents
        dir: PathBuf,
    },
    /// Semantic search over indexed chunks
    Search {
        query: String,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Lexical search over the last indexed corpus
    Lexical {
        query: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// Hybrid search fusing semantic and lexical rankings
    Hybrid {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show tracking, lexical, and vector store statistics
    Stats,
    /// Reset failed embeddings back to pending for the next run
    RetryFailed,
    /// Hard-delete outdated tracking records
    Cleanup,
    /// Export the full tracking state to a JSON snapshot
    Export { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let pipeline = DocsRagPipeline::init(config).await?;

    // ctrl-c stops issuing embedding batches; in-flight work completes
    let cancel = CancellationToken::new();
    let cancel_handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested");
            cancel_handle.cancel();
        }
    });

    match cli.command {
        Command::Index { dir } => {
            let report = pipeline.index_directory(&dir, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Search {
            query,
            namespace,
            limit,
        } => {
            let filters = SearchFilters {
                namespace,
                ..Default::default()
            };
            let results = pipeline
                .search_semantic(&query, &filters, limit, None)
                .await?;
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    i + 1,
                    result.similarity,
                    result.chunk.id,
                    result.chunk.metadata.source_file
                );
            }
        }
        Command::Lexical { query, language } => {
            let results = pipeline.search_lexical(&query, language.as_deref())?;
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {}\n    {}",
                    i + 1,
                    result.score,
                    result.chunk_id,
                    result.snippet
                );
            }
        }
        Command::Hybrid { query, limit } => {
            let results = pipeline.search_hybrid(&query, limit).await?;
            for (i, result) in results.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, result.score, result.chunk_id);
            }
        }
        Command::Stats => {
            let stats = pipeline.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::RetryFailed => {
            let reset = pipeline.retry_failed().await?;
            println!("Reset {} failed embeddings to pending", reset);
        }
        Command::Cleanup => {
            let deleted = pipeline.cleanup().await?;
            println!("Deleted {} outdated tracking records", deleted);
        }
        Command::Export { path } => {
            pipeline.export(&path).await?;
            println!("Exported tracking snapshot to {}", path.display());
        }
    }

    pipeline.shutdown().await;
    Ok(())
}
