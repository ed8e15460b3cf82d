//! Content parsing: structured spec payloads and prose documents into
//! normalized [`ParsedContent`] sequences.
//!
//! A parse failure is fatal for the offending document only; the corpus
//! walk skips it, records the error, and keeps going.

mod markdown;
mod spec_json;

use crate::error::ParseError;
use crate::types::ParsedContent;
use std::path::Path;
use walkdir::WalkDir;

/// Everything a corpus walk produced: parsed items plus per-document errors
#[derive(Debug, Default)]
pub struct ParsedCorpus {
    pub items: Vec<ParsedContent>,
    pub errors: Vec<ParseError>,
}

/// Turns raw specification/documentation inputs into [`ParsedContent`]
#[derive(Debug, Default)]
pub struct ContentParser;

impl ContentParser {
    pub fn new() -> Self {
        Self
    }

    /// Walk a directory tree and parse every supported document.
    ///
    /// Supported inputs: `.json` specification trees and `.md`/`.markdown`
    /// prose documents with front matter.
    pub fn parse_dir(&self, root: &Path) -> ParsedCorpus {
        let mut corpus = ParsedCorpus::default();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !matches!(ext, "json" | "md" | "markdown") {
                continue;
            }

            match self.parse_file(path, &relative) {
                Ok(items) => {
                    tracing::debug!("Parsed {} items from {}", items.len(), relative);
                    corpus.items.extend(items);
                }
                Err(e) => {
                    tracing::warn!("Skipping document {}: {}", relative, e);
                    corpus.errors.push(e);
                }
            }
        }

        tracing::info!(
            "Parsed {} items from corpus ({} documents skipped)",
            corpus.items.len(),
            corpus.errors.len()
        );
        corpus
    }

    /// Parse a single document, dispatching on extension
    pub fn parse_file(
        &self,
        path: &Path,
        source_file: &str,
    ) -> Result<Vec<ParsedContent>, ParseError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ParseError::MalformedJson {
            file: source_file.to_string(),
            reason: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => spec_json::parse_spec_json(&raw, source_file),
            Some("md") | Some("markdown") => markdown::parse_markdown(&raw, source_file),
            other => Err(ParseError::UnsupportedFormat(format!(
                "{} ({:?})",
                source_file, other
            ))),
        }
    }

    /// Parse an in-memory JSON specification payload
    pub fn parse_spec_json(
        &self,
        raw: &str,
        source_file: &str,
    ) -> Result<Vec<ParsedContent>, ParseError> {
        spec_json::parse_spec_json(raw, source_file)
    }

    /// Parse an in-memory markdown document with optional front matter
    pub fn parse_markdown(
        &self,
        raw: &str,
        source_file: &str,
    ) -> Result<Vec<ParsedContent>, ParseError> {
        markdown::parse_markdown(raw, source_file)
    }
}
