//! Prose document parsing.
//!
//! Markdown documents carry optional `---` front matter (simple
//! `key: value` lines) and are split into one [`ParsedContent`] per
//! second-level heading. Documents without `##` headings become a single
//! item named after the top-level heading or the file itself.

use crate::error::ParseError;
use crate::types::{ChunkType, ContentMetadata, Importance, ParsedContent};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##\s+(.+)$").expect("valid section regex"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid title regex"));

pub fn parse_markdown(raw: &str, source_file: &str) -> Result<Vec<ParsedContent>, ParseError> {
    let (front, body, body_offset) = split_front_matter(raw, source_file)?;

    if body.trim().is_empty() {
        return Err(ParseError::EmptyDocument(source_file.to_string()));
    }

    let namespace = front
        .get("namespace")
        .cloned()
        .unwrap_or_else(|| "docs".to_string());
    let kind = front
        .get("type")
        .and_then(|t| ChunkType::parse(t))
        .unwrap_or(ChunkType::Tutorial);
    let importance = front
        .get("importance")
        .and_then(|i| Importance::parse(i))
        .unwrap_or_default();
    let tags: Vec<String> = front
        .get("tags")
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let title = TITLE_RE
        .captures(body)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| file_stem(source_file));

    let sections = split_sections(body);

    let mut items = Vec::new();
    for section in sections {
        let name = section.heading.clone().unwrap_or_else(|| title.clone());
        let line_number = line_at_offset(raw, body_offset + section.offset);

        items.push(ParsedContent {
            content_type: kind,
            name,
            description: String::new(),
            content: section.text.trim().to_string(),
            examples: Vec::new(),
            parameters: Vec::new(),
            returns: None,
            metadata: ContentMetadata {
                namespace: namespace.clone(),
                source_file: source_file.to_string(),
                importance,
                tags: tags.clone(),
                class_name: None,
                line_number: Some(line_number),
            },
        });
    }

    Ok(items)
}

/// Returns (front matter map, body slice, body byte offset within raw)
fn split_front_matter<'a>(
    raw: &'a str,
    source_file: &str,
) -> Result<(HashMap<String, String>, &'a str, usize), ParseError> {
    let mut front = HashMap::new();

    if !raw.starts_with("---") {
        return Ok((front, raw, 0));
    }

    let after_open = &raw[3..];
    let close = after_open
        .find("\n---")
        .ok_or_else(|| ParseError::UnterminatedFrontMatter(source_file.to_string()))?;

    for line in after_open[..close].lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() {
                front.insert(key.to_string(), value.to_string());
            }
        }
    }

    // Skip past the closing fence and its newline
    let mut body_start = 3 + close + 4;
    if raw[body_start..].starts_with('\n') {
        body_start += 1;
    }

    Ok((front, &raw[body_start..], body_start))
}

struct Section {
    heading: Option<String>,
    text: String,
    /// Byte offset of the section start within the body
    offset: usize,
}

fn split_sections(body: &str) -> Vec<Section> {
    let matches: Vec<_> = SECTION_RE.captures_iter(body).collect();

    if matches.is_empty() {
        return vec![Section {
            heading: None,
            text: body.to_string(),
            offset: 0,
        }];
    }

    let mut sections = Vec::new();
    for (i, cap) in matches.iter().enumerate() {
        let whole = cap.get(0).expect("match always has group 0");
        let start = whole.start();
        let end = matches
            .get(i + 1)
            .map(|next| next.get(0).expect("match always has group 0").start())
            .unwrap_or(body.len());

        sections.push(Section {
            heading: Some(cap[1].trim().to_string()),
            text: body[start..end].to_string(),
            offset: start,
        });
    }

    sections
}

fn line_at_offset(raw: &str, offset: usize) -> u32 {
    let clamped = offset.min(raw.len());
    raw[..clamped].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

fn file_stem(source_file: &str) -> String {
    source_file
        .rsplit('/')
        .next()
        .unwrap_or(source_file)
        .trim_end_matches(".markdown")
        .trim_end_matches(".md")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\nnamespace: guides\ntype: tutorial\nimportance: high\ntags: quickstart, setup\n---\n# Getting Started\n\nWelcome to the platform.\n\n## Installing\n\nRun the installer.\n\n## Connecting\n\nCall connect with your bridge URL.\n";

    #[test]
    fn test_sections_become_items() {
        let items = parse_markdown(SAMPLE, "guides/start.md").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Installing");
        assert_eq!(items[1].name, "Connecting");
        assert!(items[1].content.contains("bridge URL"));
    }

    #[test]
    fn test_front_matter_applied() {
        let items = parse_markdown(SAMPLE, "guides/start.md").unwrap();
        let item = &items[0];
        assert_eq!(item.metadata.namespace, "guides");
        assert_eq!(item.content_type, ChunkType::Tutorial);
        assert_eq!(item.metadata.importance, Importance::High);
        assert_eq!(item.metadata.tags, vec!["quickstart", "setup"]);
    }

    #[test]
    fn test_section_line_numbers() {
        let items = parse_markdown(SAMPLE, "guides/start.md").unwrap();
        // "## Installing" is line 11 of the raw document
        assert_eq!(items[0].metadata.line_number, Some(11));
        assert!(items[1].metadata.line_number.unwrap() > 11);
    }

    #[test]
    fn test_document_without_sections() {
        let raw = "# Lone Guide\n\nJust one block of prose.\n";
        let items = parse_markdown(raw, "lone.md").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Lone Guide");
        assert_eq!(items[0].metadata.namespace, "docs");
    }

    #[test]
    fn test_document_without_front_matter_or_title() {
        let raw = "Some prose with no headings at all.\n";
        let items = parse_markdown(raw, "notes/misc.md").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "misc");
    }

    #[test]
    fn test_unterminated_front_matter() {
        let raw = "---\nnamespace: guides\n# no closing fence\n";
        let err = parse_markdown(raw, "bad.md").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedFrontMatter(_)));
    }

    #[test]
    fn test_empty_body_rejected() {
        let raw = "---\nnamespace: guides\n---\n\n";
        let err = parse_markdown(raw, "empty.md").unwrap_err();
        assert!(matches!(err, ParseError::EmptyDocument(_)));
    }
}
