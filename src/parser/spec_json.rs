//! Structured specification parsing.
//!
//! A spec document is a JSON tree of namespaces containing classes,
//! methods, and guides. Nested `namespaces` arrays produce dotted
//! namespace paths (`core.crypto`).

use crate::error::ParseError;
use crate::types::{ChunkType, ContentMetadata, Importance, ParameterDoc, ParsedContent};
use serde_json::Value;

pub fn parse_spec_json(raw: &str, source_file: &str) -> Result<Vec<ParsedContent>, ParseError> {
    let root: Value = serde_json::from_str(raw).map_err(|e| ParseError::MalformedJson {
        file: source_file.to_string(),
        reason: e.to_string(),
    })?;

    let mut items = Vec::new();
    walk_namespace(&root, None, source_file, &mut items)?;

    if items.is_empty() {
        return Err(ParseError::EmptyDocument(source_file.to_string()));
    }
    Ok(items)
}

fn walk_namespace(
    node: &Value,
    parent: Option<&str>,
    source_file: &str,
    items: &mut Vec<ParsedContent>,
) -> Result<(), ParseError> {
    let name = require_str(node, "namespace", source_file)?;
    let namespace = match parent {
        Some(p) => format!("{}.{}", p, name),
        None => name.to_string(),
    };

    if let Some(classes) = node.get("classes").and_then(Value::as_array) {
        for class in classes {
            parse_class(class, &namespace, source_file, items)?;
        }
    }

    if let Some(guides) = node.get("guides").and_then(Value::as_array) {
        for guide in guides {
            parse_guide(guide, &namespace, source_file, items)?;
        }
    }

    if let Some(children) = node.get("namespaces").and_then(Value::as_array) {
        for child in children {
            walk_namespace(child, Some(&namespace), source_file, items)?;
        }
    }

    Ok(())
}

fn parse_class(
    class: &Value,
    namespace: &str,
    source_file: &str,
    items: &mut Vec<ParsedContent>,
) -> Result<(), ParseError> {
    let class_name = require_str(class, "name", source_file)?;

    items.push(ParsedContent {
        content_type: ChunkType::Class,
        name: class_name.to_string(),
        description: str_or_default(class, "description"),
        content: str_or_default(class, "content"),
        examples: str_array(class, "examples"),
        parameters: Vec::new(),
        returns: None,
        metadata: ContentMetadata {
            namespace: namespace.to_string(),
            source_file: source_file.to_string(),
            importance: importance_of(class),
            tags: str_array(class, "tags"),
            class_name: Some(class_name.to_string()),
            line_number: line_of(class),
        },
    });

    if let Some(methods) = class.get("methods").and_then(Value::as_array) {
        for method in methods {
            let method_name = require_str(method, "name", source_file)?;
            items.push(ParsedContent {
                content_type: ChunkType::Method,
                name: format!("{}.{}", class_name, method_name),
                description: str_or_default(method, "description"),
                content: str_or_default(method, "content"),
                examples: str_array(method, "examples"),
                parameters: parse_parameters(method),
                returns: method
                    .get("returns")
                    .and_then(Value::as_str)
                    .map(String::from),
                metadata: ContentMetadata {
                    namespace: namespace.to_string(),
                    source_file: source_file.to_string(),
                    importance: importance_of(method),
                    tags: str_array(method, "tags"),
                    class_name: Some(class_name.to_string()),
                    line_number: line_of(method),
                },
            });
        }
    }

    Ok(())
}

fn parse_guide(
    guide: &Value,
    namespace: &str,
    source_file: &str,
    items: &mut Vec<ParsedContent>,
) -> Result<(), ParseError> {
    let title = require_str(guide, "title", source_file)?;
    let kind = guide
        .get("type")
        .and_then(Value::as_str)
        .and_then(ChunkType::parse)
        .unwrap_or(ChunkType::Tutorial);

    items.push(ParsedContent {
        content_type: kind,
        name: title.to_string(),
        description: str_or_default(guide, "description"),
        content: str_or_default(guide, "content"),
        examples: str_array(guide, "examples"),
        parameters: Vec::new(),
        returns: None,
        metadata: ContentMetadata {
            namespace: namespace.to_string(),
            source_file: source_file.to_string(),
            importance: importance_of(guide),
            tags: str_array(guide, "tags"),
            class_name: None,
            line_number: line_of(guide),
        },
    });

    Ok(())
}

fn parse_parameters(method: &Value) -> Vec<ParameterDoc> {
    method
        .get("parameters")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .filter_map(|p| {
                    let name = p.get("name").and_then(Value::as_str)?;
                    Some(ParameterDoc {
                        name: name.to_string(),
                        param_type: p.get("type").and_then(Value::as_str).map(String::from),
                        description: str_or_default(p, "description"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn require_str<'a>(node: &'a Value, field: &str, file: &str) -> Result<&'a str, ParseError> {
    node.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField {
            file: file.to_string(),
            field: field.to_string(),
        })
}

fn str_or_default(node: &Value, field: &str) -> String {
    node.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn str_array(node: &Value, field: &str) -> Vec<String> {
    node.get(field)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn importance_of(node: &Value) -> Importance {
    node.get("importance")
        .and_then(Value::as_str)
        .and_then(Importance::parse)
        .unwrap_or_default()
}

fn line_of(node: &Value) -> Option<u32> {
    node.get("line").and_then(Value::as_u64).map(|n| n as u32)
}
