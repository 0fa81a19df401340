//! Source parsing via tree-sitter.
//!
//! A [`SourceParser`] turns the text of one file into a [`ParsedFile`]: the
//! module docstring plus the definitions found in it, in source order. The
//! indexer assigns identities and hashes; the parser only reports names,
//! kinds and line spans.
//!
//! [`PythonParser`] is the shipped implementation. It emits top-level
//! classes and functions, the methods of every class, and classes nested
//! inside classes. Function bodies are not descended.

use anyhow::{bail, Context, Result};
use tree_sitter::{Language, Node, Parser};

use agentic_docs_core::models::SymbolKind;

/// One definition found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUnit {
    /// Name components within the file, outermost first (`["Foo", "bar"]`).
    pub path: Vec<String>,
    pub kind: SymbolKind,
    /// 1-based, inclusive.
    pub start: usize,
    /// 1-based, inclusive.
    pub end: usize,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
}

/// Everything a parser extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub docstring: Option<String>,
    pub units: Vec<ParsedUnit>,
}

/// Parser capability used by the indexer.
pub trait SourceParser {
    /// Parse one file. An error means the file must be skipped as a whole.
    fn parse(&mut self, source: &str) -> Result<ParsedFile>;
}

/// tree-sitter parser for Python sources.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language: Language = tree_sitter_python::LANGUAGE.into();
        parser
            .set_language(&language)
            .context("Failed to set Python language")?;
        Ok(Self { parser })
    }
}

impl SourceParser for PythonParser {
    fn parse(&mut self, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parser
            .parse(source, None)
            .context("Failed to parse source")?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
            bail!("syntax error near line {}", line);
        }

        let mut units = Vec::new();
        collect_definitions(root, source, &[], false, &mut units);

        Ok(ParsedFile {
            docstring: docstring_of(root, source),
            units,
        })
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

/// Walk the statements of `scope` (a module or a class body).
fn collect_definitions(
    scope: Node,
    source: &str,
    prefix: &[String],
    in_class: bool,
    out: &mut Vec<ParsedUnit>,
) {
    let mut cursor = scope.walk();
    for child in scope.named_children(&mut cursor) {
        let (definition, decorators) = match child.kind() {
            "decorated_definition" => {
                let Some(definition) = child.child_by_field_name("definition") else {
                    continue;
                };
                (definition, decorators_of(child, source))
            }
            "function_definition" | "class_definition" => (child, Vec::new()),
            _ => continue,
        };

        let Some(name) = definition
            .child_by_field_name("name")
            .map(|n| text(n, source).to_string())
        else {
            continue;
        };
        let mut path = prefix.to_vec();
        path.push(name);

        let (start, end) = line_span(definition);
        let docstring = definition
            .child_by_field_name("body")
            .and_then(|body| docstring_of(body, source));

        match definition.kind() {
            "function_definition" => {
                out.push(ParsedUnit {
                    path,
                    kind: if in_class {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    },
                    start,
                    end,
                    signature: Some(function_signature(definition, source)),
                    docstring,
                    decorators,
                });
            }
            "class_definition" => {
                out.push(ParsedUnit {
                    path: path.clone(),
                    kind: SymbolKind::Class,
                    start,
                    end,
                    signature: definition
                        .child_by_field_name("superclasses")
                        .map(|bases| squash(text(bases, source))),
                    docstring,
                    decorators,
                });
                if let Some(body) = definition.child_by_field_name("body") {
                    collect_definitions(body, source, &path, true, out);
                }
            }
            _ => {}
        }
    }
}

/// 1-based inclusive lines of a node. A node ending at column 0 does not
/// own that final line.
fn line_span(node: Node) -> (usize, usize) {
    let start = node.start_position().row + 1;
    let end_pos = node.end_position();
    let mut end = end_pos.row + 1;
    if end_pos.column == 0 && end > start {
        end -= 1;
    }
    (start, end)
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

fn decorators_of(decorated: Node, source: &str) -> Vec<String> {
    let mut cursor = decorated.walk();
    decorated
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| squash(text(c, source).trim_start_matches('@')))
        .collect()
}

fn function_signature(function: Node, source: &str) -> String {
    let params = function
        .child_by_field_name("parameters")
        .map(|p| squash(text(p, source)))
        .unwrap_or_else(|| "()".to_string());
    match function.child_by_field_name("return_type") {
        Some(ret) => format!("{} -> {}", params, squash(text(ret, source))),
        None => params,
    }
}

/// Collapse runs of whitespace (multi-line parameter lists) into single spaces.
fn squash(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(",)", ")")
}

/// Docstring of a module or block: its first statement, if that statement
/// is a bare string literal.
fn docstring_of(block: Node, source: &str) -> Option<String> {
    let mut cursor = block.walk();
    let first = block
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != "string" {
        return None;
    }
    let doc = cleandoc(unquote(text(literal, source)));
    (!doc.is_empty()).then_some(doc)
}

fn unquote(literal: &str) -> &str {
    let body = literal.trim_start_matches(|c: char| "rRuUbB".contains(c));
    for quote in ["\"\"\"", "'''"] {
        if body.len() >= 6 && body.starts_with(quote) && body.ends_with(quote) {
            return &body[3..body.len() - 3];
        }
    }
    if body.len() >= 2 {
        &body[1..body.len() - 1]
    } else {
        body
    }
}

/// Normalize docstring indentation: strip the first line, remove the
/// common indentation of the remaining lines, drop blank edges.
pub fn cleandoc(raw: &str) -> String {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    // Indentation is counted in chars: Unicode spaces are multibyte.
    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    cleaned.push(first.trim());
    for line in rest {
        let cut = line
            .char_indices()
            .nth(margin)
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        cleaned.push(line[cut..].trim_end());
    }

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}
