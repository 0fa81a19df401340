//! Core data models used throughout Agentic Docs.
//!
//! These types represent the extracted symbols and the records that flow
//! between the indexer, the similarity index, and the retriever.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of code unit a [`Symbol`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module" => Some(Self::Module),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted code unit.
///
/// Symbols are created fresh on every indexing pass and never mutated.
/// `symbol_id` is deterministic for identical source, and `content_hash`
/// covers exactly the `start..=end` line span (the whole file for modules).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol_id: String,
    pub kind: SymbolKind,
    /// Source file path as discovered by the indexer walk.
    pub file: String,
    pub qualname: String,
    /// `symbol_id` of the enclosing scope; `None` only for modules.
    pub parent: Option<String>,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    /// 1-based, inclusive.
    pub start: usize,
    /// 1-based, inclusive.
    pub end: usize,
    pub content_hash: String,
    pub decorators: Vec<String>,
}

impl Symbol {
    pub fn is_module(&self) -> bool {
        self.kind == SymbolKind::Module
    }

    /// Text used to embed this symbol: docstring, then signature, then qualname.
    pub fn embedding_text(&self) -> &str {
        self.docstring
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.signature.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or(&self.qualname)
    }

    /// Extract this symbol's line span from the full text of its file.
    pub fn span_text(&self, file_text: &str) -> String {
        crate::hashing::line_span(file_text, self.start, self.end)
    }
}

/// Metadata stored alongside each vector in a similarity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub symbol_id: String,
    pub qualname: String,
    pub file: String,
    pub content_hash: String,
}

impl From<&Symbol> for IndexRecord {
    fn from(symbol: &Symbol) -> Self {
        Self {
            symbol_id: symbol.symbol_id.clone(),
            qualname: symbol.qualname.clone(),
            file: symbol.file.clone(),
            content_hash: symbol.content_hash.clone(),
        }
    }
}

/// A record returned from a similarity search, with its cosine score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    pub score: f32,
}

/// A semantically related symbol returned by the context retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub qualname: String,
    pub score: f32,
}
