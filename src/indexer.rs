//! Symbol Indexer.
//!
//! Walks the source tree, parses every matching file and turns the parsed
//! definitions into [`Symbol`] records with stable ids and span hashes.
//!
//! # Pipeline
//!
//! ```text
//! root ──walk──▶ files (sorted) ──parse──▶ units ──ids+hashes──▶ Vec<Symbol>
//!                                   │
//!                                   └── syntax error: file skipped, run continues
//! ```
//!
//! Each file yields one `module` symbol (spanning the whole file) followed
//! by its classes, methods and functions in source order. A file that
//! fails to read or parse contributes nothing.
//!
//! # Identity
//!
//! `symbol_id` is the qualname. When a qualname repeats within a run
//! (a redefined function, a property setter), later occurrences get
//! `#2`, `#3`, ... suffixes in traversal order.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use agentic_docs_core::hashing::{sha256_hex, span_hash};
use agentic_docs_core::models::{Symbol, SymbolKind};

use crate::config::Config;
use crate::parser::{ParsedFile, PythonParser, SourceParser};

/// Directory names never descended into.
pub const BUILTIN_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".venv",
    "venv",
    "site-packages",
    "build",
    "dist",
    "__pycache__",
    "node_modules",
    "target",
];

/// Counts reported after an indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
}

/// Result of [`SymbolIndexer::index`].
#[derive(Debug, Clone, Default)]
pub struct IndexOutput {
    pub symbols: Vec<Symbol>,
    pub report: IndexReport,
}

pub struct SymbolIndexer<P: SourceParser = PythonParser> {
    root: PathBuf,
    source_root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
    parser: P,
}

impl SymbolIndexer<PythonParser> {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_parser(config, PythonParser::new()?)
    }
}

impl<P: SourceParser> SymbolIndexer<P> {
    pub fn with_parser(config: &Config, parser: P) -> Result<Self> {
        Ok(Self {
            root: config.paths.root.clone(),
            source_root: config.paths.source_root(),
            include: build_globset(&config.indexer.include_globs)?,
            exclude: build_globset(&config.indexer.exclude_globs)?,
            follow_symlinks: config.indexer.follow_symlinks,
            parser,
        })
    }

    /// Source files to index, in deterministic traversal order.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            bail!("Source root does not exist: {}", self.root.display());
        }

        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !BUILTIN_EXCLUDES.contains(&e.file_name().to_string_lossy().as_ref())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();

            if self.exclude.is_match(rel_str.as_ref()) {
                continue;
            }
            if !self.include.is_match(rel_str.as_ref()) {
                continue;
            }
            files.push(path.to_path_buf());
        }

        Ok(files)
    }

    /// Walk, parse and extract every symbol.
    ///
    /// Only a missing root or an invalid glob is an error; per-file read
    /// and parse failures are logged and counted in the report.
    pub fn index(&mut self) -> Result<IndexOutput> {
        let files = self.discover()?;
        let mut output = IndexOutput::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for path in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                    output.report.files_skipped += 1;
                    continue;
                }
            };

            let parsed = match self.parser.parse(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping file that failed to parse");
                    output.report.files_skipped += 1;
                    continue;
                }
            };

            let module = module_qualname(&path, &self.source_root, &self.root);
            let symbols = build_symbols(&path, &module, &text, parsed, &mut seen);
            tracing::debug!(file = %path.display(), symbols = symbols.len(), "indexed file");
            output.symbols.extend(symbols);
            output.report.files_indexed += 1;
        }

        Ok(output)
    }
}

/// Dotted module name of `path`: relative to `source_root` when inside it,
/// otherwise relative to `root`. A trailing `__init__` is dropped.
pub fn module_qualname(path: &Path, source_root: &Path, root: &Path) -> String {
    let relative = path
        .strip_prefix(source_root)
        .or_else(|_| path.strip_prefix(root))
        .unwrap_or(path);
    let relative = relative.with_extension("");

    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.len() > 1 && parts.last().map(String::as_str) == Some("__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Turn one parsed file into symbols. `seen` counts qualnames across the
/// whole run so ids stay unique.
fn build_symbols(
    path: &Path,
    module: &str,
    text: &str,
    parsed: ParsedFile,
    seen: &mut HashMap<String, usize>,
) -> Vec<Symbol> {
    let file = path.display().to_string();
    let module_id = unique_id(module, seen);
    let line_count = text.lines().count().max(1);

    let mut symbols = Vec::with_capacity(parsed.units.len() + 1);
    symbols.push(Symbol {
        symbol_id: module_id.clone(),
        kind: SymbolKind::Module,
        file: file.clone(),
        qualname: module.to_string(),
        parent: None,
        signature: None,
        docstring: parsed.docstring,
        start: 1,
        end: line_count,
        content_hash: sha256_hex(text),
        decorators: Vec::new(),
    });

    // Latest id assigned to each in-file path; parents precede children.
    let mut ids: HashMap<Vec<String>, String> = HashMap::new();

    for unit in parsed.units {
        let qualname = format!("{}.{}", module, unit.path.join("."));
        let symbol_id = unique_id(&qualname, seen);
        let parent = match unit.path.split_last() {
            Some((_, outer)) if !outer.is_empty() => ids
                .get(outer)
                .cloned()
                .unwrap_or_else(|| module_id.clone()),
            _ => module_id.clone(),
        };

        symbols.push(Symbol {
            symbol_id: symbol_id.clone(),
            kind: unit.kind,
            file: file.clone(),
            qualname,
            parent: Some(parent),
            signature: unit.signature,
            docstring: unit.docstring,
            start: unit.start,
            end: unit.end,
            content_hash: span_hash(text, unit.start, unit.end),
            decorators: unit.decorators,
        });
        ids.insert(unit.path, symbol_id);
    }

    symbols
}

fn unique_id(qualname: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(qualname.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        qualname.to_string()
    } else {
        format!("{}#{}", qualname, count)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.root = root.to_path_buf();
        config
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn module_class_method_example() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/pkg/mod.py",
            "class Foo:\n    def bar(self):\n        return 1\n",
        );

        let output = SymbolIndexer::from_config(&config_for(tmp.path()))
            .unwrap()
            .index()
            .unwrap();
        let ids: Vec<(&str, SymbolKind, Option<&str>)> = output
            .symbols
            .iter()
            .map(|s| (s.symbol_id.as_str(), s.kind, s.parent.as_deref()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("pkg.mod", SymbolKind::Module, None),
                ("pkg.mod.Foo", SymbolKind::Class, Some("pkg.mod")),
                ("pkg.mod.Foo.bar", SymbolKind::Method, Some("pkg.mod.Foo")),
            ]
        );
        let bar = &output.symbols[2];
        assert_eq!((bar.start, bar.end), (2, 3));
        assert_eq!(
            bar.content_hash,
            sha256_hex("    def bar(self):\n        return 1")
        );
        assert_eq!(output.report.files_indexed, 1);
    }

    #[test]
    fn syntax_errors_skip_only_that_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/a.py", "def ok():\n    pass\n");
        write(tmp.path(), "src/b.py", "def broken(:\n");

        let output = SymbolIndexer::from_config(&config_for(tmp.path()))
            .unwrap()
            .index()
            .unwrap();
        assert_eq!(output.report.files_indexed, 1);
        assert_eq!(output.report.files_skipped, 1);
        assert!(output.symbols.iter().all(|s| s.file.ends_with("a.py")));
    }

    #[test]
    fn builtin_and_configured_excludes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/keep.py", "x = 1\n");
        write(tmp.path(), ".venv/lib/site.py", "x = 1\n");
        write(tmp.path(), "src/__pycache__/c.py", "x = 1\n");
        write(tmp.path(), "src/gen/skip.py", "x = 1\n");
        write(tmp.path(), "src/notes.txt", "not python\n");

        let mut config = config_for(tmp.path());
        config.indexer.exclude_globs = vec!["src/gen/**".into()];
        let files = SymbolIndexer::from_config(&config)
            .unwrap()
            .discover()
            .unwrap();
        assert_eq!(files, vec![tmp.path().join("src/keep.py")]);
    }

    #[test]
    fn duplicate_qualnames_get_suffixes() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/m.py",
            "class C:\n    @property\n    def v(self):\n        return 1\n\n    @v.setter\n    def v(self, x):\n        pass\n",
        );

        let output = SymbolIndexer::from_config(&config_for(tmp.path()))
            .unwrap()
            .index()
            .unwrap();
        let ids: Vec<&str> = output.symbols.iter().map(|s| s.symbol_id.as_str()).collect();
        assert_eq!(ids, vec!["m", "m.C", "m.C.v", "m.C.v#2"]);
        assert_eq!(output.symbols[3].qualname, "m.C.v");
        assert_eq!(output.symbols[3].decorators, vec!["v.setter"]);
    }

    #[test]
    fn qualname_collisions_across_files_get_suffixes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/pkg/__init__.py", "def f():\n    pass\n");
        write(tmp.path(), "src/pkg.py", "def f():\n    pass\n");

        let output = SymbolIndexer::from_config(&config_for(tmp.path()))
            .unwrap()
            .index()
            .unwrap();
        let ids: Vec<&str> = output.symbols.iter().map(|s| s.symbol_id.as_str()).collect();
        assert_eq!(ids, vec!["pkg", "pkg.f", "pkg#2", "pkg.f#2"]);
        assert_eq!(output.symbols[3].parent.as_deref(), Some("pkg#2"));
        assert!(output.symbols[3].file.ends_with("pkg.py"));
    }

    #[test]
    fn qualname_rules() {
        let root = Path::new("/repo");
        let src = Path::new("/repo/src");
        assert_eq!(module_qualname(Path::new("/repo/src/pkg/__init__.py"), src, root), "pkg");
        assert_eq!(module_qualname(Path::new("/repo/src/pkg/mod.py"), src, root), "pkg.mod");
        assert_eq!(module_qualname(Path::new("/repo/tests/test_x.py"), src, root), "tests.test_x");
        assert_eq!(module_qualname(Path::new("/repo/src/__init__.py"), src, root), "__init__");
    }

    #[test]
    fn missing_root_is_an_error() {
        let config = config_for(Path::new("/definitely/not/here"));
        assert!(SymbolIndexer::from_config(&config).unwrap().index().is_err());
    }
}
