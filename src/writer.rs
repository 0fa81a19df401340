//! Section Merger on disk.
//!
//! Documents mirror the source tree one-to-one:
//! `src/pkg/mod.py` → `<docs_root>/api/pkg/mod.md`. Each write is a
//! read-modify-write of one document:
//!
//! 1. take the per-document lock (one write in flight per path),
//! 2. read and parse the document, or start one with a `# <stem>` header,
//! 3. upsert the section for `symbol_id` (replace in place or append),
//! 4. write a temp file next to the target and rename it over the target.
//!
//! A failed write leaves the previous file untouched.

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use agentic_docs_core::section::{Document, Section, Upsert};

use crate::config::Config;

/// What [`MarkdownWriter::write_section`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The document did not exist and was created with this section.
    Created,
    Appended,
    Replaced,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Appended => "appended",
            Self::Replaced => "replaced",
        }
    }
}

pub struct MarkdownWriter {
    root: PathBuf,
    source_root: PathBuf,
    api_root: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    temp_counter: AtomicU64,
}

impl MarkdownWriter {
    pub fn new(root: &Path, source_root: &Path, docs_root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            source_root: source_root.to_path_buf(),
            api_root: docs_root.join("api"),
            locks: DashMap::new(),
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let root = &config.paths.root;
        Self::new(
            root,
            &config.paths.source_root(),
            &root.join(&config.paths.docs_root),
        )
    }

    /// Document path for a source file: its path relative to the source
    /// root (or the repository root for files outside it) with `.md`.
    pub fn target_path(&self, source_file: &Path) -> PathBuf {
        let relative = source_file
            .strip_prefix(&self.source_root)
            .or_else(|_| source_file.strip_prefix(&self.root))
            .unwrap_or(source_file);
        let relative: PathBuf = relative
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        self.api_root.join(relative.with_extension("md"))
    }

    /// The section currently owned by `symbol_id` in `target`, if any.
    pub async fn read_section(&self, target: &Path, symbol_id: &str) -> Result<Option<Section>> {
        match tokio::fs::read_to_string(target).await {
            Ok(text) => Ok(Document::parse(&text).section(symbol_id).cloned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read document: {}", target.display()))
            }
        }
    }

    /// Create or replace the section for `symbol_id` in `target`.
    pub async fn write_section(
        &self,
        target: &Path,
        symbol_id: &str,
        content: &str,
        source_hash: &str,
    ) -> Result<WriteOutcome> {
        let lock = self
            .locks
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let (mut document, created) = match tokio::fs::read_to_string(target).await {
            Ok(text) => (Document::parse(&text), false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let title = target
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                (Document::with_title(&title), true)
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read document: {}", target.display()))
            }
        };

        let upsert = document.upsert(Section::new(symbol_id, source_hash, content));
        self.replace_file(target, &document.render()).await?;

        Ok(match (created, upsert) {
            (true, _) => WriteOutcome::Created,
            (false, Upsert::Appended) => WriteOutcome::Appended,
            (false, Upsert::Replaced) => WriteOutcome::Replaced,
        })
    }

    /// Write `text` to a sibling temp file, then rename it over `target`.
    async fn replace_file(&self, target: &Path, text: &str) -> Result<()> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.md".to_string());
        let temp = parent.join(format!(
            ".{}.tmp-{}-{}",
            file_name,
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let result = async {
            tokio::fs::write(&temp, text).await?;
            tokio::fs::rename(&temp, target).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e).with_context(|| format!("Failed to write document: {}", target.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(tmp: &TempDir) -> MarkdownWriter {
        MarkdownWriter::new(tmp.path(), &tmp.path().join("src"), &tmp.path().join("docs"))
    }

    #[test]
    fn target_path_mirrors_source_tree() {
        let w = MarkdownWriter::new(Path::new("/r"), Path::new("/r/src"), Path::new("/r/docs"));
        assert_eq!(
            w.target_path(Path::new("/r/src/pkg/mod.py")),
            PathBuf::from("/r/docs/api/pkg/mod.md")
        );
        assert_eq!(
            w.target_path(Path::new("/r/tests/test_mod.py")),
            PathBuf::from("/r/docs/api/tests/test_mod.md")
        );
    }

    #[tokio::test]
    async fn create_append_replace() {
        let tmp = TempDir::new().unwrap();
        let w = writer(&tmp);
        let target = w.target_path(&tmp.path().join("src/pkg/mod.py"));

        assert_eq!(
            w.write_section(&target, "pkg.mod.Foo", "Foo docs", "h1").await.unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            w.write_section(&target, "pkg.mod.Foo.bar", "bar docs", "h1").await.unwrap(),
            WriteOutcome::Appended
        );
        assert_eq!(
            w.write_section(&target, "pkg.mod.Foo.bar", "bar docs v2", "h2").await.unwrap(),
            WriteOutcome::Replaced
        );

        let text = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            text,
            "# mod\n\n\
             <!-- BEGIN: auto:pkg.mod.Foo (hash=h1) -->\nFoo docs\n<!-- END: auto:pkg.mod.Foo -->\n\n\
             <!-- BEGIN: auto:pkg.mod.Foo.bar (hash=h2) -->\nbar docs v2\n<!-- END: auto:pkg.mod.Foo.bar -->\n"
        );

        let section = w.read_section(&target, "pkg.mod.Foo.bar").await.unwrap().unwrap();
        assert_eq!(section.source_hash(), "h2");
        assert!(w.read_section(&target, "pkg.mod.Gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn manual_text_survives_and_no_temp_files_remain() {
        let tmp = TempDir::new().unwrap();
        let w = writer(&tmp);
        let target = tmp.path().join("docs/api/m.md");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(
            &target,
            "# m\n\nHand-written intro.\n\n<!-- BEGIN: auto:m.f (hash=old) -->\nold\n<!-- END: auto:m.f -->\n\nFooter.\n",
        )
        .unwrap();

        w.write_section(&target, "m.f", "new", "h").await.unwrap();
        let text = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            text,
            "# m\n\nHand-written intro.\n\n<!-- BEGIN: auto:m.f (hash=h) -->\nnew\n<!-- END: auto:m.f -->\n\nFooter.\n"
        );

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn missing_document_reads_as_no_section() {
        let tmp = TempDir::new().unwrap();
        let w = writer(&tmp);
        let none = w
            .read_section(&tmp.path().join("docs/api/none.md"), "x")
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
