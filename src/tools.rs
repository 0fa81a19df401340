//! Tool Registry for the reasoning loop.
//!
//! A [`Tool`] is a named capability taking a single string argument. The
//! [`ToolRegistry`] is an explicit table built at startup; nothing is
//! discovered at runtime.
//!
//! Invocation never fails: [`ToolRegistry::invoke`] returns a
//! [`ToolOutcome`] whose [`observation`](ToolOutcome::observation) is fed
//! back to the model, with failures rendered as `Error: ...` text.
//!
//! # Built-in Tools
//!
//! | Name | Input | Output |
//! |------|-------|--------|
//! | `read_file` | path | file contents (truncated past a size cap) |
//! | `list_directory` | path (default `.`) | sorted `[DIR]  name` / `[FILE] name` lines |
//! | `search_code` | literal text | `path:line:text` matches, at most 50 |
//!
//! Paths are resolved against the repository root and may not escape it.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::indexer::BUILTIN_EXCLUDES;

/// Maximum matches `search_code` returns before truncating.
pub const SEARCH_MATCH_LIMIT: usize = 50;

/// Maximum characters `read_file` returns.
pub const READ_FILE_LIMIT: usize = 20_000;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier the model uses in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// Run the tool. Errors are converted to observations by the registry.
    async fn call(&self, input: &str) -> Result<String>;
}

/// Result of one registry invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Output(String),
    Failed(String),
    NotFound { name: String, available: Vec<String> },
}

impl ToolOutcome {
    /// Text appended to the scratchpad after `Observation:`.
    pub fn observation(&self) -> String {
        match self {
            Self::Output(text) => text.clone(),
            Self::Failed(message) => format!("Error: {}", message),
            Self::NotFound { name, available } => format!(
                "Error: tool '{}' not found. Available tools: {}",
                name,
                available.join(", ")
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Output(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with `read_file`, `list_directory` and `search_code`
    /// rooted at `root`.
    pub fn with_builtins(root: &Path) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool::new(root)));
        registry.register(Box::new(ListDirectoryTool::new(root)));
        registry.register(Box::new(SearchCodeTool::new(root)));
        registry
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// `(name, description)` pairs in registration order.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub async fn invoke(&self, name: &str, input: &str) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return ToolOutcome::NotFound {
                name: name.to_string(),
                available: self.names(),
            };
        };
        match tool.call(input).await {
            Ok(output) => ToolOutcome::Output(output),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "tool failed");
                ToolOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a tool argument against `root`, refusing paths outside it.
fn resolve(root: &Path, input: &str) -> Result<PathBuf> {
    let input = input.trim();
    let input = if input.is_empty() { "." } else { input };
    let candidate = Path::new(input);

    let relative = if candidate.is_absolute() {
        let root_abs = root
            .canonicalize()
            .with_context(|| format!("cannot resolve root {}", root.display()))?;
        let abs = candidate
            .canonicalize()
            .with_context(|| format!("{} does not exist", input))?;
        abs.strip_prefix(&root_abs)
            .map(Path::to_path_buf)
            .map_err(|_| anyhow!("{} is outside the repository", input))?
    } else {
        candidate.to_path_buf()
    };

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    bail!("{} is outside the repository", input);
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Ok(root.join(clean))
}

// ═══════════════════════════════════════════════════════════════════════
// Built-ins
// ═══════════════════════════════════════════════════════════════════════

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file. Input: a path relative to the repository root."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let path = resolve(&self.root, input)?;
        if !path.is_file() {
            bail!("File {} does not exist.", input.trim());
        }
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read {}", input.trim()))?;

        if text.chars().count() > READ_FILE_LIMIT {
            let cut: String = text.chars().take(READ_FILE_LIMIT).collect();
            return Ok(format!("{}\n... (truncated at {} characters)", cut, READ_FILE_LIMIT));
        }
        Ok(text)
    }
}

pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Input: a path relative to the repository root (default '.')."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let path = resolve(&self.root, input)?;
        if !path.is_dir() {
            bail!("Directory {} does not exist.", input.trim());
        }

        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            let prefix = if is_dir { "[DIR] " } else { "[FILE]" };
            items.push(format!("{} {}", prefix, entry.file_name().to_string_lossy()));
        }
        items.sort();

        if items.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        Ok(items.join("\n"))
    }
}

pub struct SearchCodeTool {
    root: PathBuf,
}

impl SearchCodeTool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search every text file in the repository for a literal string. Input: the text to find."
    }

    async fn call(&self, input: &str) -> Result<String> {
        let query = input.trim().to_string();
        if query.is_empty() {
            bail!("search query is empty");
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || search_tree(&root, &query)).await?
    }
}

fn search_tree(root: &Path, query: &str) -> Result<String> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !BUILTIN_EXCLUDES.contains(&e.file_name().to_string_lossy().as_ref())
        });

    let mut matches = Vec::new();
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        if bytes.iter().take(8192).any(|b| *b == 0) {
            continue;
        }
        let Ok(text) = String::from_utf8(bytes) else {
            continue;
        };

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        for (n, line) in text.lines().enumerate() {
            if line.contains(query) {
                matches.push(format!("{}:{}:{}", rel, n + 1, line));
            }
        }
    }

    if matches.is_empty() {
        return Ok("No matches found.".to_string());
    }
    let total = matches.len();
    if total > SEARCH_MATCH_LIMIT {
        matches.truncate(SEARCH_MATCH_LIMIT);
        matches.push(format!("... ({} more matches)", total - SEARCH_MATCH_LIMIT));
    }
    Ok(matches.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/pkg")).unwrap();
        std::fs::write(tmp.path().join("src/pkg/a.py"), "def add(x, y):\n    return x + y\n").unwrap();
        std::fs::write(tmp.path().join("README.md"), "use add for sums\n").unwrap();
        std::fs::write(tmp.path().join("blob.bin"), [0u8, 1, 2, b'a', b'd', b'd']).unwrap();
        tmp
    }

    #[tokio::test]
    async fn read_file_and_missing_file() {
        let tmp = repo();
        let registry = ToolRegistry::with_builtins(tmp.path());

        let ok = registry.invoke("read_file", "src/pkg/a.py").await;
        assert_eq!(ok, ToolOutcome::Output("def add(x, y):\n    return x + y\n".into()));

        let missing = registry.invoke("read_file", "nope.py").await;
        assert!(missing.is_error());
        assert!(missing.observation().starts_with("Error: "));
    }

    #[tokio::test]
    async fn list_directory_is_sorted_and_marks_dirs() {
        let tmp = repo();
        let registry = ToolRegistry::with_builtins(tmp.path());
        let out = registry.invoke("list_directory", "").await.observation();
        assert_eq!(out, "[DIR]  src\n[FILE] README.md\n[FILE] blob.bin");
    }

    #[tokio::test]
    async fn search_code_skips_binary_files() {
        let tmp = repo();
        let registry = ToolRegistry::with_builtins(tmp.path());
        let out = registry.invoke("search_code", "add").await.observation();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["README.md:1:use add for sums", "src/pkg/a.py:1:def add(x, y):"]);
    }

    #[tokio::test]
    async fn search_code_caps_matches() {
        let tmp = TempDir::new().unwrap();
        let body: String = (0..60).map(|i| format!("needle {}\n", i)).collect();
        std::fs::write(tmp.path().join("many.txt"), body).unwrap();

        let out = SearchCodeTool::new(tmp.path()).call("needle").await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), SEARCH_MATCH_LIMIT + 1);
        assert_eq!(lines.last().copied(), Some("... (10 more matches)"));
    }

    #[tokio::test]
    async fn unknown_tool_lists_available() {
        let tmp = repo();
        let registry = ToolRegistry::with_builtins(tmp.path());
        let outcome = registry.invoke("run_shell", "ls").await;
        assert_eq!(
            outcome.observation(),
            "Error: tool 'run_shell' not found. Available tools: read_file, list_directory, search_code"
        );
    }

    #[tokio::test]
    async fn paths_cannot_escape_root() {
        let tmp = repo();
        let registry = ToolRegistry::with_builtins(&tmp.path().join("src"));
        let outcome = registry.invoke("read_file", "../README.md").await;
        assert!(outcome.observation().contains("outside the repository"));
    }

    #[test]
    fn describe_keeps_registration_order() {
        let registry = ToolRegistry::with_builtins(Path::new("."));
        let names: Vec<String> = registry.describe().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["read_file", "list_directory", "search_code"]);
    }
}
