//! TOML configuration.
//!
//! A run is fully described by one [`Config`] value, loaded once and then
//! passed to the orchestrator. Every section and field has a default, so
//! an empty file (or no file at all) yields a usable configuration.
//!
//! ```toml
//! [paths]
//! root = "."
//! src_root = "src"
//! docs_root = "docs"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [llm]
//! provider = "openai"
//! url = "http://localhost:11434/v1"
//! model = "qwen2.5-coder:7b"
//!
//! [generation]
//! workers = 4
//! agentic = true
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Relative to `root`. Module qualnames are derived from paths under it.
    #[serde(default = "default_src_root")]
    pub src_root: PathBuf,
    #[serde(default = "default_docs_root")]
    pub docs_root: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            src_root: default_src_root(),
            docs_root: default_docs_root(),
            index_dir: default_index_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_src_root() -> PathBuf {
    PathBuf::from("src")
}
fn default_docs_root() -> PathBuf {
    PathBuf::from("docs")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from(".index")
}

impl PathsConfig {
    /// Absolute-or-relative path of the source root (`root/src_root`).
    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.src_root)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_embedding_provider() -> String {
    "local".to_string()
}
#[cfg(not(feature = "local-embeddings-fastembed"))]
fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"sqlite"` (persistent, default) or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Defaults to `<index_dir>/index.sqlite`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_lock_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"openai"` (any OpenAI-compatible server), `"ollama"`, or `"disabled"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Unset variables are allowed
    /// for local servers that do not check keys.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_llm_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of related symbols retrieved as context.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Route analysis through the tool-using reasoning loop.
    #[serde(default)]
    pub agentic: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Approximate token ceiling for all model calls in one run.
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: u64,
    /// Skip symbols whose documented hash matches the current source.
    #[serde(default)]
    pub changed_only: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            k: default_k(),
            agentic: false,
            max_steps: default_max_steps(),
            budget_tokens: default_budget_tokens(),
            changed_only: false,
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_k() -> usize {
    8
}
fn default_max_steps() -> usize {
    5
}
fn default_budget_tokens() -> u64 {
    200_000
}

impl Config {
    /// Path of the SQLite index file.
    pub fn index_path(&self) -> PathBuf {
        self.index.path.clone().unwrap_or_else(|| {
            self.paths
                .root
                .join(&self.paths.index_dir)
                .join("index.sqlite")
        })
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.generation.workers == 0 {
            bail!("generation.workers must be >= 1");
        }
        if self.generation.k == 0 {
            bail!("generation.k must be >= 1");
        }
        if self.generation.max_steps == 0 {
            bail!("generation.max_steps must be >= 1");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }

        match self.index.backend.as_str() {
            "sqlite" | "memory" => {}
            other => bail!("Unknown index backend: '{}'. Must be sqlite or memory.", other),
        }

        match self.llm.provider.as_str() {
            "disabled" => {}
            "openai" | "ollama" => {
                if self.llm.model.is_none() {
                    bail!(
                        "llm.model must be specified when provider is '{}'",
                        self.llm.provider
                    );
                }
            }
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise fall back to defaults when
/// `allow_missing` is set.
pub fn load_or_default(path: &Path, allow_missing: bool) -> Result<Config> {
    if allow_missing && !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.generation.workers, 4);
        assert_eq!(config.generation.k, 8);
        assert_eq!(config.generation.max_steps, 5);
        assert_eq!(config.indexer.include_globs, vec!["**/*.py"]);
        assert_eq!(config.index_path(), PathBuf::from("./.index/index.sqlite"));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = parse_config("[generation]\nworkers = 0\n").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn remote_embedding_requires_dims_and_model() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("dims"));
        let err =
            parse_config("[embedding]\nprovider = \"ollama\"\ndims = 768\n").unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(parse_config("[index]\nbackend = \"faiss\"\n").is_err());
        assert!(parse_config("[llm]\nprovider = \"llamacpp\"\n").is_err());
    }

    #[test]
    fn llm_requires_model() {
        let err = parse_config("[llm]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("llm.model"));
        let ok = parse_config("[llm]\nprovider = \"ollama\"\nmodel = \"llama3\"\n").unwrap();
        assert_eq!(ok.llm.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn missing_default_file_falls_back() {
        let config = load_or_default(Path::new("/nonexistent/adocs.toml"), true).unwrap();
        assert_eq!(config.paths.docs_root, PathBuf::from("docs"));
        assert!(load_or_default(Path::new("/nonexistent/adocs.toml"), false).is_err());
    }
}
