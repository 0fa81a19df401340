//! Run lifecycle.
//!
//! ```text
//! Init ─▶ Indexing ─▶ Embedding ─▶ Generating ─▶ Draining ─▶ Closed
//!   │                                                ▲
//!   └──────────── shutdown signal (any phase) ───────┘
//! ```
//!
//! [`Orchestrator::new`] is `Init`: it connects the similarity index and
//! the language model. [`Orchestrator::run_until`] drives the remaining
//! phases. When the shutdown future resolves first, the work in progress
//! is dropped (spawned generation tasks are detached, not aborted), the
//! index is still closed, and the summary is marked `interrupted`.
//!
//! Every run re-indexes the whole tree. `changed_only` is a pre-filter on
//! the symbol list that compares each symbol's hash with the hash stored
//! in its existing section.

use anyhow::{Context, Result};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentic_docs_core::embedding::Embedder;
use agentic_docs_core::models::Symbol;
use agentic_docs_core::store::memory::InMemoryIndex;
use agentic_docs_core::store::VectorIndex;

use crate::budget::{BudgetedModel, TokenBudget};
use crate::config::Config;
use crate::embedding::{create_embedder, CachingEmbedder};
use crate::indexer::{IndexOutput, SymbolIndexer};
use crate::llm::{create_model, LanguageModel};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::retriever::ContextRetriever;
use crate::sqlite_index::SqliteIndex;
use crate::tools::ToolRegistry;
use crate::worker::{GenerationPool, Generator};
use crate::writer::MarkdownWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Indexing,
    Embedding,
    Generating,
    Draining,
    Closed,
}

/// Final counts of a run, printed by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub symbols: usize,
    /// Non-module symbols selected for generation.
    pub candidates: usize,
    pub created: usize,
    pub appended: usize,
    pub replaced: usize,
    /// Skipped by `changed_only` because their section is current.
    pub unchanged: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Symbols a run would generate, computed without any capability.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub index: IndexOutput,
    pub candidates: Vec<Symbol>,
    pub unchanged: usize,
}

/// Index the tree and select the symbols to generate.
pub async fn plan(config: &Config) -> Result<Plan> {
    let indexer_config = config.clone();
    let index = tokio::task::spawn_blocking(move || {
        SymbolIndexer::from_config(&indexer_config)?.index()
    })
    .await
    .context("indexer task failed")??;

    let writer = MarkdownWriter::from_config(config);
    let mut candidates = Vec::new();
    let mut unchanged = 0;
    for symbol in index.symbols.iter().filter(|s| !s.is_module()) {
        if config.generation.changed_only {
            let target = writer.target_path(Path::new(&symbol.file));
            let current = match writer.read_section(&target, &symbol.symbol_id).await {
                Ok(section) => section.is_some_and(|s| s.source_hash() == symbol.content_hash),
                Err(e) => {
                    tracing::warn!(
                        symbol = %symbol.symbol_id,
                        "Cannot check existing section, regenerating: {:#}",
                        e
                    );
                    false
                }
            };
            if current {
                unchanged += 1;
                continue;
            }
        }
        candidates.push(symbol.clone());
    }

    Ok(Plan {
        index,
        candidates,
        unchanged,
    })
}

/// Resolve when `signal` fires. A signal that fails to install never
/// resolves, so the run is not treated as interrupted.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!("Cannot listen for shutdown signal, run is not interruptible: {}", e);
        std::future::pending::<()>().await;
    }
}

pub struct Orchestrator {
    config: Config,
    retriever: Arc<ContextRetriever>,
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    progress: Arc<dyn ProgressReporter>,
    phase: Mutex<Phase>,
}

impl Orchestrator {
    /// Connect the configured capabilities.
    pub async fn new(config: Config, progress: Arc<dyn ProgressReporter>) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index: Arc<dyn VectorIndex> = match config.index.backend.as_str() {
            "memory" => Arc::new(InMemoryIndex::new()),
            _ => Arc::new(
                SqliteIndex::open(
                    &config.index_path(),
                    Duration::from_secs(config.index.lock_timeout_secs),
                )
                .await?,
            ),
        };
        let model = create_model(&config.llm)?;
        Ok(Self::with_capabilities(config, embedder, index, model, progress))
    }

    /// Build from already-connected capabilities.
    pub fn with_capabilities(
        config: Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let embedder: Arc<dyn Embedder> = Arc::new(CachingEmbedder::new(embedder));
        let retriever = Arc::new(ContextRetriever::new(
            embedder,
            Arc::clone(&index),
            config.embedding.batch_size,
        ));
        let budget = Arc::new(TokenBudget::new(config.generation.budget_tokens));
        let model: Arc<dyn LanguageModel> = Arc::new(BudgetedModel::new(model, budget));
        let tools = Arc::new(ToolRegistry::with_builtins(&config.paths.root));

        Self {
            config,
            retriever,
            index,
            model,
            tools,
            progress,
            phase: Mutex::new(Phase::Init),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.lock().map(|p| *p).unwrap_or(Phase::Closed)
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!(?phase, "entering phase");
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    /// Run to completion.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until done or until `shutdown` resolves, whichever comes first.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let generator = Arc::new(Generator {
            retriever: Arc::clone(&self.retriever),
            model: Arc::clone(&self.model),
            tools: Arc::clone(&self.tools),
            writer: Arc::new(MarkdownWriter::from_config(&self.config)),
            k: self.config.generation.k,
            agentic: self.config.generation.agentic,
            max_steps: self.config.generation.max_steps,
        });
        let pool = GenerationPool::new(
            generator,
            self.config.generation.workers,
            Arc::clone(&self.progress),
        );
        let tally = pool.tally();

        let mut summary = RunSummary::default();
        let outcome = tokio::select! {
            result = self.pipeline(&pool, &mut summary) => Some(result),
            _ = shutdown => None,
        };

        self.enter(Phase::Draining);
        if outcome.is_none() {
            tracing::warn!("interrupted; abandoning in-flight generation tasks");
            summary.interrupted = true;
        }

        let counts = tally.snapshot();
        summary.created = counts.created;
        summary.appended = counts.appended;
        summary.replaced = counts.replaced;
        summary.failed = counts.failed;

        if let Err(e) = self.index.close().await {
            tracing::warn!(error = %e, "failed to close similarity index");
        }
        self.enter(Phase::Closed);

        if let Some(Err(e)) = outcome {
            return Err(e);
        }

        tracing::info!(
            created = summary.created,
            appended = summary.appended,
            replaced = summary.replaced,
            unchanged = summary.unchanged,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "run finished"
        );
        self.progress.report(ProgressEvent::RunFinished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn pipeline(&self, pool: &GenerationPool, summary: &mut RunSummary) -> Result<()> {
        self.enter(Phase::Indexing);
        let plan = plan(&self.config).await?;
        summary.files_indexed = plan.index.report.files_indexed;
        summary.files_skipped = plan.index.report.files_skipped;
        summary.symbols = plan.index.symbols.len();
        summary.candidates = plan.candidates.len();
        summary.unchanged = plan.unchanged;
        tracing::info!(
            files = summary.files_indexed,
            skipped = summary.files_skipped,
            symbols = summary.symbols,
            candidates = summary.candidates,
            "indexed source tree"
        );
        self.progress.report(ProgressEvent::Indexed {
            files: summary.files_indexed,
            skipped: summary.files_skipped,
            symbols: summary.symbols,
        });

        if plan.candidates.is_empty() {
            tracing::info!("nothing to generate");
            return Ok(());
        }

        self.enter(Phase::Embedding);
        let stored = self
            .retriever
            .embed_and_store(&plan.index.symbols)
            .await
            .context("embedding failed")?;
        self.progress.report(ProgressEvent::Embedded { count: stored });

        self.enter(Phase::Generating);
        pool.run(plan.candidates).await;
        Ok(())
    }
}
